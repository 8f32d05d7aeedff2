//! The top-level state machine: opens the transport, streams the compile
//! request and the preprocessed source, triggers result retrieval, and
//! performs guaranteed teardown on every exit path.
//!
//! ```text
//! START -> CONNECT -> [AUTH] -> SEND -> [CPP-WAIT] -> STREAM ->
//!   [GCDA] -> FLUSH -> COMPILE-WAIT -> RECEIVE -> TEARDOWN -> END
//! ```
//!
//! Implemented as one straight-line sequence of awaits rather than a chain
//! of early `?`-returns from sub-steps, so there is exactly one teardown
//! call site: every branch of `run_body` returns into `dispatch_with`,
//! which always releases the lock and closes the transport afterward
//! regardless of whether `run_body` succeeded.
//!
//! `lock::LockHandle` is released directly rather than through a local
//! wrapper type - it already provides idempotent, explicit-or-on-drop
//! release.

use crate::auth::{AuthContext, NoAuth};
use crate::cleanup::{CleanupRegistry, PROCESS_CLEANUP};
use crate::cpp_wait::{self, WaitOutcome};
use crate::error::DispatchError;
use crate::framer;
use crate::gcda;
use crate::host::{HostDef, PreprocessingSite};
use crate::job::{DispatchOutcome, JobDescriptor};
use crate::phase::{self, Phase};
use crate::result_receiver::{ResultReceiver, TokenResultReceiver};
use crate::transport::{self, TransportChannel};
use crate::wire::{tag, TokenWriter};

/// Owns the transport channel from CONNECT until TEARDOWN. The normal path
/// takes the channel back out with [`into_inner`](Self::into_inner) and
/// closes it explicitly (awaiting the tunnel child reap in full); `Drop` is
/// only a fallback for panics and forgotten teardown, where it kills the
/// tunnel child and detaches a best-effort reap task since `Drop` cannot
/// `await`.
struct TeardownGuard {
    channel: Option<TransportChannel>,
}

impl TeardownGuard {
    fn new(channel: TransportChannel) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    fn channel_mut(&mut self) -> &mut TransportChannel {
        self.channel
            .as_mut()
            .expect("transport channel used after teardown")
    }

    fn into_inner(mut self) -> Option<TransportChannel> {
        self.channel.take()
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        let Some(mut channel) = self.channel.take() else {
            return;
        };
        drop(channel.send);
        drop(channel.recv);
        if let Some(mut child) = channel.tunnel_child.take() {
            let _ = child.start_kill();
            tokio::spawn(async move {
                let _ = child.wait().await;
            });
        }
    }
}

/// Close send/receive descriptors and reap the tunnel child, ignoring its
/// exit status. The normal-path counterpart to [`TeardownGuard`]'s `Drop`
/// fallback - used once `into_inner` has taken the channel back out.
async fn close_channel(mut channel: TransportChannel) {
    drop(channel.send);
    drop(channel.recv);
    if let Some(mut child) = channel.tunnel_child.take() {
        match child.wait().await {
            Ok(status) if !status.success() => {
                tracing::debug!(?status, "tunnel child exited non-zero");
            }
            Err(err) => tracing::debug!(%err, "failed to reap tunnel child"),
            _ => {}
        }
    }
}

/// Dispatch one compiler invocation to `host`, using the default
/// collaborators (no authentication beyond what `host.authenticated`
/// triggers via a no-op handshake stand-in, the token-based result
/// receiver, and the process-wide cleanup registry).
#[tracing::instrument(skip(host, job), fields(hostname = %host.hostname, input = %job.input_filename.display()))]
pub async fn dispatch(host: &HostDef, job: JobDescriptor) -> Result<DispatchOutcome, DispatchError> {
    dispatch_with(host, job, &NoAuth, &TokenResultReceiver, &*PROCESS_CLEANUP).await
}

/// The full state machine, parameterized over the AUTH, RECEIVE, and
/// cleanup-registry collaborators so it can be driven against fakes in
/// tests without a real peer or filesystem.
pub async fn dispatch_with(
    host: &HostDef,
    mut job: JobDescriptor,
    auth: &dyn AuthContext,
    receiver: &dyn ResultReceiver,
    cleanup: &dyn CleanupRegistry,
) -> Result<DispatchOutcome, DispatchError> {
    let start = std::time::Instant::now();

    phase::notify(&Phase::Connect {
        hostname: host.hostname.clone(),
    });
    let channel = match transport::open_transport(host).await {
        Ok(channel) => channel,
        Err(err) => {
            if let Some(handle) = job.local_lock.as_mut() {
                handle.release();
            }
            return Err(err);
        }
    };
    let mut teardown = TeardownGuard::new(channel);

    let body_result = run_body(host, &mut job, &mut teardown, auth, receiver, cleanup, start).await;

    // TEARDOWN: always executed, regardless of how run_body finished.
    if let Some(handle) = job.local_lock.as_mut() {
        handle.release();
    }
    if let Some(channel) = teardown.into_inner() {
        close_channel(channel).await;
    }

    body_result
}

#[allow(clippy::too_many_arguments)]
async fn run_body(
    host: &HostDef,
    job: &mut JobDescriptor,
    teardown: &mut TeardownGuard,
    auth: &dyn AuthContext,
    receiver: &dyn ResultReceiver,
    cleanup: &dyn CleanupRegistry,
    start: std::time::Instant,
) -> Result<DispatchOutcome, DispatchError> {
    if host.authenticated {
        let channel = teardown.channel_mut();
        auth.authenticate(&mut channel.send, &mut channel.recv).await?;
    }

    phase::notify(&Phase::Send {
        hostname: host.hostname.clone(),
    });
    teardown.channel_mut().set_coalescing(true);
    {
        let channel = teardown.channel_mut();
        let mut writer = TokenWriter::new(&mut channel.send);
        framer::frame_request(&mut writer, host, job).await?;
    }

    let mut doti_bytes: u64 = 0;

    match host.site {
        PreprocessingSite::Server => {
            send_file_bundle(teardown, &job.file_list, host.compression).await?;
        }
        PreprocessingSite::Client => {
            let wait_outcome =
                cpp_wait::wait_for_preprocessor(job.cpp_child.take(), &job.input_filename).await?;

            // Released here - the earliest point at which further local
            // preprocessing by someone else is safe.
            if let Some(handle) = job.local_lock.as_mut() {
                handle.release();
            }

            match wait_outcome {
                WaitOutcome::Failed(status) => {
                    teardown.channel_mut().set_coalescing(false);
                    return Ok(DispatchOutcome {
                        transport_status: 0,
                        remote_wait_status: status.code(),
                    });
                }
                WaitOutcome::NotApplicable | WaitOutcome::Succeeded => {}
            }

            let preprocessed = job.preprocessed_source.clone().ok_or_else(|| {
                DispatchError::Logic(
                    "client-site dispatch requires a preprocessed source path".into(),
                )
            })?;

            {
                let channel = teardown.channel_mut();
                let mut writer = TokenWriter::new(&mut channel.send);
                doti_bytes = writer
                    .write_file(tag::DOTI, &preprocessed, host.compression)
                    .await?;
            }

            if job.wants_gcda_staging(host.site) {
                let cwd = std::env::current_dir().map_err(DispatchError::Io)?;
                let staged = gcda::resolve_and_stage(
                    &job.argv,
                    &job.output_object,
                    &preprocessed,
                    &cwd,
                    cleanup,
                )
                .await?;

                let channel = teardown.channel_mut();
                let mut writer = TokenWriter::new(&mut channel.send);
                match staged {
                    Some(path) => {
                        writer.write_number(tag::GCDA, 1).await?;
                        writer.write_file(tag::DOTI, &path, host.compression).await?;
                    }
                    None => {
                        writer.write_number(tag::GCDA, 0).await?;
                    }
                }
            }
        }
    }

    teardown.channel_mut().set_coalescing(false);
    phase::notify(&Phase::Compile {
        hostname: host.hostname.clone(),
    });

    let receive_outcome = receiver.receive(&mut teardown.channel_mut().recv, job).await?;

    if receive_outcome.status == 0 && host.site == PreprocessingSite::Client {
        phase::log_summary(
            doti_bytes,
            &job.input_filename,
            &host.hostname,
            start.elapsed(),
        );
    }

    Ok(DispatchOutcome {
        transport_status: receive_outcome.status,
        remote_wait_status: receive_outcome.remote_wait_status,
    })
}

/// The SERVER-site branch: stream the job's file list as a count-prefixed
/// sequence of name+content tokens. No CPP-WAIT, no GCDA.
async fn send_file_bundle(
    teardown: &mut TeardownGuard,
    files: &[std::path::PathBuf],
    compress: bool,
) -> Result<(), DispatchError> {
    let count: u32 = files
        .len()
        .try_into()
        .map_err(|_| DispatchError::Logic("file list too large for one bundle".into()))?;
    let channel = teardown.channel_mut();
    let mut writer = TokenWriter::new(&mut channel.send);
    writer.write_number(tag::NFIL, count).await?;
    for path in files {
        writer
            .write_bytes(tag::FNAM, path.to_string_lossy().as_bytes())
            .await?;
        writer.write_file(tag::DOTI, path, compress).await?;
    }
    Ok(())
}
