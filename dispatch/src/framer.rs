//! Emits the protocol preamble, optional working directory, and argument
//! vector to the send channel.

use tokio::io::AsyncWrite;

use crate::error::DispatchError;
use crate::host::{HostDef, PreprocessingSite};
use crate::job::JobDescriptor;
use crate::wire::{tag, TokenWriter};

/// Write the preamble, `CWD` (server-site only), and `ARGC`/`ARGV` tokens.
/// Fails only if an underlying token write fails; the failure is propagated
/// verbatim.
pub async fn frame_request<W: AsyncWrite + Unpin>(
    writer: &mut TokenWriter<W>,
    host: &HostDef,
    job: &JobDescriptor,
) -> Result<(), DispatchError> {
    writer.write_number(tag::DIST, host.protocol_version).await?;

    if host.site == PreprocessingSite::Server {
        let cwd = std::env::current_dir().map_err(DispatchError::Io)?;
        writer
            .write_bytes(tag::CWD, cwd.to_string_lossy().as_bytes())
            .await?;
    }

    let argc: u32 = job
        .argv
        .len()
        .try_into()
        .map_err(|_| DispatchError::Logic("argument vector too large".into()))?;
    writer.write_number(tag::ARGC, argc).await?;
    for arg in &job.argv {
        writer.write_bytes(tag::ARGV, arg.as_bytes()).await?;
    }
    Ok(())
}
