//! Opens send/receive descriptors for a chosen compile host, either a TCP
//! socket or a pair of pipes bound to a spawned tunnel child.
//!
//! Uses the same boxed `AsyncRead`/`AsyncWrite` trait-object pattern as
//! `remote::streams`, and the same spawn-with-piped-stdio idiom as
//! `remote::start_rcpd`, generalized from SSH specifically to an arbitrary
//! tunnel command.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;

use crate::error::DispatchError;
use crate::host::{HostDef, TransportMode};

pub type BoxedSend = Box<dyn AsyncWrite + Unpin + Send>;
pub type BoxedRecv = Box<dyn AsyncRead + Unpin + Send>;

/// The send/receive descriptor pair handed to the rest of the dispatch,
/// plus whatever teardown needs to close it.
pub struct TransportChannel {
    pub send: BoxedSend,
    pub recv: BoxedRecv,
    /// Present only for `TransportMode::Tunnel`; reaped at teardown.
    pub tunnel_child: Option<tokio::process::Child>,
    coalescing: CoalescingControl,
}

impl TransportChannel {
    /// Toggle the coalescing hint (batch small writes until flushed). A
    /// no-op for tunnel transports, which have no socket option to tune.
    pub fn set_coalescing(&self, on: bool) {
        self.coalescing.set(on);
    }
}

enum CoalescingControl {
    Tcp(Arc<TcpStream>),
    None,
}

impl CoalescingControl {
    fn set(&self, on: bool) {
        if let CoalescingControl::Tcp(sock) = self {
            // "coalescing on" means Nagle enabled, i.e. TCP_NODELAY off.
            if let Err(err) = sock.set_nodelay(!on) {
                tracing::debug!(%err, "failed to toggle TCP_NODELAY");
            }
        }
    }
}

/// A cloneable handle onto one half of a shared `TcpStream`, so the same
/// socket can be split into independently-owned send/receive halves while
/// retaining the ability to tune socket options through the original `Arc`.
struct ArcTcpHalf(Arc<TcpStream>);

impl AsyncRead for ArcTcpHalf {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut &*self.0).poll_read(cx, buf)
    }
}

impl AsyncWrite for ArcTcpHalf {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut &*self.0).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut &*self.0).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut &*self.0).poll_shutdown(cx)
    }
}

/// Open the transport described by `host`. On any failure no descriptor is
/// leaked: a partially-spawned tunnel child is killed and reaped before the
/// error is returned.
#[tracing::instrument(skip(host), fields(hostname = %host.hostname))]
pub async fn open_transport(host: &HostDef) -> Result<TransportChannel, DispatchError> {
    match host.transport {
        TransportMode::Tcp => open_tcp(host).await,
        TransportMode::Tunnel => open_tunnel(host).await,
    }
}

async fn open_tcp(host: &HostDef) -> Result<TransportChannel, DispatchError> {
    let stream = TcpStream::connect((host.hostname.as_str(), host.port))
        .await
        .map_err(DispatchError::Transport)?;
    let stream = Arc::new(stream);
    Ok(TransportChannel {
        send: Box::new(ArcTcpHalf(stream.clone())),
        recv: Box::new(ArcTcpHalf(stream.clone())),
        tunnel_child: None,
        coalescing: CoalescingControl::Tcp(stream),
    })
}

async fn open_tunnel(host: &HostDef) -> Result<TransportChannel, DispatchError> {
    let program = host
        .tunnel_command
        .first()
        .ok_or_else(|| DispatchError::Logic("empty tunnel command".into()))?;
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(&host.tunnel_command[1..]);
    match &host.tunnel_user {
        Some(user) => cmd.arg(format!("{user}@{}", host.hostname)),
        None => cmd.arg(&host.hostname),
    };
    cmd.stdin(std::process::Stdio::piped());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::null());

    let mut child = cmd.spawn().map_err(DispatchError::Transport)?;
    let stdin = match child.stdin.take() {
        Some(s) => s,
        None => {
            kill_and_reap(&mut child).await;
            return Err(DispatchError::Logic("tunnel child missing stdin".into()));
        }
    };
    let stdout = match child.stdout.take() {
        Some(s) => s,
        None => {
            drop(stdin);
            kill_and_reap(&mut child).await;
            return Err(DispatchError::Logic("tunnel child missing stdout".into()));
        }
    };

    Ok(TransportChannel {
        send: Box::new(stdin),
        recv: Box::new(stdout),
        tunnel_child: Some(child),
        coalescing: CoalescingControl::None,
    })
}

async fn kill_and_reap(child: &mut tokio::process::Child) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}
