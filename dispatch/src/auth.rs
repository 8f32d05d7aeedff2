//! The AUTH state's collaborator: an authentication handshake performed on
//! the transport channel when `host.authenticated` is set. The resulting
//! security context (if any) is discarded immediately on success -
//! confidentiality/integrity services are not used beyond the handshake.
//!
//! Modeled as a trait, per the "process-wide... inject handles so tests can
//! substitute a recording fake" design note, even though in practice there
//! is exactly one process-wide auth policy per host.

use crate::error::DispatchError;
use crate::transport::{BoxedRecv, BoxedSend};

#[async_trait::async_trait]
pub trait AuthContext: Send + Sync {
    async fn authenticate(
        &self,
        send: &mut BoxedSend,
        recv: &mut BoxedRecv,
    ) -> Result<(), DispatchError>;
}

/// No authentication: every call succeeds without touching the channel.
/// The default for hosts with `authenticated == false`.
pub struct NoAuth;

#[async_trait::async_trait]
impl AuthContext for NoAuth {
    async fn authenticate(
        &self,
        _send: &mut BoxedSend,
        _recv: &mut BoxedRecv,
    ) -> Result<(), DispatchError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_auth_always_succeeds() {
        let mut send: BoxedSend = Box::new(Vec::<u8>::new());
        let mut recv: BoxedRecv = Box::new(std::io::Cursor::new(Vec::<u8>::new()));
        assert!(NoAuth.authenticate(&mut send, &mut recv).await.is_ok());
    }
}
