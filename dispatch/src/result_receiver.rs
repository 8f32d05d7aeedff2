//! RECEIVE state's collaborator: reads the object file, stderr, and
//! optional dependency stream off the wire and stores them at the
//! caller-supplied paths.
//!
//! Modeled as a trait (rather than a free function) so the orchestrator's
//! RECEIVE state can be exercised in tests against a fake that never
//! touches the filesystem or a real peer.

use crate::error::DispatchError;
use crate::job::JobDescriptor;
use crate::transport::BoxedRecv;
use crate::wire::{tag, TokenReader};

/// What came back from the RECEIVE stage: the transport-level status this
/// stage contributes, and the remote compiler's raw wait-status word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiveOutcome {
    pub status: i32,
    pub remote_wait_status: Option<i32>,
}

#[async_trait::async_trait]
pub trait ResultReceiver: Send + Sync {
    /// Read the response stream and store it at the paths named in `job`.
    async fn receive(
        &self,
        recv: &mut BoxedRecv,
        job: &JobDescriptor,
    ) -> Result<ReceiveOutcome, DispatchError>;
}

/// Reads `OBJF`, `ERRS`, an optional `HDEP`/`DEPS` pair, and `WSTA`, writing
/// the first three to `job.output_object`, `job.server_stderr_path`, and
/// `job.dependency_output` respectively.
pub struct TokenResultReceiver;

#[async_trait::async_trait]
impl ResultReceiver for TokenResultReceiver {
    async fn receive(
        &self,
        recv: &mut BoxedRecv,
        job: &JobDescriptor,
    ) -> Result<ReceiveOutcome, DispatchError> {
        let mut reader = TokenReader::new(&mut *recv);

        let object = reader.read_bytes(tag::OBJF).await?;
        tokio::fs::write(&job.output_object, &object)
            .await
            .map_err(DispatchError::Io)?;

        let stderr = reader.read_bytes(tag::ERRS).await?;
        if let Some(path) = &job.server_stderr_path {
            tokio::fs::write(path, &stderr)
                .await
                .map_err(DispatchError::Io)?;
        }

        let has_deps = reader.read_number(tag::HDEP).await?;
        if has_deps == 1 {
            let deps = reader.read_bytes(tag::DEPS).await?;
            if let Some(path) = &job.dependency_output {
                tokio::fs::write(path, &deps).await.map_err(DispatchError::Io)?;
            }
        }

        let wait_status = reader.read_number(tag::WSTA).await? as i32;

        Ok(ReceiveOutcome {
            status: 0,
            remote_wait_status: Some(wait_status),
        })
    }
}
