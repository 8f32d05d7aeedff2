/// Errors surfaced by the dispatch engine.
///
/// Mirrors the abstract error kinds of the dispatch protocol: transport,
/// protocol framing, authentication, I/O, and child-process failures are all
/// distinct because callers (and tests) care about which stage failed.
/// `Logic` covers the "this should be unreachable" case (an unknown transport
/// mode) - it is fatal by construction, never recovered from.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("transport error: {0}")]
    Transport(#[source] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    #[error("preprocessor child error: {0}")]
    Child(String),

    #[error("logic error: {0}")]
    Logic(String),
}
