use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The pre-connect liveness probe failed; no socket was opened.
    #[error("health probe failed: {0}")]
    ProbeFailed(String),
    #[error("{0} timed out")]
    Timeout(&'static str),
    #[error("transport error: {0}")]
    Connection(String),
    /// Terminal: the reconnect cycle gave up. A manual `connect()` is
    /// required from here.
    #[error("reconnection attempts exhausted after {attempts} tries")]
    AttemptsExhausted { attempts: u32 },
}
