use thiserror::Error;

/// A status change that the lifecycle of a job, application or rental does not allow.
///
/// Carries the client-facing reason; converted into a `400 Bad Request`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{0}")]
pub struct InvalidTransition(pub &'static str);

impl InvalidTransition {
    /// The row left the expected status between reading and writing it.
    pub const STALE: InvalidTransition =
        InvalidTransition("status was changed by another request, please reload and retry");
}
