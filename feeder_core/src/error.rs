use thiserror::Error;

/// Rejected controller construction; the message names the offending
/// config field.
#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}
