//! Errors that stop a dispatch before or outside the mutation stages.

use thiserror::Error;

use crate::exit_codes;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The event is not something this bot processes.
    #[error("invalid dispatch event: {0}")]
    InvalidEvent(String),

    /// The pull request is in a state that forbids mutation.
    #[error("{0}")]
    State(String),

    /// Cloning, API access or other plumbing failed.
    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl DispatchError {
    pub fn exit_code(&self) -> i32 {
        match self {
            DispatchError::InvalidEvent(_) | DispatchError::State(_) => exit_codes::INVALID,
            DispatchError::Infrastructure(_) => exit_codes::FAILED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_map_to_invalid() {
        assert_eq!(
            DispatchError::State("closed".to_string()).exit_code(),
            exit_codes::INVALID
        );
        assert_eq!(
            DispatchError::InvalidEvent("push".to_string()).exit_code(),
            exit_codes::INVALID
        );
        let err: DispatchError = anyhow::anyhow!("clone failed").into();
        assert_eq!(err.exit_code(), exit_codes::FAILED);
        assert_eq!(err.to_string(), "clone failed");
    }
}
