//! Error taxonomy shared by the game core and the transport.

use thiserror::Error;

use crate::board::BoardId;
use crate::protocol::ProtocolError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("board not found: {0}")]
    BoardNotFound(BoardId),
    #[error("timestamp outside the accepted window: {skew_secs}s from server time")]
    Time { skew_secs: i64 },
    #[error("a game is already active")]
    AlreadyActive,
    #[error("no game is active")]
    NotActive,
    #[error("unknown scenario: {0}")]
    UnknownScenario(String),
    #[error("missing or invalid credentials")]
    Unauthorized,
    #[error("operation not permitted for this user")]
    Forbidden,
    #[error("internal error: {0}")]
    Internal(String),
}

impl GridError {
    /// ASCII body returned to embedded devices.
    pub fn device_code(&self) -> &'static str {
        match self {
            GridError::Protocol(_) => "PROTOCOL_ERROR",
            GridError::BoardNotFound(_) => "BOARD_NOT_FOUND",
            GridError::Time { .. } => "TIME_ERROR",
            GridError::Unauthorized | GridError::Forbidden => "UNAUTHORIZED",
            GridError::AlreadyActive
            | GridError::NotActive
            | GridError::UnknownScenario(_)
            | GridError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type GridResult<T> = Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_codes_match_wire_contract() {
        let proto = GridError::from(ProtocolError::InvalidField {
            packet: "PowerData",
            field: "production",
        });
        assert_eq!(proto.device_code(), "PROTOCOL_ERROR");
        assert_eq!(
            GridError::BoardNotFound(BoardId::from("b1")).device_code(),
            "BOARD_NOT_FOUND"
        );
        assert_eq!(GridError::Time { skew_secs: 900 }.device_code(), "TIME_ERROR");
        assert_eq!(
            GridError::Internal("boom".into()).device_code(),
            "INTERNAL_ERROR"
        );
    }
}
