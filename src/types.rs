use strum::Display;

/// Lifecycle state of the chat socket.
///
/// Mirrors the four states of the underlying transport. [`ChatSocket`]
/// reports `Closed` when no socket exists at all.
///
/// [`ChatSocket`]: crate::client::ChatSocket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    /// Dial in progress; no socket is open yet.
    Connecting,
    /// Socket is open and frames may be sent.
    Open,
    /// A close has been initiated but not completed.
    Closing,
    /// No socket exists.
    #[default]
    Closed,
}

impl ConnectionState {
    /// Decode from the shared atomic representation.
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// Encode for the shared atomic representation.
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Self::Connecting => 0,
            Self::Open => 1,
            Self::Closing => 2,
            Self::Closed => 3,
        }
    }
}

/// Payload delivered to the on-close callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// WebSocket close code (1000 for a caller-initiated close,
    /// 1006 when the connection died without a close handshake).
    pub code: u16,
    /// Close reason, empty when the peer gave none.
    pub reason: String,
}

impl CloseEvent {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_defaults_to_closed() {
        assert_eq!(ConnectionState::default(), ConnectionState::Closed);
    }

    #[test]
    fn state_survives_atomic_encoding() {
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Closing,
            ConnectionState::Closed,
        ] {
            assert_eq!(ConnectionState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn unknown_atomic_value_reads_as_closed() {
        assert_eq!(ConnectionState::from_u8(250), ConnectionState::Closed);
    }

    #[test]
    fn state_displays_lowercase() {
        assert_eq!(ConnectionState::Open.to_string(), "open");
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
    }
}
