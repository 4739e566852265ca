//! Channel errors.

use std::fmt;

use saltwire_core::ProtocolError;

/// Errors that can occur while establishing or using a secure channel.
///
/// Every variant is terminal: the nonce ratchet cannot be resynchronized, so
/// the only recovery is a new connection and a new handshake.
#[derive(Debug)]
pub enum ChannelError {
    /// Protocol-level failure from saltwire-core.
    Protocol(ProtocolError),
    /// The underlying stream failed or closed.
    Io(std::io::Error),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => write!(f, "protocol error: {}", e),
            Self::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Protocol(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<ProtocolError> for ChannelError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl From<std::io::Error> for ChannelError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
