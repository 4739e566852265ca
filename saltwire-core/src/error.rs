//! Protocol errors.
//!
//! Every error here is terminal to the connection: the nonce ratchet is
//! desynchronized after any failure, so the only recovery is a fresh
//! connection and a fresh handshake.

use std::fmt;

/// All possible protocol errors.
///
/// The taxonomy is closed. None of these are fatal to the process, and none
/// are retryable on the same connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Couldn't seal the handshake hello to the responder's public key.
    HandshakeHelloEncrypt,

    /// Couldn't open the handshake hello with the responder's key pair.
    HandshakeHelloDecrypt,

    /// The claimed public key was rejected by the authorization predicate.
    HandshakeAuthentication,

    /// Couldn't encrypt the handshake response.
    HandshakeResponseEncrypt,

    /// Couldn't decrypt the handshake response.
    HandshakeResponseDecrypt,

    /// Couldn't encrypt a message header.
    MessageHeaderEncrypt,

    /// Couldn't decrypt a message header.
    MessageHeaderDecrypt,

    /// Message length exceeds the header length field or the receive buffer.
    MessageTooLarge,

    /// Couldn't encrypt a message payload.
    MessageEncrypt,

    /// Couldn't decrypt a message payload.
    MessageDecrypt,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Deliberately terse. Do not leak details.
        match self {
            Self::HandshakeHelloEncrypt => write!(f, "couldn't encrypt handshake hello"),
            Self::HandshakeHelloDecrypt => write!(f, "couldn't decrypt handshake hello"),
            Self::HandshakeAuthentication => write!(f, "handshake failed to authenticate"),
            Self::HandshakeResponseEncrypt => write!(f, "couldn't encrypt handshake response"),
            Self::HandshakeResponseDecrypt => write!(f, "couldn't decrypt handshake response"),
            Self::MessageHeaderEncrypt => write!(f, "couldn't encrypt message header"),
            Self::MessageHeaderDecrypt => write!(f, "couldn't decrypt message header"),
            Self::MessageTooLarge => write!(f, "message too large"),
            Self::MessageEncrypt => write!(f, "couldn't encrypt message"),
            Self::MessageDecrypt => write!(f, "couldn't decrypt message"),
        }
    }
}

impl std::error::Error for ProtocolError {}
