//! SaltWire Transport
//!
//! Async secure channels over ordered byte streams, built on
//! `saltwire-core`.
//!
//! A [`SecureChannel`] wraps any `AsyncRead + AsyncWrite` stream (TCP by
//! default) and provides mutually authenticated, encrypted message framing
//! after a two-message handshake.
//!
//! # Security Invariants & Hard Failures
//!
//! - **One strike**: any cryptographic, protocol, or I/O error kills the
//!   channel. There are no retries and no resynchronization.
//! - **Known-peer handshake**: the initiator must know the responder's
//!   public key in advance; the responder gates initiators through an
//!   authorization predicate.
//! - **Destructive sends**: plaintext is encrypted in place, so the caller's
//!   buffer never holds a lingering plaintext copy after a send.
//! - **No duplication**: channels and their split halves do not implement
//!   `Clone`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod channel;
pub mod error;
mod handshake;

pub use channel::{ReadChannel, SecureChannel, WriteChannel};
pub use error::ChannelError;
pub use saltwire_core::{Keypair, ProtocolError, PublicKey, SecretKey};
