//! SaltWire Protocol Core
//!
//! Sans-I/O implementation of a mutually authenticated secure channel over
//! an ordered byte stream, using libsodium-compatible `crypto_box`
//! primitives (X25519-XSalsa20-Poly1305).
//!
//! This crate provides:
//! - Wire codecs for the three fixed-size protocol messages
//! - The per-connection session state machine and nonce ratchet
//! - A closed error taxonomy where every failure is terminal
//!
//! # Security Invariants
//!
//! - Every nonce is used for exactly one encryption, then replaced
//! - Any cryptographic or authorization failure terminates the session
//! - Direct use of `unsafe` is forbidden (#![forbid(unsafe_code)])
//! - Key material and handshake scratch are zeroized on session end
//! - No retries, no recovery, no partial processing

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod crypto;
pub mod error;
pub mod session;
pub mod wire;

pub use crypto::{Keypair, Mac, Nonce, PublicKey, SecretKey, KEY_SIZE, MAC_SIZE, NONCE_SIZE};
pub use error::ProtocolError;
pub use session::{DirectionState, HalfSession, SessionState};
pub use wire::{HEADER_LEN, HELLO_LEN, RESPONSE_LEN};
