//! Crypto primitive wrappers.
//!
//! This module wraps the `crypto_box` crate (X25519-XSalsa20-Poly1305, wire
//! compatible with libsodium's `crypto_box`) to provide the fixed suite the
//! protocol uses:
//!
//! - sealed (anonymous) boxes for the handshake hello
//! - authenticated boxes with an explicit, caller-supplied nonce
//! - detached-MAC authenticated encryption for in-place payload encryption
//!
//! There is no algorithm negotiation. The suite is fixed.

use crypto_box::aead::generic_array::GenericArray;
use crypto_box::aead::AeadInPlace;
use crypto_box::SalsaBox;
use rand::rngs::OsRng;
use rand::RngCore;

pub use crypto_box::{PublicKey, SecretKey};

/// Public and private key size in bytes.
pub const KEY_SIZE: usize = 32;

/// Nonce size in bytes.
pub const NONCE_SIZE: usize = 24;

/// Detached authentication tag size in bytes.
pub const MAC_SIZE: usize = 16;

/// Byte overhead of a sealed box: ephemeral public key plus tag.
pub const SEAL_OVERHEAD: usize = KEY_SIZE + MAC_SIZE;

/// A protocol nonce. Cryptographically random when freshly generated and
/// never reused under the same key pair.
pub type Nonce = [u8; NONCE_SIZE];

/// A detached Poly1305 authentication tag.
pub type Mac = [u8; MAC_SIZE];

/// A long-term identity key pair.
///
/// The secret key is zeroized on drop by `crypto_box`.
pub struct Keypair {
    /// Long-term public identity, shared with peers out-of-band.
    pub public: PublicKey,
    /// Long-term secret key.
    pub secret: SecretKey,
}

impl Keypair {
    /// Generate a fresh random key pair from OS randomness.
    pub fn generate() -> Self {
        let secret = SecretKey::generate(&mut OsRng);
        Self {
            public: secret.public_key(),
            secret,
        }
    }
}

/// Fill `bytes` with OS randomness.
pub(crate) fn fill_random(bytes: &mut [u8]) {
    OsRng.fill_bytes(bytes);
}

/// Authenticated-box encrypt `buffer` in place under an explicit nonce.
///
/// `buffer` is laid out `[mac || plaintext]`: the tail is encrypted in place
/// and the tag written up front, matching the `crypto_box_easy` wire layout.
pub(crate) fn box_encrypt(
    buffer: &mut [u8],
    nonce: &Nonce,
    remote: &PublicKey,
    secret: &SecretKey,
) -> bool {
    let cipher = SalsaBox::new(remote, secret);
    let (mac, data) = buffer.split_at_mut(MAC_SIZE);
    match cipher.encrypt_in_place_detached(GenericArray::from_slice(nonce), b"", data) {
        Ok(tag) => {
            mac.copy_from_slice(tag.as_slice());
            true
        }
        Err(_) => false,
    }
}

/// Authenticated-box decrypt a `[mac || ciphertext]` buffer in place.
///
/// Returns false on authentication failure; the buffer contents are
/// unspecified afterwards and the session is unusable either way.
pub(crate) fn box_decrypt(
    buffer: &mut [u8],
    nonce: &Nonce,
    remote: &PublicKey,
    secret: &SecretKey,
) -> bool {
    let cipher = SalsaBox::new(remote, secret);
    let (mac, data) = buffer.split_at_mut(MAC_SIZE);
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            b"",
            data,
            GenericArray::from_slice(mac),
        )
        .is_ok()
}

/// Detached-encrypt `message` in place, writing the tag into `mac`.
pub(crate) fn box_encrypt_detached(
    message: &mut [u8],
    mac: &mut Mac,
    nonce: &Nonce,
    remote: &PublicKey,
    secret: &SecretKey,
) -> bool {
    let cipher = SalsaBox::new(remote, secret);
    match cipher.encrypt_in_place_detached(GenericArray::from_slice(nonce), b"", message) {
        Ok(tag) => {
            mac.copy_from_slice(tag.as_slice());
            true
        }
        Err(_) => false,
    }
}

/// Detached-decrypt `message` in place, verifying it against `mac`.
pub(crate) fn box_decrypt_detached(
    message: &mut [u8],
    mac: &Mac,
    nonce: &Nonce,
    remote: &PublicKey,
    secret: &SecretKey,
) -> bool {
    let cipher = SalsaBox::new(remote, secret);
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(nonce),
            b"",
            message,
            GenericArray::from_slice(mac),
        )
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_generation_is_unique() {
        let a = Keypair::generate();
        let b = Keypair::generate();
        assert_ne!(a.public, b.public);
    }

    #[test]
    fn box_roundtrip_in_place() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();

        let mut nonce = [0u8; NONCE_SIZE];
        fill_random(&mut nonce);

        let mut buffer = vec![0u8; MAC_SIZE + 32];
        buffer[MAC_SIZE..].copy_from_slice(&[0xAB; 32]);

        assert!(box_encrypt(&mut buffer, &nonce, &bob.public, &alice.secret));
        assert_ne!(&buffer[MAC_SIZE..], &[0xAB; 32]);

        assert!(box_decrypt(&mut buffer, &nonce, &alice.public, &bob.secret));
        assert_eq!(&buffer[MAC_SIZE..], &[0xAB; 32]);
    }

    #[test]
    fn box_rejects_wrong_nonce() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();

        let mut nonce = [0u8; NONCE_SIZE];
        fill_random(&mut nonce);

        let mut buffer = vec![0u8; MAC_SIZE + 16];
        assert!(box_encrypt(&mut buffer, &nonce, &bob.public, &alice.secret));

        nonce[0] ^= 0x01;
        assert!(!box_decrypt(&mut buffer, &nonce, &alice.public, &bob.secret));
    }

    #[test]
    fn detached_roundtrip_and_tamper() {
        let alice = Keypair::generate();
        let bob = Keypair::generate();

        let mut nonce = [0u8; NONCE_SIZE];
        fill_random(&mut nonce);

        let original = [0x5A; 42];
        let mut message = original;
        let mut mac = [0u8; MAC_SIZE];

        assert!(box_encrypt_detached(
            &mut message,
            &mut mac,
            &nonce,
            &bob.public,
            &alice.secret
        ));
        assert_ne!(message, original);

        let mut tampered = message;
        tampered[7] ^= 0x80;
        assert!(!box_decrypt_detached(
            &mut tampered,
            &mac,
            &nonce,
            &alice.public,
            &bob.secret
        ));

        assert!(box_decrypt_detached(
            &mut message,
            &mac,
            &nonce,
            &alice.public,
            &bob.secret
        ));
        assert_eq!(message, original);
    }
}
