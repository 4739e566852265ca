//! Wire codecs for the three fixed-size protocol messages.
//!
//! Layouts (all sizes fixed at compile time):
//!
//! ```text
//! Hello    = [ SEAL (48B) | public key (32B) | reply nonce (24B) ]
//! Response = [ MAC (16B)  | reply nonce (24B) | followup nonce (24B) ]
//! Header   = [ MAC (16B)  | data nonce (24B) | followup nonce (24B) | length (4B LE) ]
//! ```
//!
//! Each codec is a view over a caller-owned buffer. Fields are written before
//! `encrypt_to` and read only after a successful `decrypt`; decryption fails
//! silently (returns `None`) on authentication failure.

use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::crypto::{
    self, Nonce, PublicKey, SecretKey, KEY_SIZE, MAC_SIZE, NONCE_SIZE, SEAL_OVERHEAD,
};

/// Total hello buffer length.
pub const HELLO_LEN: usize = SEAL_OVERHEAD + KEY_SIZE + NONCE_SIZE;

/// Total response buffer length.
pub const RESPONSE_LEN: usize = MAC_SIZE + 2 * NONCE_SIZE;

/// Total message header buffer length.
pub const HEADER_LEN: usize = MAC_SIZE + 2 * NONCE_SIZE + 4;

/// Copy a nonce out of a buffer at a fixed offset.
fn nonce_at(buf: &[u8], offset: usize) -> Nonce {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&buf[offset..offset + NONCE_SIZE]);
    nonce
}

/// The handshake hello: sealed anonymously to the responder's public key.
///
/// The seal proves nothing about the sender; the initiator's claim to the
/// enclosed public key is only validated indirectly, by its ability to
/// decrypt everything that follows.
pub struct Hello<'a> {
    buf: &'a mut [u8; HELLO_LEN],
}

impl<'a> Hello<'a> {
    const KEY_OFFSET: usize = SEAL_OVERHEAD;
    const REPLY_NONCE_OFFSET: usize = Self::KEY_OFFSET + KEY_SIZE;

    /// Wrap a buffer for building a hello.
    pub fn new(buf: &'a mut [u8; HELLO_LEN]) -> Self {
        Self { buf }
    }

    /// Open a sealed hello with the responder's own secret key.
    ///
    /// On success the buffer's plaintext region holds the decrypted fields.
    pub fn decrypt(buf: &'a mut [u8; HELLO_LEN], local_secret: &SecretKey) -> Option<Self> {
        let opened = Zeroizing::new(local_secret.unseal(&buf[..]).ok()?);
        if opened.len() != HELLO_LEN - SEAL_OVERHEAD {
            return None;
        }
        buf[SEAL_OVERHEAD..].copy_from_slice(&opened);
        Some(Self { buf })
    }

    /// Write the initiator's public key field.
    pub fn set_public_key(&mut self, key: &PublicKey) {
        self.buf[Self::KEY_OFFSET..Self::KEY_OFFSET + KEY_SIZE].copy_from_slice(key.as_bytes());
    }

    /// Fill the reply nonce field with fresh randomness.
    pub fn generate_reply_nonce(&mut self) {
        crypto::fill_random(
            &mut self.buf[Self::REPLY_NONCE_OFFSET..Self::REPLY_NONCE_OFFSET + NONCE_SIZE],
        );
    }

    /// The public key the initiator claims to hold.
    pub fn claimed_public_key(&self) -> PublicKey {
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&self.buf[Self::KEY_OFFSET..Self::KEY_OFFSET + KEY_SIZE]);
        PublicKey::from(key)
    }

    /// The nonce the responder must use to encrypt its response.
    pub fn reply_nonce(&self) -> Nonce {
        nonce_at(self.buf, Self::REPLY_NONCE_OFFSET)
    }

    /// Seal the buffer to `recipient`, overwriting it in place.
    pub fn encrypt_to(&mut self, recipient: &PublicKey) -> bool {
        let sealed = match recipient.seal(&mut OsRng, &self.buf[SEAL_OVERHEAD..]) {
            Ok(sealed) => sealed,
            Err(_) => return false,
        };
        if sealed.len() != HELLO_LEN {
            return false;
        }
        self.buf.copy_from_slice(&sealed);
        true
    }
}

/// The handshake response: authenticated under both parties' long-term keys,
/// encrypted with the hello's reply nonce.
pub struct Response<'a> {
    buf: &'a mut [u8; RESPONSE_LEN],
}

impl<'a> Response<'a> {
    const REPLY_NONCE_OFFSET: usize = MAC_SIZE;
    const FOLLOWUP_NONCE_OFFSET: usize = Self::REPLY_NONCE_OFFSET + NONCE_SIZE;

    /// Wrap a buffer for building a response.
    pub fn new(buf: &'a mut [u8; RESPONSE_LEN]) -> Self {
        Self { buf }
    }

    /// Decrypt a response in place under an explicit nonce.
    pub fn decrypt(
        buf: &'a mut [u8; RESPONSE_LEN],
        nonce: &Nonce,
        remote: &PublicKey,
        local_secret: &SecretKey,
    ) -> Option<Self> {
        if crypto::box_decrypt(&mut buf[..], nonce, remote, local_secret) {
            Some(Self { buf })
        } else {
            None
        }
    }

    /// Fill the reply nonce field with fresh randomness.
    pub fn generate_reply_nonce(&mut self) {
        crypto::fill_random(
            &mut self.buf[Self::REPLY_NONCE_OFFSET..Self::REPLY_NONCE_OFFSET + NONCE_SIZE],
        );
    }

    /// Fill the followup nonce field with fresh randomness.
    pub fn generate_followup_nonce(&mut self) {
        crypto::fill_random(
            &mut self.buf[Self::FOLLOWUP_NONCE_OFFSET..Self::FOLLOWUP_NONCE_OFFSET + NONCE_SIZE],
        );
    }

    /// The responder's reply nonce (the initiator's next encrypt nonce).
    pub fn reply_nonce(&self) -> Nonce {
        nonce_at(self.buf, Self::REPLY_NONCE_OFFSET)
    }

    /// The responder's followup nonce (the initiator's next decrypt nonce).
    pub fn followup_nonce(&self) -> Nonce {
        nonce_at(self.buf, Self::FOLLOWUP_NONCE_OFFSET)
    }

    /// Encrypt the buffer in place under an explicit nonce.
    pub fn encrypt_to(&mut self, nonce: &Nonce, remote: &PublicKey, local_secret: &SecretKey) -> bool {
        crypto::box_encrypt(&mut self.buf[..], nonce, remote, local_secret)
    }
}

/// A message header: carries the payload's data nonce, the next header nonce,
/// and the payload length.
pub struct Header<'a> {
    buf: &'a mut [u8; HEADER_LEN],
}

impl<'a> Header<'a> {
    const DATA_NONCE_OFFSET: usize = MAC_SIZE;
    const FOLLOWUP_NONCE_OFFSET: usize = Self::DATA_NONCE_OFFSET + NONCE_SIZE;
    const LENGTH_OFFSET: usize = Self::FOLLOWUP_NONCE_OFFSET + NONCE_SIZE;

    /// Wrap a buffer for building a header, or for field access after a
    /// successful decrypt.
    pub fn new(buf: &'a mut [u8; HEADER_LEN]) -> Self {
        Self { buf }
    }

    /// Decrypt a header in place under an explicit nonce.
    pub fn decrypt(
        buf: &'a mut [u8; HEADER_LEN],
        nonce: &Nonce,
        remote: &PublicKey,
        local_secret: &SecretKey,
    ) -> Option<Self> {
        if crypto::box_decrypt(&mut buf[..], nonce, remote, local_secret) {
            Some(Self { buf })
        } else {
            None
        }
    }

    /// Fill the data nonce field with fresh randomness.
    pub fn generate_data_nonce(&mut self) {
        crypto::fill_random(
            &mut self.buf[Self::DATA_NONCE_OFFSET..Self::DATA_NONCE_OFFSET + NONCE_SIZE],
        );
    }

    /// Fill the followup nonce field with fresh randomness.
    pub fn generate_followup_nonce(&mut self) {
        crypto::fill_random(
            &mut self.buf[Self::FOLLOWUP_NONCE_OFFSET..Self::FOLLOWUP_NONCE_OFFSET + NONCE_SIZE],
        );
    }

    /// Write the payload length field, little-endian regardless of host
    /// byte order.
    pub fn set_message_length(&mut self, length: u32) {
        self.buf[Self::LENGTH_OFFSET..Self::LENGTH_OFFSET + 4]
            .copy_from_slice(&length.to_le_bytes());
    }

    /// The nonce the payload was encrypted under.
    pub fn data_nonce(&self) -> Nonce {
        nonce_at(self.buf, Self::DATA_NONCE_OFFSET)
    }

    /// The nonce the next header will be encrypted under.
    pub fn followup_nonce(&self) -> Nonce {
        nonce_at(self.buf, Self::FOLLOWUP_NONCE_OFFSET)
    }

    /// The declared payload length. Untrusted until bounds-checked.
    pub fn message_length(&self) -> u32 {
        let mut length = [0u8; 4];
        length.copy_from_slice(&self.buf[Self::LENGTH_OFFSET..Self::LENGTH_OFFSET + 4]);
        u32::from_le_bytes(length)
    }

    /// Encrypt the buffer in place under an explicit nonce.
    pub fn encrypt_to(&mut self, nonce: &Nonce, remote: &PublicKey, local_secret: &SecretKey) -> bool {
        crypto::box_encrypt(&mut self.buf[..], nonce, remote, local_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;

    fn random_nonce() -> Nonce {
        let mut nonce = [0u8; NONCE_SIZE];
        crypto::fill_random(&mut nonce);
        nonce
    }

    #[test]
    fn hello_roundtrip() {
        let server = Keypair::generate();
        let client = Keypair::generate();

        let mut buf = [0u8; HELLO_LEN];
        let mut hello = Hello::new(&mut buf);
        hello.set_public_key(&client.public);
        hello.generate_reply_nonce();
        let reply_nonce = hello.reply_nonce();
        assert!(hello.encrypt_to(&server.public));

        let opened = Hello::decrypt(&mut buf, &server.secret).expect("decrypt failed");
        assert_eq!(opened.claimed_public_key(), client.public);
        assert_eq!(opened.reply_nonce(), reply_nonce);
    }

    #[test]
    fn hello_rejects_tampering() {
        let server = Keypair::generate();
        let client = Keypair::generate();

        let mut buf = [0u8; HELLO_LEN];
        let mut hello = Hello::new(&mut buf);
        hello.set_public_key(&client.public);
        hello.generate_reply_nonce();
        assert!(hello.encrypt_to(&server.public));

        buf[HELLO_LEN / 2] ^= 0x01;
        assert!(Hello::decrypt(&mut buf, &server.secret).is_none());
    }

    #[test]
    fn hello_rejects_wrong_recipient() {
        let server = Keypair::generate();
        let other = Keypair::generate();
        let client = Keypair::generate();

        let mut buf = [0u8; HELLO_LEN];
        let mut hello = Hello::new(&mut buf);
        hello.set_public_key(&client.public);
        hello.generate_reply_nonce();
        assert!(hello.encrypt_to(&server.public));

        assert!(Hello::decrypt(&mut buf, &other.secret).is_none());
    }

    #[test]
    fn response_roundtrip() {
        let server = Keypair::generate();
        let client = Keypair::generate();
        let nonce = random_nonce();

        let mut buf = [0u8; RESPONSE_LEN];
        let mut response = Response::new(&mut buf);
        response.generate_reply_nonce();
        response.generate_followup_nonce();
        let reply = response.reply_nonce();
        let followup = response.followup_nonce();
        assert_ne!(reply, followup);
        assert!(response.encrypt_to(&nonce, &client.public, &server.secret));

        let opened = Response::decrypt(&mut buf, &nonce, &server.public, &client.secret)
            .expect("decrypt failed");
        assert_eq!(opened.reply_nonce(), reply);
        assert_eq!(opened.followup_nonce(), followup);
    }

    #[test]
    fn response_rejects_wrong_nonce() {
        let server = Keypair::generate();
        let client = Keypair::generate();
        let nonce = random_nonce();

        let mut buf = [0u8; RESPONSE_LEN];
        let mut response = Response::new(&mut buf);
        response.generate_reply_nonce();
        response.generate_followup_nonce();
        assert!(response.encrypt_to(&nonce, &client.public, &server.secret));

        let wrong = random_nonce();
        assert!(Response::decrypt(&mut buf, &wrong, &server.public, &client.secret).is_none());
    }

    #[test]
    fn header_length_is_little_endian_on_the_wire() {
        let mut buf = [0u8; HEADER_LEN];
        let mut header = Header::new(&mut buf);
        header.set_message_length(0x0102_0304);
        assert_eq!(header.message_length(), 0x0102_0304);
        assert_eq!(
            &buf[HEADER_LEN - 4..],
            &[0x04, 0x03, 0x02, 0x01],
            "length field must be little-endian"
        );
    }

    #[test]
    fn header_roundtrip() {
        let server = Keypair::generate();
        let client = Keypair::generate();
        let nonce = random_nonce();

        let mut buf = [0u8; HEADER_LEN];
        let mut header = Header::new(&mut buf);
        header.generate_data_nonce();
        header.generate_followup_nonce();
        header.set_message_length(2345);
        let data = header.data_nonce();
        let followup = header.followup_nonce();
        assert!(header.encrypt_to(&nonce, &client.public, &server.secret));

        let opened = Header::decrypt(&mut buf, &nonce, &server.public, &client.secret)
            .expect("decrypt failed");
        assert_eq!(opened.data_nonce(), data);
        assert_eq!(opened.followup_nonce(), followup);
        assert_eq!(opened.message_length(), 2345);
    }

    #[test]
    fn header_rejects_single_bit_flip() {
        let server = Keypair::generate();
        let client = Keypair::generate();
        let nonce = random_nonce();

        let mut buf = [0u8; HEADER_LEN];
        let mut header = Header::new(&mut buf);
        header.generate_data_nonce();
        header.generate_followup_nonce();
        header.set_message_length(1);
        assert!(header.encrypt_to(&nonce, &client.public, &server.secret));

        for bit in [0, 3, 7] {
            let mut copy = buf;
            copy[0] ^= 1 << bit;
            assert!(Header::decrypt(&mut copy, &nonce, &server.public, &client.secret).is_none());
        }
    }
}
