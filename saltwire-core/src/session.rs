//! Per-connection session state and the nonce ratchet.
//!
//! A [`SessionState`] is created once per connection attempt and lives
//! exactly as long as the connection. It owns the local identity, the peer
//! public key once learned, one [`DirectionState`] per traffic direction,
//! and scratch buffers for the two handshake messages.
//!
//! Nonce pairing invariant: after every successful handshake step and every
//! successfully processed message header, this side's send nonce equals the
//! peer's receive nonce for that direction. A nonce is used for exactly one
//! encryption and then replaced — by fresh randomness for payload nonces, or
//! by the peer-agreed followup carried inside an already-authenticated
//! message for header nonces.
//!
//! All operations here are I/O-free; the transport layer shuttles the scratch
//! buffers over the wire between calls.

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{self, Keypair, Mac, Nonce, PublicKey, SecretKey, MAC_SIZE, NONCE_SIZE};
use crate::error::ProtocolError;
use crate::wire::{Header, Hello, Response, HEADER_LEN, HELLO_LEN, RESPONSE_LEN};

/// One traffic direction of a session: its ratchet nonce plus header and MAC
/// scratch. Wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DirectionState {
    nonce: Nonce,
    header: [u8; HEADER_LEN],
    mac: Mac,
}

impl DirectionState {
    fn new() -> Self {
        Self {
            nonce: [0u8; NONCE_SIZE],
            header: [0u8; HEADER_LEN],
            mac: [0u8; MAC_SIZE],
        }
    }

    /// The current ratchet nonce for this direction.
    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// The header scratch buffer, for sending after [`Self::encrypt_message`].
    pub fn header(&self) -> &[u8; HEADER_LEN] {
        &self.header
    }

    /// The header scratch buffer, for receiving into.
    pub fn header_mut(&mut self) -> &mut [u8; HEADER_LEN] {
        &mut self.header
    }

    /// The MAC scratch, for sending after [`Self::encrypt_message`].
    pub fn mac(&self) -> &Mac {
        &self.mac
    }

    /// The MAC scratch, for receiving into.
    pub fn mac_mut(&mut self) -> &mut Mac {
        &mut self.mac
    }

    /// Encrypt `plaintext` in place and build the encrypted header for it.
    ///
    /// On success the header scratch holds the encrypted header, the MAC
    /// scratch holds the payload tag, `plaintext` holds ciphertext, and the
    /// ratchet has advanced to the freshly generated followup nonce. Send
    /// header, MAC, then ciphertext, in that order.
    pub fn encrypt_message(
        &mut self,
        plaintext: &mut [u8],
        remote: &PublicKey,
        secret: &SecretKey,
    ) -> Result<(), ProtocolError> {
        // Bounds check before any encryption work.
        let length = u32::try_from(plaintext.len()).map_err(|_| ProtocolError::MessageTooLarge)?;

        let mut header = Header::new(&mut self.header);
        header.generate_data_nonce();
        header.generate_followup_nonce();
        header.set_message_length(length);

        let data_nonce = header.data_nonce();
        if !crypto::box_encrypt_detached(plaintext, &mut self.mac, &data_nonce, remote, secret) {
            return Err(ProtocolError::MessageEncrypt);
        }

        let followup = header.followup_nonce();
        if !header.encrypt_to(&self.nonce, remote, secret) {
            return Err(ProtocolError::MessageHeaderEncrypt);
        }
        self.nonce = followup;

        Ok(())
    }

    /// Decrypt the header scratch and return the declared payload length.
    ///
    /// On success the ratchet advances immediately to the header's followup
    /// nonce, so a replayed header can never decrypt again. The returned
    /// length is untrusted: the caller must bounds-check it against its
    /// buffer before reading the MAC or ciphertext.
    pub fn process_header(
        &mut self,
        remote: &PublicKey,
        secret: &SecretKey,
    ) -> Result<u32, ProtocolError> {
        let header = Header::decrypt(&mut self.header, &self.nonce, remote, secret)
            .ok_or(ProtocolError::MessageHeaderDecrypt)?;
        let followup = header.followup_nonce();
        let length = header.message_length();
        self.nonce = followup;
        Ok(length)
    }

    /// Decrypt `ciphertext` in place using the data nonce of the header most
    /// recently accepted by [`Self::process_header`].
    pub fn decrypt_message(
        &mut self,
        ciphertext: &mut [u8],
        remote: &PublicKey,
        secret: &SecretKey,
    ) -> Result<(), ProtocolError> {
        let header = Header::new(&mut self.header);
        let data_nonce = header.data_nonce();
        if !crypto::box_decrypt_detached(ciphertext, &self.mac, &data_nonce, remote, secret) {
            return Err(ProtocolError::MessageDecrypt);
        }
        Ok(())
    }
}

/// One direction of an established session, bundling the direction state
/// with the keys it encrypts under. Produced by [`SessionState::into_halves`]
/// so that a reader and a writer can run concurrently, each owning its side.
pub struct HalfSession {
    remote: PublicKey,
    secret: SecretKey,
    dir: DirectionState,
}

impl HalfSession {
    /// The authenticated peer public key.
    pub fn remote_public_key(&self) -> &PublicKey {
        &self.remote
    }

    /// The current ratchet nonce for this direction.
    pub fn nonce(&self) -> &Nonce {
        self.dir.nonce()
    }

    /// The header scratch buffer.
    pub fn header(&self) -> &[u8; HEADER_LEN] {
        self.dir.header()
    }

    /// The header scratch buffer, for receiving into.
    pub fn header_mut(&mut self) -> &mut [u8; HEADER_LEN] {
        self.dir.header_mut()
    }

    /// The MAC scratch.
    pub fn mac(&self) -> &Mac {
        self.dir.mac()
    }

    /// The MAC scratch, for receiving into.
    pub fn mac_mut(&mut self) -> &mut Mac {
        self.dir.mac_mut()
    }

    /// See [`DirectionState::encrypt_message`].
    pub fn encrypt_message(&mut self, plaintext: &mut [u8]) -> Result<(), ProtocolError> {
        self.dir.encrypt_message(plaintext, &self.remote, &self.secret)
    }

    /// See [`DirectionState::process_header`].
    pub fn process_header(&mut self) -> Result<u32, ProtocolError> {
        self.dir.process_header(&self.remote, &self.secret)
    }

    /// See [`DirectionState::decrypt_message`].
    pub fn decrypt_message(&mut self, ciphertext: &mut [u8]) -> Result<(), ProtocolError> {
        self.dir.decrypt_message(ciphertext, &self.remote, &self.secret)
    }
}

/// Per-connection mutable session record.
///
/// Owned exclusively by one connection's active state machine; never shared.
pub struct SessionState {
    local_public: PublicKey,
    local_secret: SecretKey,
    /// Write-once: set at construction for the initiator, set by
    /// [`Self::process_hello`] for the responder once the claimed key passes
    /// authorization.
    remote_public: Option<PublicKey>,
    send: DirectionState,
    recv: DirectionState,
    hello: Zeroizing<[u8; HELLO_LEN]>,
    response: Zeroizing<[u8; RESPONSE_LEN]>,
}

impl SessionState {
    /// Session for the connecting side. The responder's public key must be
    /// known in advance.
    pub fn initiator(remote_public: PublicKey, keys: Keypair) -> Self {
        Self {
            local_public: keys.public,
            local_secret: keys.secret,
            remote_public: Some(remote_public),
            send: DirectionState::new(),
            recv: DirectionState::new(),
            hello: Zeroizing::new([0u8; HELLO_LEN]),
            response: Zeroizing::new([0u8; RESPONSE_LEN]),
        }
    }

    /// Session for the accepting side. The peer is unknown until its hello
    /// passes authorization.
    pub fn responder(keys: Keypair) -> Self {
        Self {
            local_public: keys.public,
            local_secret: keys.secret,
            remote_public: None,
            send: DirectionState::new(),
            recv: DirectionState::new(),
            hello: Zeroizing::new([0u8; HELLO_LEN]),
            response: Zeroizing::new([0u8; RESPONSE_LEN]),
        }
    }

    /// This side's long-term public key.
    pub fn local_public_key(&self) -> &PublicKey {
        &self.local_public
    }

    /// The peer's public key, once learned.
    pub fn remote_public_key(&self) -> Option<&PublicKey> {
        self.remote_public.as_ref()
    }

    /// The nonce the next outbound header will be encrypted under.
    pub fn encrypt_nonce(&self) -> &Nonce {
        self.send.nonce()
    }

    /// The nonce the next inbound message is expected under.
    pub fn decrypt_nonce(&self) -> &Nonce {
        self.recv.nonce()
    }

    /// The hello scratch buffer, for sending.
    pub fn hello(&self) -> &[u8; HELLO_LEN] {
        &self.hello
    }

    /// The hello scratch buffer, for receiving into.
    pub fn hello_mut(&mut self) -> &mut [u8; HELLO_LEN] {
        &mut self.hello
    }

    /// The response scratch buffer, for sending.
    pub fn response(&self) -> &[u8; RESPONSE_LEN] {
        &self.response
    }

    /// The response scratch buffer, for receiving into.
    pub fn response_mut(&mut self) -> &mut [u8; RESPONSE_LEN] {
        &mut self.response
    }

    /// Initiator: build the sealed hello in the hello scratch.
    ///
    /// Writes the local public key and a fresh reply nonce, installs that
    /// nonce as the decrypt nonce, and seals the buffer to the responder.
    pub fn make_hello(&mut self) -> Result<(), ProtocolError> {
        let remote = self
            .remote_public
            .as_ref()
            .ok_or(ProtocolError::HandshakeHelloEncrypt)?;

        let mut hello = Hello::new(&mut self.hello);
        hello.set_public_key(&self.local_public);
        hello.generate_reply_nonce();
        self.recv.nonce = hello.reply_nonce();

        if !hello.encrypt_to(remote) {
            return Err(ProtocolError::HandshakeHelloEncrypt);
        }
        Ok(())
    }

    /// Responder: open the received hello and authorize the claimed key.
    ///
    /// On acceptance the claimed key becomes the session's peer key and the
    /// hello's reply nonce becomes the encrypt nonce. The predicate is a pure
    /// capability check; it must not perform I/O.
    pub fn process_hello<F>(&mut self, authorize: F) -> Result<(), ProtocolError>
    where
        F: FnOnce(&PublicKey) -> bool,
    {
        let hello = Hello::decrypt(&mut self.hello, &self.local_secret)
            .ok_or(ProtocolError::HandshakeHelloDecrypt)?;

        let claimed = hello.claimed_public_key();
        if !authorize(&claimed) {
            return Err(ProtocolError::HandshakeAuthentication);
        }

        self.send.nonce = hello.reply_nonce();
        self.remote_public = Some(claimed);
        Ok(())
    }

    /// Responder: build the encrypted response in the response scratch.
    ///
    /// Generates a fresh reply nonce (installed as the decrypt nonce) and a
    /// fresh followup nonce, encrypts under the hello's reply nonce, then
    /// advances the encrypt nonce to the followup.
    pub fn make_response(&mut self) -> Result<(), ProtocolError> {
        let remote = self
            .remote_public
            .as_ref()
            .ok_or(ProtocolError::HandshakeResponseEncrypt)?;

        let mut response = Response::new(&mut self.response);
        response.generate_reply_nonce();
        self.recv.nonce = response.reply_nonce();

        response.generate_followup_nonce();
        let followup = response.followup_nonce();

        if !response.encrypt_to(&self.send.nonce, remote, &self.local_secret) {
            return Err(ProtocolError::HandshakeResponseEncrypt);
        }
        self.send.nonce = followup;
        Ok(())
    }

    /// Initiator: decrypt the received response and finish the ratchet setup.
    ///
    /// On success the encrypt nonce becomes the response's reply nonce and
    /// the decrypt nonce becomes its followup nonce, completing the
    /// synchronized pair for both directions.
    pub fn process_response(&mut self) -> Result<(), ProtocolError> {
        let remote = self
            .remote_public
            .as_ref()
            .ok_or(ProtocolError::HandshakeResponseDecrypt)?;

        let response = Response::decrypt(
            &mut self.response,
            &self.recv.nonce,
            remote,
            &self.local_secret,
        )
        .ok_or(ProtocolError::HandshakeResponseDecrypt)?;

        self.send.nonce = response.reply_nonce();
        self.recv.nonce = response.followup_nonce();
        Ok(())
    }

    /// Consume an established session, yielding independent send and receive
    /// halves so a reader and a writer can run concurrently.
    ///
    /// Fails if the handshake has not completed (no authenticated peer).
    pub fn into_halves(self) -> Result<(HalfSession, HalfSession), ProtocolError> {
        let remote = self
            .remote_public
            .ok_or(ProtocolError::HandshakeAuthentication)?;
        let send = HalfSession {
            remote: remote.clone(),
            secret: self.local_secret.clone(),
            dir: self.send,
        };
        let recv = HalfSession {
            remote,
            secret: self.local_secret,
            dir: self.recv,
        };
        Ok((send, recv))
    }
}
