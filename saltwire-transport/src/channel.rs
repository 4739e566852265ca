//! Secure channel API.
//!
//! The main public interface for establishing and using secure channels.
//!
//! # Security Invariants
//!
//! - `SecureChannel` does not implement `Clone`
//! - Every error is terminal: drop the channel and reconnect
//! - Plaintext is encrypted in place; the caller's buffer never holds both
//!   plaintext and ciphertext copies
//! - Key material and nonce state are zeroized when the channel drops

use saltwire_core::{HalfSession, Keypair, ProtocolError, PublicKey, SessionState};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::ChannelError;
use crate::handshake;

/// Encrypt `buffer` in place and send it as one framed message.
async fn write_message<S>(
    socket: &mut S,
    session: &mut HalfSession,
    buffer: &mut [u8],
) -> Result<(), ChannelError>
where
    S: AsyncWrite + Unpin,
{
    session.encrypt_message(buffer)?;
    socket.write_all(session.header()).await?;
    socket.write_all(session.mac()).await?;
    socket.write_all(buffer).await?;
    socket.flush().await?;
    Ok(())
}

/// Receive one framed message, decrypting the payload into `buffer`.
///
/// The declared length is checked against the buffer before the MAC or any
/// ciphertext is read, so an oversized claim costs nothing but the header.
async fn read_message<S>(
    socket: &mut S,
    session: &mut HalfSession,
    buffer: &mut [u8],
) -> Result<usize, ChannelError>
where
    S: AsyncRead + Unpin,
{
    socket.read_exact(session.header_mut()).await?;
    let length = session.process_header()? as usize;
    if length > buffer.len() {
        return Err(ChannelError::Protocol(ProtocolError::MessageTooLarge));
    }

    socket.read_exact(session.mac_mut()).await?;
    let payload = &mut buffer[..length];
    socket.read_exact(payload).await?;
    session.decrypt_message(payload)?;
    Ok(length)
}

/// Session halves and socket, boxed so the channel handle stays cheap to
/// move while the nonce and scratch state keep a stable address.
struct Inner<S> {
    socket: S,
    local_public: PublicKey,
    send: HalfSession,
    recv: HalfSession,
}

/// A mutually authenticated, encrypted message channel over an ordered byte
/// stream.
///
/// This type does not implement `Clone`. After any error the channel is
/// unusable; drop it and establish a new one.
pub struct SecureChannel<S = TcpStream> {
    inner: Box<Inner<S>>,
}

impl SecureChannel<TcpStream> {
    /// Connect over TCP and run the initiator's handshake.
    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
        remote: PublicKey,
        keys: Keypair,
    ) -> Result<Self, ChannelError> {
        let socket = TcpStream::connect(addr).await?;
        Self::initiate(socket, remote, keys).await
    }
}

impl<S> SecureChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run the initiator's handshake over an already-connected stream.
    ///
    /// The responder's public key must be known in advance; the handshake
    /// authenticates the responder against exactly that key.
    pub async fn initiate(
        mut socket: S,
        remote: PublicKey,
        keys: Keypair,
    ) -> Result<Self, ChannelError> {
        let mut session = SessionState::initiator(remote, keys);
        handshake::initiate(&mut socket, &mut session).await?;
        let local_public = session.local_public_key().clone();
        let (send, recv) = session.into_halves()?;
        Ok(Self {
            inner: Box::new(Inner {
                socket,
                local_public,
                send,
                recv,
            }),
        })
    }

    /// Run the responder's handshake over an already-accepted stream.
    ///
    /// `authorize` is consulted with the initiator's claimed public key; if
    /// it returns false the handshake aborts with an authentication error.
    pub async fn accept<F>(mut socket: S, keys: Keypair, authorize: F) -> Result<Self, ChannelError>
    where
        F: FnOnce(&PublicKey) -> bool,
    {
        let mut session = SessionState::responder(keys);
        handshake::accept(&mut socket, &mut session, authorize).await?;
        let local_public = session.local_public_key().clone();
        let (send, recv) = session.into_halves()?;
        Ok(Self {
            inner: Box::new(Inner {
                socket,
                local_public,
                send,
                recv,
            }),
        })
    }

    /// This side's long-term public key.
    pub fn local_public_key(&self) -> &PublicKey {
        &self.inner.local_public
    }

    /// The authenticated peer public key.
    pub fn remote_public_key(&self) -> &PublicKey {
        self.inner.recv.remote_public_key()
    }

    /// Receive one message, decrypting it into `buffer`. Returns the
    /// message length.
    ///
    /// Fails with a `MessageTooLarge` protocol error if the peer's declared
    /// length exceeds `buffer.len()`; the check happens before any payload
    /// bytes are read.
    pub async fn read(&mut self, buffer: &mut [u8]) -> Result<usize, ChannelError> {
        let inner = &mut *self.inner;
        read_message(&mut inner.socket, &mut inner.recv, buffer).await
    }

    /// Encrypt `buffer` in place and send it as one message.
    ///
    /// Destructive: on return the buffer holds ciphertext, not the original
    /// plaintext. Messages longer than `u32::MAX` bytes are rejected before
    /// any encryption happens.
    pub async fn write_destructive(&mut self, buffer: &mut [u8]) -> Result<(), ChannelError> {
        let inner = &mut *self.inner;
        write_message(&mut inner.socket, &mut inner.send, buffer).await
    }

    /// Split the channel into independently owned read and write halves so
    /// a reader task and a writer task can run concurrently.
    pub fn into_split(self) -> (ReadChannel<S>, WriteChannel<S>) {
        let inner = *self.inner;
        let (read, write) = tokio::io::split(inner.socket);
        (
            ReadChannel {
                socket: read,
                session: inner.recv,
            },
            WriteChannel {
                socket: write,
                session: inner.send,
            },
        )
    }
}

/// The receiving half of a split [`SecureChannel`].
pub struct ReadChannel<S> {
    socket: ReadHalf<S>,
    session: HalfSession,
}

impl<S: AsyncRead> ReadChannel<S> {
    /// The authenticated peer public key.
    pub fn remote_public_key(&self) -> &PublicKey {
        self.session.remote_public_key()
    }

    /// See [`SecureChannel::read`].
    pub async fn read(&mut self, buffer: &mut [u8]) -> Result<usize, ChannelError> {
        read_message(&mut self.socket, &mut self.session, buffer).await
    }
}

/// The sending half of a split [`SecureChannel`].
pub struct WriteChannel<S> {
    socket: WriteHalf<S>,
    session: HalfSession,
}

impl<S: AsyncWrite> WriteChannel<S> {
    /// The authenticated peer public key.
    pub fn remote_public_key(&self) -> &PublicKey {
        self.session.remote_public_key()
    }

    /// See [`SecureChannel::write_destructive`].
    pub async fn write_destructive(&mut self, buffer: &mut [u8]) -> Result<(), ChannelError> {
        write_message(&mut self.socket, &mut self.session, buffer).await
    }
}
