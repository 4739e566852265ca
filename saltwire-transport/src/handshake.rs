//! The two-message handshake over an ordered byte stream.
//!
//! Wire sequence:
//!
//! ```text
//! initiator -> responder : sealed hello      (104 bytes)
//! responder -> initiator : encrypted response (64 bytes)
//! ```
//!
//! Both messages are fixed-size, so each side reads exactly the bytes it
//! expects. Any cryptographic or authorization failure aborts the connection;
//! a failed handshake is never retried on the same stream.

use saltwire_core::{PublicKey, SessionState};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ChannelError;

/// Drive the initiator's side: send the hello, read and verify the response.
pub(crate) async fn initiate<S>(
    socket: &mut S,
    session: &mut SessionState,
) -> Result<(), ChannelError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    session.make_hello()?;
    socket.write_all(session.hello()).await?;
    socket.flush().await?;

    socket.read_exact(session.response_mut()).await?;
    session.process_response()?;
    Ok(())
}

/// Drive the responder's side: read and authorize the hello, send the
/// response. The `authorize` predicate decides whether the claimed public
/// key may connect; rejection aborts before any response bytes are written.
pub(crate) async fn accept<S, F>(
    socket: &mut S,
    session: &mut SessionState,
    authorize: F,
) -> Result<(), ChannelError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnOnce(&PublicKey) -> bool,
{
    socket.read_exact(session.hello_mut()).await?;
    session.process_hello(authorize)?;

    session.make_response()?;
    socket.write_all(session.response()).await?;
    socket.flush().await?;
    Ok(())
}
