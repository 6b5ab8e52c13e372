//! Length-delimited [`Envelope`] framing over a byte stream.
//!
//! One call to [`Connection::send`] corresponds to exactly one successful
//! [`Connection::recv`] on the peer; ordering and reliability come from the
//! underlying TCP stream. The connection is generic over the stream type so
//! tests can run the same code over an in-memory duplex pipe.

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use prost::Message;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::wire::Envelope;

/// Upper bound on one encoded frame. Chat payloads are small; anything
/// beyond this is a protocol violation, not a message.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer closed the stream, or the connection was closed locally.
    #[error("connection closed")]
    Closed,
    /// The underlying stream failed mid-read or mid-write.
    #[error("stream failure: {0}")]
    Io(#[from] std::io::Error),
    /// A whole frame arrived but did not decode as an envelope.
    #[error("malformed frame: {0}")]
    Decode(#[from] prost::DecodeError),
}

fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}

/// A duplex, ordered, reliable envelope stream.
///
/// `close` is idempotent: the first call flushes and shuts down the write
/// half, later calls are no-ops, and both `send` and `recv` fail with
/// [`TransportError::Closed`] afterwards.
pub struct Connection<S = TcpStream> {
    framed: Framed<S, LengthDelimitedCodec>,
    closed: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self {
            framed: Framed::new(stream, codec()),
            closed: false,
        }
    }

    /// Write one envelope as a single frame.
    pub async fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.framed.send(Bytes::from(envelope.encode_to_vec())).await?;
        Ok(())
    }

    /// Wait for the next whole envelope from the peer.
    pub async fn recv(&mut self) -> Result<Envelope, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        match self.framed.next().await {
            Some(Ok(frame)) => Ok(Envelope::decode(frame.freeze())?),
            Some(Err(e)) => Err(e.into()),
            None => Err(TransportError::Closed),
        }
    }

    /// Flush and shut down the write half. Safe to call more than once;
    /// only the first call does any work. The peer's pending `recv` observes
    /// end-of-stream and fails with [`TransportError::Closed`].
    pub async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.framed.close().await?;
        Ok(())
    }

    /// Split into independently owned halves: a sink for a writer task and a
    /// stream for the reader loop.
    pub fn into_split(self) -> (FrameSink<S>, FrameStream<S>) {
        let (sink, stream) = self.framed.split();
        (
            FrameSink {
                sink,
                closed: self.closed,
            },
            FrameStream { stream },
        )
    }
}

/// Owned write half of a split [`Connection`].
pub struct FrameSink<S = TcpStream> {
    sink: SplitSink<Framed<S, LengthDelimitedCodec>, Bytes>,
    closed: bool,
}

impl<S: AsyncRead + AsyncWrite + Unpin> FrameSink<S> {
    pub async fn send(&mut self, envelope: &Envelope) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        self.sink.send(Bytes::from(envelope.encode_to_vec())).await?;
        Ok(())
    }

    /// Flush and shut down the write half; idempotent like
    /// [`Connection::close`].
    pub async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.sink.close().await?;
        Ok(())
    }
}

/// Owned read half of a split [`Connection`].
pub struct FrameStream<S = TcpStream> {
    stream: SplitStream<Framed<S, LengthDelimitedCodec>>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> FrameStream<S> {
    /// Wait for the next whole envelope from the peer.
    pub async fn recv(&mut self) -> Result<Envelope, TransportError> {
        match self.stream.next().await {
            Some(Ok(frame)) => Ok(Envelope::decode(frame.freeze())?),
            Some(Err(e)) => Err(e.into()),
            None => Err(TransportError::Closed),
        }
    }
}
