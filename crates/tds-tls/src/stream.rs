//! PreLogin-framed transport for the TDS 7.x TLS handshake.
//!
//! While the handshake is pending, TLS records travel inside PreLogin
//! packets: writes go through [`BatchState`] and reads have the packet header
//! stripped. After [`HandshakeStream::handshake_complete`] the stream is a
//! transparent pass-through.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::{Buf, BytesMut};
use tds_protocol::packet::{
    MAX_PACKET_SIZE, PACKET_HEADER_SIZE, PacketHeader, PacketStatus, PacketType,
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::batch::{BatchState, Outcome};

/// Transport wrapper that batches handshake records into PreLogin packets.
pub struct HandshakeStream<S> {
    stream: S,
    pending_handshake: bool,

    // Read state
    header_buf: [u8; PACKET_HEADER_SIZE],
    header_pos: usize,
    read_remaining: usize,

    // Write state
    state: BatchState,
    outgoing: BytesMut,
}

impl<S> HandshakeStream<S> {
    /// Wrap a transport with the handshake pending.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            pending_handshake: true,
            header_buf: [0u8; PACKET_HEADER_SIZE],
            header_pos: 0,
            read_remaining: 0,
            state: BatchState::PassThrough,
            outgoing: BytesMut::new(),
        }
    }

    /// Switch both directions to pass-through.
    ///
    /// Callers flush before switching; bytes still queued would otherwise be
    /// overtaken by later writes.
    pub fn handshake_complete(&mut self) {
        if self.state.pending_len() > 0 {
            tracing::warn!(
                pending = self.state.pending_len(),
                "handshake completed with deferred TLS records"
            );
        }
        self.pending_handshake = false;
        tracing::debug!("PreLogin framing disabled, handshake complete");
    }

    /// Check whether PreLogin framing is still active.
    #[must_use]
    pub fn is_handshake_pending(&self) -> bool {
        self.pending_handshake
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Get a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Consume the wrapper and return the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    fn queue_packet(&mut self, payload: &[u8]) -> io::Result<()> {
        let total = PACKET_HEADER_SIZE + payload.len();
        if total > MAX_PACKET_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("TLS flight of {} bytes exceeds one PreLogin packet", payload.len()),
            ));
        }

        let header = PacketHeader::new(
            PacketType::PreLogin,
            PacketStatus::END_OF_MESSAGE,
            total as u16,
        )
        .with_packet_id(1);
        self.outgoing.reserve(total);
        header.encode(&mut self.outgoing);
        self.outgoing.extend_from_slice(payload);

        tracing::trace!(length = total, "queued PreLogin packet");
        Ok(())
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for HandshakeStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if !this.pending_handshake {
            return Pin::new(&mut this.stream).poll_read(cx, buf);
        }

        // Empty PreLogin packets are skipped.
        while this.read_remaining == 0 {
            while this.header_pos < PACKET_HEADER_SIZE {
                let mut header_buf = ReadBuf::new(&mut this.header_buf[this.header_pos..]);
                ready!(Pin::new(&mut this.stream).poll_read(cx, &mut header_buf))?;
                let n = header_buf.filled().len();
                if n == 0 {
                    if this.header_pos == 0 {
                        return Poll::Ready(Ok(()));
                    }
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "transport closed inside a PreLogin packet header",
                    )));
                }
                this.header_pos += n;
            }

            let header = PacketHeader::decode(&mut &this.header_buf[..])
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            if header.packet_type != PacketType::PreLogin {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "expected PreLogin packet during TLS handshake, got {:?}",
                        header.packet_type
                    ),
                )));
            }

            this.header_pos = 0;
            this.read_remaining = header.payload_length();
            tracing::trace!(
                payload_len = this.read_remaining,
                "unwrapping PreLogin packet"
            );
        }

        let max_read = this.read_remaining.min(buf.remaining());
        if max_read == 0 {
            return Poll::Ready(Ok(()));
        }

        let mut temp = vec![0u8; max_read];
        let mut temp_buf = ReadBuf::new(&mut temp);
        ready!(Pin::new(&mut this.stream).poll_read(cx, &mut temp_buf))?;
        let n = temp_buf.filled().len();
        if n == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "transport closed inside a PreLogin packet",
            )));
        }
        buf.put_slice(&temp[..n]);
        this.read_remaining -= n;

        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for HandshakeStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        if !this.pending_handshake {
            return Pin::new(&mut this.stream).poll_write(cx, buf);
        }

        let (state, outcomes) = std::mem::take(&mut this.state).process(buf);
        this.state = state;

        for outcome in outcomes {
            match outcome {
                Outcome::Packet(payload) => this.queue_packet(&payload)?,
                Outcome::Raw(bytes) => this.outgoing.extend_from_slice(&bytes),
                Outcome::Deferred | Outcome::Discarded => {}
            }
        }

        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        while !this.outgoing.is_empty() {
            let n = ready!(Pin::new(&mut this.stream).poll_write(cx, &this.outgoing))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            this.outgoing.advance(n);
        }

        Pin::new(&mut this.stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for HandshakeStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeStream")
            .field("stream", &self.stream)
            .field("pending_handshake", &self.pending_handshake)
            .field("deferred", &self.state.pending_len())
            .field("queued", &self.outgoing.len())
            .finish()
    }
}
