//! Split I/O connection carrying whole TDS messages.
//!
//! The transport is split into read and write halves so that an Attention
//! packet can be sent from another task while a read is pending.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use tds_protocol::ProtocolError;
use tds_protocol::packet::{
    DEFAULT_PACKET_SIZE, PacketHeader, PacketStatus, PacketType, validate_packet_size,
};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::{Mutex, Notify};

use crate::error::CodecError;
use crate::framed::{PacketReader, PacketWriter};
use crate::framing::frame;
use crate::message::{Message, MessageAssembler};
use crate::packet_codec::{Packet, TdsCodec};

/// DONE token type byte.
const DONE_TOKEN: u8 = 0xFD;
/// DONE token length: type, status, curcmd, row count.
const DONE_TOKEN_LEN: usize = 13;
/// DONE status bit acknowledging an Attention.
const DONE_ATTN: u16 = 0x0020;

/// A TDS connection exchanging complete messages.
///
/// ```rust,ignore
/// use tds_codec::Connection;
/// use tds_protocol::PacketType;
///
/// let mut conn = Connection::with_packet_size(stream, 4096)?;
/// conn.send_message(PacketType::Rpc, &payload).await?;
/// let reply = conn.read_expected(PacketType::TabularResult).await?;
/// ```
pub struct Connection<T>
where
    T: AsyncRead + AsyncWrite,
{
    reader: PacketReader<ReadHalf<T>>,
    /// Write half, shared with cancel handles.
    writer: Arc<Mutex<PacketWriter<WriteHalf<T>>>>,
    assembler: MessageAssembler,
    max_packet_size: usize,
    cancel_notify: Arc<Notify>,
    cancelling: Arc<AtomicBool>,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite,
{
    /// Create a connection using the default 4096-byte packet size.
    pub fn new(transport: T) -> Self {
        Self::build(transport, DEFAULT_PACKET_SIZE)
    }

    /// Create a connection with a negotiated packet size.
    pub fn with_packet_size(transport: T, max_packet_size: usize) -> Result<Self, ProtocolError> {
        let max_packet_size = validate_packet_size(max_packet_size)?;
        Ok(Self::build(transport, max_packet_size))
    }

    fn build(transport: T, max_packet_size: usize) -> Self {
        let (read_half, write_half) = tokio::io::split(transport);
        let codec = || TdsCodec::new().with_max_packet_size(max_packet_size);

        Self {
            reader: PacketReader::with_codec(read_half, codec()),
            writer: Arc::new(Mutex::new(PacketWriter::with_codec(write_half, codec()))),
            assembler: MessageAssembler::new(),
            max_packet_size,
            cancel_notify: Arc::new(Notify::new()),
            cancelling: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Negotiated maximum packet size.
    #[must_use]
    pub fn packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Change the packet size, e.g. after the server's ENVCHANGE.
    pub async fn set_packet_size(&mut self, max_packet_size: usize) -> Result<(), ProtocolError> {
        let max_packet_size = validate_packet_size(max_packet_size)?;
        self.max_packet_size = max_packet_size;
        *self.reader.codec_mut() = TdsCodec::new().with_max_packet_size(max_packet_size);
        let mut writer = self.writer.lock().await;
        *writer.codec_mut() = TdsCodec::new().with_max_packet_size(max_packet_size);
        Ok(())
    }

    /// Get a handle for cancelling requests on this connection.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle<T> {
        CancelHandle {
            writer: Arc::clone(&self.writer),
            notify: Arc::clone(&self.cancel_notify),
            cancelling: Arc::clone(&self.cancelling),
        }
    }

    /// Check if a cancellation is currently in progress.
    #[must_use]
    pub fn is_cancelling(&self) -> bool {
        self.cancelling.load(Ordering::Acquire)
    }
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Frame `payload` and write every packet, flushing once at the end.
    pub async fn send_message(
        &mut self,
        packet_type: PacketType,
        payload: &[u8],
    ) -> Result<(), CodecError> {
        let packets = frame(payload, packet_type, self.max_packet_size)?;
        let count = packets.len();

        let mut writer = self.writer.lock().await;
        writer.codec_mut().reset_packet_id();
        for packet in packets {
            writer.feed(packet).await?;
        }
        writer.flush().await?;

        tracing::debug!(
            packet_type = ?packet_type,
            payload_len = payload.len(),
            packets = count,
            "sent message"
        );
        Ok(())
    }

    /// Read the next complete message.
    ///
    /// Returns `Ok(None)` when the peer closes between messages, or when a
    /// cancellation has been acknowledged.
    pub async fn read_message(&mut self) -> Result<Option<Message>, CodecError> {
        if self.is_cancelling() {
            return self.drain_after_cancel().await;
        }

        loop {
            match self.reader.next().await {
                Some(Ok(packet)) => {
                    if let Some(message) = self.assembler.push(packet)? {
                        return Ok(Some(message));
                    }
                }
                Some(Err(e)) => return Err(e),
                None if self.assembler.has_partial() => {
                    self.assembler.clear();
                    return Err(CodecError::ConnectionClosed);
                }
                None => return Ok(None),
            }
        }
    }

    /// Read the next message and require it to be of `expected` type.
    pub async fn read_expected(&mut self, expected: PacketType) -> Result<Message, CodecError> {
        let message = self
            .read_message()
            .await?
            .ok_or(CodecError::ConnectionClosed)?;
        if message.packet_type != expected {
            return Err(ProtocolError::UnexpectedPacketType {
                expected,
                actual: message.packet_type,
            }
            .into());
        }
        Ok(message)
    }

    /// Read a single packet without reassembly.
    pub async fn read_packet(&mut self) -> Result<Option<Packet>, CodecError> {
        self.reader.next().await.transpose()
    }

    /// Discard incoming packets until the server acknowledges the Attention.
    async fn drain_after_cancel(&mut self) -> Result<Option<Message>, CodecError> {
        tracing::debug!("draining packets after cancellation");
        self.assembler.clear();

        let result = loop {
            match self.reader.next().await {
                Some(Ok(packet)) => match self.assembler.push(packet) {
                    Ok(Some(message))
                        if message.packet_type == PacketType::TabularResult
                            && is_attention_ack(&message.payload) =>
                    {
                        tracing::debug!("received DONE with ATTENTION, cancellation complete");
                        break Ok(None);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(error = %e, "discarding stale partial message");
                    }
                },
                Some(Err(e)) => break Err(e),
                None => break Ok(None),
            }
        };
        self.assembler.clear();

        self.cancelling.store(false, Ordering::Release);
        self.cancel_notify.notify_waiters();
        result
    }
}

/// Check whether a complete reply ends in a DONE token with the ATTN bit.
fn is_attention_ack(payload: &[u8]) -> bool {
    let Some(start) = payload.len().checked_sub(DONE_TOKEN_LEN) else {
        return false;
    };
    let done = &payload[start..];
    done[0] == DONE_TOKEN && u16::from_le_bytes([done[1], done[2]]) & DONE_ATTN != 0
}

impl<T> std::fmt::Debug for Connection<T>
where
    T: AsyncRead + AsyncWrite,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("max_packet_size", &self.max_packet_size)
            .field("cancelling", &self.is_cancelling())
            .field("has_partial_message", &self.assembler.has_partial())
            .finish_non_exhaustive()
    }
}

/// Handle for cancelling requests on a connection.
///
/// Cloneable and `Send` when the transport is, so it can be moved to
/// another task.
pub struct CancelHandle<T>
where
    T: AsyncRead + AsyncWrite,
{
    writer: Arc<Mutex<PacketWriter<WriteHalf<T>>>>,
    notify: Arc<Notify>,
    cancelling: Arc<AtomicBool>,
}

impl<T> CancelHandle<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Send an Attention packet.
    ///
    /// The next [`Connection::read_message`] drains the pending reply up to
    /// the server's acknowledgement.
    pub async fn cancel(&self) -> Result<(), CodecError> {
        self.cancelling.store(true, Ordering::Release);
        tracing::debug!("sending Attention packet");

        let header = PacketHeader::new(PacketType::Attention, PacketStatus::END_OF_MESSAGE, 0);
        let mut writer = self.writer.lock().await;
        writer.send(Packet::new(header, bytes::Bytes::new())).await
    }

    /// Wait until the server has acknowledged the cancellation.
    pub async fn wait_cancelled(&self) {
        if self.cancelling.load(Ordering::Acquire) {
            self.notify.notified().await;
        }
    }

    /// Check if a cancellation is currently in progress.
    #[must_use]
    pub fn is_cancelling(&self) -> bool {
        self.cancelling.load(Ordering::Acquire)
    }
}

impl<T> Clone for CancelHandle<T>
where
    T: AsyncRead + AsyncWrite,
{
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
            notify: Arc::clone(&self.notify),
            cancelling: Arc::clone(&self.cancelling),
        }
    }
}

impl<T> std::fmt::Debug for CancelHandle<T>
where
    T: AsyncRead + AsyncWrite,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelling", &self.cancelling.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::framed::PacketStream;
    use bytes::Bytes;

    fn reply_packet(status: PacketStatus, payload: &'static [u8]) -> Packet {
        Packet::new(
            PacketHeader::new(PacketType::TabularResult, status, 0),
            Bytes::from_static(payload),
        )
    }

    #[tokio::test]
    async fn test_send_message_splits_by_packet_size() {
        let (client, server) = tokio::io::duplex(1024);
        let mut conn = Connection::with_packet_size(client, 16).unwrap();
        let mut peer = PacketStream::new(server);

        conn.send_message(PacketType::Rpc, &[5u8; 20]).await.unwrap();

        let mut sizes = Vec::new();
        loop {
            let packet = peer.next().await.unwrap().unwrap();
            assert_eq!(packet.header.packet_type, PacketType::Rpc);
            assert_eq!(packet.header.packet_id as usize, sizes.len() + 1);
            sizes.push(packet.payload.len());
            if packet.is_end_of_message() {
                break;
            }
        }
        assert_eq!(sizes, vec![8, 8, 4]);
    }

    #[tokio::test]
    async fn test_read_message_reassembles() {
        let (client, server) = tokio::io::duplex(1024);
        let mut conn = Connection::new(client);
        let mut peer = PacketStream::new(server);

        peer.feed(reply_packet(PacketStatus::NORMAL, b"row "))
            .await
            .unwrap();
        peer.send(reply_packet(PacketStatus::END_OF_MESSAGE, b"data"))
            .await
            .unwrap();

        let message = conn.read_expected(PacketType::TabularResult).await.unwrap();
        assert_eq!(&message.payload[..], b"row data");
    }

    #[tokio::test]
    async fn test_read_expected_rejects_other_type() {
        let (client, server) = tokio::io::duplex(1024);
        let mut conn = Connection::new(client);
        let mut peer = PacketStream::new(server);

        let header = PacketHeader::new(PacketType::PreLogin, PacketStatus::END_OF_MESSAGE, 0);
        peer.send(Packet::new(header, Bytes::from_static(b"x")))
            .await
            .unwrap();

        let err = conn
            .read_expected(PacketType::TabularResult)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::UnexpectedPacketType { .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_mid_message() {
        let (client, server) = tokio::io::duplex(1024);
        let mut conn = Connection::new(client);
        let mut peer = PacketStream::new(server);

        peer.send(reply_packet(PacketStatus::NORMAL, b"partial"))
            .await
            .unwrap();
        drop(peer);

        assert!(matches!(
            conn.read_message().await,
            Err(CodecError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_cancel_sends_attention_and_drains() {
        let (client, server) = tokio::io::duplex(1024);
        let mut conn = Connection::new(client);
        let mut peer = PacketStream::new(server);

        let handle = conn.cancel_handle();
        handle.cancel().await.unwrap();
        assert!(conn.is_cancelling());

        let attention = peer.next().await.unwrap().unwrap();
        assert_eq!(attention.header.packet_type, PacketType::Attention);
        assert!(attention.is_end_of_message());
        assert!(attention.payload.is_empty());

        peer.feed(reply_packet(PacketStatus::END_OF_MESSAGE, b"stale rows"))
            .await
            .unwrap();
        peer.send(reply_packet(
            PacketStatus::END_OF_MESSAGE,
            &[0xFD, 0x20, 0x00, 0x00, 0x00, 0, 0, 0, 0, 0, 0, 0, 0],
        ))
        .await
        .unwrap();

        assert!(conn.read_message().await.unwrap().is_none());
        assert!(!handle.is_cancelling());
    }

    #[tokio::test]
    async fn test_drain_ignores_done_bytes_inside_rows() {
        let (client, server) = tokio::io::duplex(1024);
        let mut conn = Connection::new(client);
        let mut peer = PacketStream::new(server);

        let handle = conn.cancel_handle();
        handle.cancel().await.unwrap();
        peer.next().await.unwrap().unwrap();

        // A row whose data happens to contain FD 20 00, then a DONE token
        // split across two packets.
        peer.feed(reply_packet(
            PacketStatus::END_OF_MESSAGE,
            &[0xD1, 0xFD, 0x20, 0x00, 0x00],
        ))
        .await
        .unwrap();
        peer.feed(reply_packet(PacketStatus::NORMAL, &[0xFD, 0x20]))
            .await
            .unwrap();
        peer.feed(reply_packet(
            PacketStatus::END_OF_MESSAGE,
            &[0x00, 0x00, 0x00, 0, 0, 0, 0, 0, 0, 0, 0],
        ))
        .await
        .unwrap();
        peer.send(reply_packet(PacketStatus::END_OF_MESSAGE, b"next"))
            .await
            .unwrap();

        assert!(conn.read_message().await.unwrap().is_none());
        assert!(!handle.is_cancelling());

        let next = conn.read_message().await.unwrap().unwrap();
        assert_eq!(&next.payload[..], b"next");
    }

    #[test]
    fn test_attention_ack_detection() {
        let ack = [0xFD, 0x20, 0x00, 0x00, 0x00, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(is_attention_ack(&ack));

        let mut with_rows = vec![0xD1, 0xFD, 0x20, 0x00];
        with_rows.extend_from_slice(&ack);
        assert!(is_attention_ack(&with_rows));

        assert!(!is_attention_ack(&[0xD1, 0xFD, 0x20, 0x00, 0x00]));
        assert!(!is_attention_ack(&[0xFD, 0x00, 0x00, 0x00, 0x00, 0, 0, 0, 0, 0, 0, 0, 0]));
        assert!(!is_attention_ack(&ack[..12]));
    }

    #[test]
    fn test_invalid_packet_size() {
        let (client, _server) = tokio::io::duplex(64);
        assert!(matches!(
            Connection::with_packet_size(client, 4),
            Err(ProtocolError::InvalidPacketSize(4))
        ));
    }
}
