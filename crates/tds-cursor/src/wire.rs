//! Cursor procedures over a TDS connection.
//!
//! Each call encodes one `sp_cursor*` RPC request, frames it as an RPC
//! message and waits for the reply message. Turning the reply's token stream
//! into a return status, output parameters, rows and server messages is the
//! job of a [`ReplyDecoder`].

use tds_codec::Connection;
use tds_protocol::rpc::{ProcId, RpcRequest};
use tds_protocol::{ErrorRecord, PacketType, ProtocolError};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::CursorConfig;
use crate::error::Result;
use crate::fetch::{ConcurrencyOptions, FetchRequest, ScrollOptions};
use crate::rpc::{CloseReply, CursorRpc, FetchReply, InfoReply, OpenReply};

/// Decoded reply to one RPC request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcReply<R> {
    /// Procedure return status, if the reply carried one.
    pub return_status: Option<i32>,
    /// Integer output parameters in declaration order; `None` for NULL.
    pub outputs: Vec<Option<i32>>,
    /// Rows of the result set.
    pub rows: Vec<R>,
    /// Errors and informational messages, in arrival order.
    pub messages: Vec<ErrorRecord>,
}

impl<R> Default for RpcReply<R> {
    fn default() -> Self {
        Self {
            return_status: None,
            outputs: Vec::new(),
            rows: Vec::new(),
            messages: Vec::new(),
        }
    }
}

/// Decodes reply messages into [`RpcReply`] values.
pub trait ReplyDecoder {
    /// Row type produced.
    type Row;

    /// Decode the reply to a request for `procedure`.
    fn decode(
        &mut self,
        procedure: ProcId,
        payload: &[u8],
    ) -> std::result::Result<RpcReply<Self::Row>, ProtocolError>;
}

/// Output parameter lookup for one reply.
///
/// When the server reported an error the outputs are usually absent; they
/// read as 0 so the caller can surface the server error instead.
struct Outputs<'a, R> {
    reply: &'a RpcReply<R>,
    procedure: &'static str,
    lenient: bool,
}

impl<'a, R> Outputs<'a, R> {
    fn new(reply: &'a RpcReply<R>, procedure: ProcId) -> Self {
        Self {
            reply,
            procedure: procedure.name(),
            lenient: reply.messages.iter().any(|m| !m.is_warning()),
        }
    }

    fn status(&self) -> std::result::Result<i32, ProtocolError> {
        self.require(self.reply.return_status, "RETURN_STATUS")
    }

    fn get(&self, index: usize, parameter: &'static str) -> std::result::Result<i32, ProtocolError> {
        self.require(self.reply.outputs.get(index).copied().flatten(), parameter)
    }

    fn require(
        &self,
        value: Option<i32>,
        parameter: &'static str,
    ) -> std::result::Result<i32, ProtocolError> {
        match value {
            Some(value) => Ok(value),
            None if self.lenient => Ok(0),
            None => Err(ProtocolError::MissingOutput {
                procedure: self.procedure,
                parameter,
            }),
        }
    }
}

/// [`CursorRpc`] implementation speaking TDS over a [`Connection`].
pub struct WireCursorRpc<T, D>
where
    T: AsyncRead + AsyncWrite,
{
    connection: Connection<T>,
    decoder: D,
}

impl<T, D> WireCursorRpc<T, D>
where
    T: AsyncRead + AsyncWrite + Unpin,
    D: ReplyDecoder,
{
    /// Wrap an established connection.
    pub fn new(connection: Connection<T>, decoder: D) -> Self {
        Self {
            connection,
            decoder,
        }
    }

    /// Build a connection over `transport` using the configured packet size.
    pub fn from_transport(transport: T, decoder: D, config: &CursorConfig) -> Result<Self> {
        let connection = Connection::with_packet_size(transport, config.packet_size)?;
        Ok(Self::new(connection, decoder))
    }

    /// Get a reference to the connection.
    pub fn connection(&self) -> &Connection<T> {
        &self.connection
    }

    /// Get a mutable reference to the connection.
    pub fn connection_mut(&mut self) -> &mut Connection<T> {
        &mut self.connection
    }

    /// Consume the client and return the connection and decoder.
    pub fn into_parts(self) -> (Connection<T>, D) {
        (self.connection, self.decoder)
    }

    async fn call(&mut self, procedure: ProcId, request: RpcRequest) -> Result<RpcReply<D::Row>> {
        let payload = request.encode();
        self.connection
            .send_message(PacketType::Rpc, &payload)
            .await?;
        let message = self
            .connection
            .read_expected(PacketType::TabularResult)
            .await?;
        let reply = self.decoder.decode(procedure, &message.payload)?;

        tracing::trace!(
            procedure = procedure.name(),
            request_len = payload.len(),
            reply_len = message.len(),
            return_status = ?reply.return_status,
            messages = reply.messages.len(),
            "rpc round trip"
        );
        Ok(reply)
    }
}

impl<T, D> CursorRpc for WireCursorRpc<T, D>
where
    T: AsyncRead + AsyncWrite + Unpin,
    D: ReplyDecoder,
{
    type Row = D::Row;

    async fn cursor_open(
        &mut self,
        sql: &str,
        scroll: ScrollOptions,
        concurrency: ConcurrencyOptions,
    ) -> Result<OpenReply> {
        let request = RpcRequest::cursor_open(sql, scroll.bits(), concurrency.bits());
        let reply = self.call(ProcId::CursorOpen, request).await?;

        let outputs = Outputs::new(&reply, ProcId::CursorOpen);
        let return_status = outputs.status()?;
        let handle = outputs.get(0, "cursor")?;
        let scroll = ScrollOptions::from_bits_retain(outputs.get(1, "scrollopt")?);
        let concurrency = ConcurrencyOptions::from_bits_retain(outputs.get(2, "ccopt")?);
        let row_count = outputs.get(3, "rowcount")?;

        Ok(OpenReply {
            return_status,
            handle,
            scroll,
            concurrency,
            row_count,
            messages: reply.messages,
        })
    }

    async fn cursor_fetch(
        &mut self,
        handle: i32,
        request: FetchRequest,
    ) -> Result<FetchReply<Self::Row>> {
        let rpc = RpcRequest::cursor_fetch(
            handle,
            request.fetch_type.code(),
            request.row_number,
            request.number_of_rows,
        );
        let reply = self.call(ProcId::CursorFetch, rpc).await?;
        let return_status = Outputs::new(&reply, ProcId::CursorFetch).status()?;

        Ok(FetchReply {
            return_status,
            rows: reply.rows,
            messages: reply.messages,
        })
    }

    async fn cursor_fetch_info(&mut self, handle: i32) -> Result<InfoReply> {
        let reply = self
            .call(ProcId::CursorFetch, RpcRequest::cursor_fetch_info(handle))
            .await?;

        let outputs = Outputs::new(&reply, ProcId::CursorFetch);
        let return_status = outputs.status()?;
        let row_number = outputs.get(0, "rownum")?;
        let row_count = outputs.get(1, "nrows")?;

        Ok(InfoReply {
            return_status,
            row_number,
            row_count,
            messages: reply.messages,
        })
    }

    async fn cursor_close(&mut self, handle: i32) -> Result<CloseReply> {
        let reply = self
            .call(ProcId::CursorClose, RpcRequest::cursor_close(handle))
            .await?;
        let return_status = Outputs::new(&reply, ProcId::CursorClose).status()?;

        Ok(CloseReply {
            return_status,
            messages: reply.messages,
        })
    }
}

impl<T, D> std::fmt::Debug for WireCursorRpc<T, D>
where
    T: AsyncRead + AsyncWrite,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireCursorRpc")
            .field("packet_size", &self.connection.packet_size())
            .finish_non_exhaustive()
    }
}
