//! Batching of TLS handshake records into PreLogin packets.
//!
//! SQL Server expects ClientKeyExchange, ChangeCipherSpec and Finished in a
//! single PreLogin packet written in one go, while TLS engines emit them as
//! separate records. [`BatchState::step`] classifies each record written by
//! the engine and decides whether it goes out now, waits for the rest of the
//! flight, or is dropped.

use bytes::{Bytes, BytesMut};

use crate::record::{ContentType, HandshakeType, Record, split_records};

/// What to do with one classified write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Wrap the bytes in one PreLogin packet and send now.
    Packet(Bytes),
    /// Send the bytes unwrapped now.
    Raw(Bytes),
    /// Held back until the flight completes.
    Deferred,
    /// Dropped.
    Discarded,
}

/// Batching state between writes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BatchState {
    /// Nothing is held back.
    #[default]
    PassThrough,
    /// Records held back until the terminal handshake message.
    Deferring {
        /// Concatenated deferred records.
        buffer: BytesMut,
    },
}

impl BatchState {
    /// Classify one write and return the next state.
    ///
    /// Records that are sent immediately leave any deferred records in
    /// place; only the terminal handshake message releases them.
    #[must_use]
    pub fn step(self, write: &[u8]) -> (Self, Outcome) {
        let Some(record) = Record::parse(write) else {
            tracing::trace!(len = write.len(), "TLS batch: unrecognized record, sending");
            return (self, Outcome::Packet(Bytes::copy_from_slice(write)));
        };

        match record.content_type {
            ContentType::ApplicationData => (self, Outcome::Raw(Bytes::copy_from_slice(write))),
            ContentType::ChangeCipherSpec => (self.defer(write), Outcome::Deferred),
            ContentType::Alert => {
                tracing::trace!("TLS batch: discarding alert record");
                (self, Outcome::Discarded)
            }
            ContentType::Handshake => match record.handshake() {
                None => (self, Outcome::Raw(Bytes::copy_from_slice(write))),
                Some((HandshakeType::ClientHello, true)) => {
                    tracing::trace!(len = write.len(), "TLS batch: sending ClientHello");
                    (self, Outcome::Packet(Bytes::copy_from_slice(write)))
                }
                Some((HandshakeType::ClientKeyExchange, true)) => {
                    (self.defer(write), Outcome::Deferred)
                }
                Some((hs_type, _)) => {
                    let buffer = match self.defer(write) {
                        Self::Deferring { buffer } => buffer.freeze(),
                        Self::PassThrough => Bytes::new(),
                    };
                    tracing::debug!(
                        ?hs_type,
                        len = buffer.len(),
                        "TLS batch: terminal handshake record, flushing flight"
                    );
                    (Self::PassThrough, Outcome::Packet(buffer))
                }
            },
        }
    }

    /// Classify a write that may hold several coalesced records.
    ///
    /// Back-to-back well-formed records are stepped in order; any other
    /// buffer is a single step.
    #[must_use]
    pub fn process(self, write: &[u8]) -> (Self, Vec<Outcome>) {
        match split_records(write) {
            Some(records) => {
                let mut state = self;
                let mut outcomes = Vec::with_capacity(records.len());
                for record in records {
                    let (next, outcome) = state.step(record);
                    state = next;
                    outcomes.push(outcome);
                }
                (state, outcomes)
            }
            None => {
                let (state, outcome) = self.step(write);
                (state, vec![outcome])
            }
        }
    }

    /// Number of bytes held back.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        match self {
            Self::PassThrough => 0,
            Self::Deferring { buffer } => buffer.len(),
        }
    }

    fn defer(self, record: &[u8]) -> Self {
        let mut buffer = match self {
            Self::PassThrough => BytesMut::with_capacity(record.len()),
            Self::Deferring { buffer } => buffer,
        };
        buffer.extend_from_slice(record);
        tracing::trace!(pending = buffer.len(), "TLS batch: deferring record");
        Self::Deferring { buffer }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn handshake(hs_type: u8, body: &[u8]) -> Vec<u8> {
        let len = body.len() + 4;
        let mut record = vec![22, 3, 3, (len >> 8) as u8, len as u8, hs_type, 0];
        record.extend_from_slice(&(body.len() as u16).to_be_bytes());
        record.extend_from_slice(body);
        record
    }

    #[test]
    fn test_short_write_is_wrapped() {
        let (state, outcome) = BatchState::PassThrough.step(&[22, 3]);
        assert_eq!(state, BatchState::PassThrough);
        assert_eq!(outcome, Outcome::Packet(Bytes::from_static(&[22, 3])));
    }

    #[test]
    fn test_application_data_is_raw() {
        let data = [23, 3, 3, 0, 2, 0xDE, 0xAD];
        let (_, outcome) = BatchState::PassThrough.step(&data);
        assert_eq!(outcome, Outcome::Raw(Bytes::copy_from_slice(&data)));
    }

    #[test]
    fn test_alert_is_discarded_and_keeps_buffer() {
        let (state, _) = BatchState::PassThrough.step(&[20, 3, 3, 0, 1, 1]);
        let (state, outcome) = state.step(&[21, 3, 3, 0, 2, 1, 0]);
        assert_eq!(outcome, Outcome::Discarded);
        assert_eq!(state.pending_len(), 6);
    }

    #[test]
    fn test_handshake_without_sub_header_is_raw() {
        let short = [22, 3, 3, 0, 2, 16, 0];
        let (state, outcome) = BatchState::PassThrough.step(&short);
        assert_eq!(state, BatchState::PassThrough);
        assert_eq!(outcome, Outcome::Raw(Bytes::copy_from_slice(&short)));
    }

    #[test]
    fn test_incomplete_client_key_exchange_flushes() {
        let mut cke = handshake(16, &[1, 2, 3]);
        cke[8] = 9; // declared sub-length larger than present
        let (state, outcome) = BatchState::PassThrough.step(&cke);
        assert_eq!(state, BatchState::PassThrough);
        assert_eq!(outcome, Outcome::Packet(Bytes::from(cke)));
    }

    #[test]
    fn test_coalesced_write_is_split() {
        let mut write = vec![20, 3, 3, 0, 1, 1];
        write.extend_from_slice(&handshake(20, &[7; 12]));

        let (state, outcomes) = BatchState::PassThrough.process(&write);
        assert_eq!(state, BatchState::PassThrough);
        assert_eq!(
            outcomes,
            vec![Outcome::Deferred, Outcome::Packet(Bytes::from(write))]
        );
    }
}
