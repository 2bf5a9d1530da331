//! Handshake batching scenarios over a scripted transport.

#![allow(clippy::unwrap_used, missing_docs)]

use proptest::prelude::*;
use tds_tls::{BatchState, HandshakeStream, Outcome};
use tokio::io::AsyncWriteExt;

fn handshake_record(hs_type: u8, body: &[u8]) -> Vec<u8> {
    let len = body.len() + 4;
    let mut record = vec![22, 3, 3, (len >> 8) as u8, len as u8, hs_type, 0];
    record.extend_from_slice(&(body.len() as u16).to_be_bytes());
    record.extend_from_slice(body);
    record
}

fn change_cipher_spec() -> Vec<u8> {
    vec![20, 3, 3, 0, 1, 1]
}

fn prelogin_packet(payload: &[u8]) -> Vec<u8> {
    let total = payload.len() + 8;
    let mut packet = vec![0x12, 0x01, (total >> 8) as u8, total as u8, 0, 0, 1, 0];
    packet.extend_from_slice(payload);
    packet
}

#[tokio::test]
async fn key_exchange_flight_is_one_packet_and_one_write() {
    let ccs = change_cipher_spec();
    let cke = handshake_record(16, &[0x42; 70]);
    let fin = handshake_record(20, &[0x17; 12]);
    let flight = [ccs.clone(), cke.clone(), fin.clone()].concat();

    // A mock write expectation matches a single write call.
    let mock = tokio_test::io::Builder::new()
        .write(&prelogin_packet(&flight))
        .build();
    let mut stream = HandshakeStream::new(mock);

    for record in [&ccs, &cke] {
        stream.write_all(record).await.unwrap();
        stream.flush().await.unwrap();
    }
    stream.write_all(&fin).await.unwrap();
    stream.flush().await.unwrap();
}

#[tokio::test]
async fn client_hello_goes_out_alone() {
    let hello = handshake_record(1, &[0x03, 0x03, 0xAB, 0xCD]);
    let ccs = change_cipher_spec();

    let mock = tokio_test::io::Builder::new()
        .write(&prelogin_packet(&hello))
        .build();
    let mut stream = HandshakeStream::new(mock);

    stream.write_all(&ccs).await.unwrap();
    stream.write_all(&hello).await.unwrap();
    stream.flush().await.unwrap();
}

#[tokio::test]
async fn alert_is_never_written() {
    let mock = tokio_test::io::Builder::new().build();
    let mut stream = HandshakeStream::new(mock);

    stream.write_all(&[21, 3, 3, 0, 2, 2, 40]).await.unwrap();
    stream.flush().await.unwrap();
}

#[tokio::test]
async fn legacy_hello_is_wrapped() {
    // SSLv2-style hello: first byte outside the TLS content types.
    let legacy = [0x80, 0x2E, 0x01, 0x03, 0x01, 0x00, 0x15];
    let mock = tokio_test::io::Builder::new()
        .write(&prelogin_packet(&legacy))
        .build();
    let mut stream = HandshakeStream::new(mock);

    stream.write_all(&legacy).await.unwrap();
    stream.flush().await.unwrap();
}

fn deferrable() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        Just(change_cipher_spec()),
        proptest::collection::vec(any::<u8>(), 0..64)
            .prop_map(|body| handshake_record(16, &body)),
    ]
}

proptest! {
    #[test]
    fn nothing_leaves_before_the_terminal_record(
        records in proptest::collection::vec(deferrable(), 0..6),
        finished in proptest::collection::vec(any::<u8>(), 1..48),
    ) {
        let mut state = BatchState::PassThrough;
        for record in &records {
            let (next, outcome) = state.step(record);
            prop_assert_eq!(outcome, Outcome::Deferred);
            state = next;
        }

        let fin = handshake_record(20, &finished);
        let (state, outcome) = state.step(&fin);
        let mut expected: Vec<u8> = records.concat();
        expected.extend_from_slice(&fin);
        prop_assert_eq!(outcome, Outcome::Packet(expected.into()));
        prop_assert_eq!(state, BatchState::PassThrough);
    }
}
