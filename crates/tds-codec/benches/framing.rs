//! Benchmarks for message framing and reassembly.

#![allow(clippy::unwrap_used, missing_docs)]

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use tds_codec::{MessageAssembler, frame, unframe};
use tds_protocol::packet::{DEFAULT_PACKET_SIZE, PacketType};

const PAYLOAD_SIZES: [usize; 3] = [64, 8 * 1024, 256 * 1024];

/// Benchmark splitting payloads into packets.
fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    for size in PAYLOAD_SIZES {
        let payload = vec![0xA5u8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, payload| {
            b.iter(|| {
                let packets = frame(black_box(payload), PacketType::Rpc, DEFAULT_PACKET_SIZE);
                black_box(packets)
            })
        });
    }

    group.finish();
}

/// Benchmark decoding a buffered stream and reassembling the message.
fn bench_unframe_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("unframe_assemble");

    for size in PAYLOAD_SIZES {
        let mut wire = Vec::new();
        for packet in frame(&vec![0x5Au8; size], PacketType::TabularResult, DEFAULT_PACKET_SIZE)
            .unwrap()
        {
            packet.encode(&mut wire);
        }

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &wire, |b, wire| {
            b.iter(|| {
                let mut assembler = MessageAssembler::with_capacity(size);
                let mut message = None;
                for packet in unframe(black_box(wire), DEFAULT_PACKET_SIZE) {
                    message = assembler.push(packet.unwrap()).unwrap();
                }
                black_box(message)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_frame, bench_unframe_assemble);
criterion_main!(benches);
