use bytes::BytesMut;
use coopnet::config::PROTOCOL_VERSION;
use coopnet::core::codec::FrameCodec;
use coopnet::protocol::data::{DataChat, DataContext, DataNetEmoji};
use coopnet::protocol::registry::DataTypeRegistry;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use tokio_util::codec::{Decoder, Encoder};

#[allow(clippy::unwrap_used)]
fn bench_message_encode_decode(c: &mut Criterion) {
    let registry = DataTypeRegistry::with_core_types().unwrap();
    let mut group = c.benchmark_group("message_encode_decode");
    let text_sizes = [16usize, 256, 4096];

    for &size in &text_sizes {
        let chat = DataChat {
            player_id: 7,
            text: "x".repeat(size),
            tag: String::from("bench"),
            ..DataChat::default()
        };
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("encode_chat_{size}b"), |b| {
            b.iter(|| {
                registry
                    .encode(&mut DataContext::new(PROTOCOL_VERSION), &chat)
                    .unwrap()
            })
        });

        let frame = registry
            .encode(&mut DataContext::new(PROTOCOL_VERSION), &chat)
            .unwrap();
        group.bench_function(format!("decode_chat_{size}b"), |b| {
            b.iter(|| {
                registry
                    .read(&mut DataContext::new(PROTOCOL_VERSION), &frame)
                    .unwrap()
            })
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_blob_payloads(c: &mut Criterion) {
    let registry = DataTypeRegistry::with_core_types().unwrap();
    let mut group = c.benchmark_group("blob_payloads");
    let blob_sizes = [512usize, 65536, 1024 * 1024];

    for &size in &blob_sizes {
        let emoji = DataNetEmoji {
            text: String::from("sparkle"),
            data: vec![0xab; size],
        };
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("encode_emoji_{size}b"), |b| {
            b.iter(|| {
                registry
                    .encode(&mut DataContext::new(PROTOCOL_VERSION), &emoji)
                    .unwrap()
            })
        });

        let frame = registry
            .encode(&mut DataContext::new(PROTOCOL_VERSION), &emoji)
            .unwrap();
        group.bench_function(format!("decode_emoji_{size}b"), |b| {
            b.iter(|| {
                registry
                    .read(&mut DataContext::new(PROTOCOL_VERSION), &frame)
                    .unwrap()
            })
        });
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_frame_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_codec");
    let payload_sizes = [64usize, 4096, 65536];

    for &size in &payload_sizes {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("frame_{size}b"), |b| {
            b.iter_batched(
                || bytes::Bytes::from(vec![0u8; size]),
                |payload| {
                    let mut codec = FrameCodec::default();
                    let mut buf = BytesMut::with_capacity(size + 8);
                    codec.encode(payload, &mut buf).unwrap();
                    codec.decode(&mut buf).unwrap().unwrap()
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_message_encode_decode,
    bench_blob_payloads,
    bench_frame_codec
);
criterion_main!(benches);
