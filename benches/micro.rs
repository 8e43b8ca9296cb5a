//! Micro-benchmarks for the table read pipeline.
//!
//! Uses Criterion for statistically rigorous measurement with regression
//! detection and HTML reports.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench micro              # run all micro-benchmarks
//! cargo bench --bench micro -- footer    # filter by name
//! ```
//!
//! Reports are generated in `target/criterion/report/index.html`.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use std::io::Write;

use tempfile::TempDir;

use lapistable::cache::PersistentCacheOptions;
use lapistable::checksum::{compute_block_checksum, verify_block_checksum, ChecksumType};
use lapistable::compression::{compress_block_contents, CompressionType};
use lapistable::encoding::{get_varint64, put_fixed32, put_varint64};
use lapistable::file::MmapFileReader;
use lapistable::format::{BlockHandle, Footer, BLOCK_BASED_TABLE_MAGIC_NUMBER};
use lapistable::options::{ImmutableOptions, ReadOptions};
use lapistable::read::{read_block, read_block_contents, read_footer_from_file};

// ------------------------------------------------------------------------------------------------
// Helpers
// ------------------------------------------------------------------------------------------------

/// 4 KiB of key/value-shaped block payload.
fn block_payload() -> Vec<u8> {
    let mut payload = Vec::with_capacity(4096);
    let mut i = 0u64;
    while payload.len() < 4096 {
        payload.extend_from_slice(format!("key-{i:012}value-{i:012}").as_bytes());
        i += 1;
    }
    payload.truncate(4096);
    payload
}

/// Write a one-block table file and return its path, handle, and footer.
fn build_table_file(
    dir: &TempDir,
    payload: &[u8],
    ctype: u8,
) -> (std::path::PathBuf, BlockHandle, Footer) {
    let mut image = Vec::new();
    let handle = BlockHandle::new(0, payload.len() as u64);
    let mut block = payload.to_vec();
    block.push(ctype);
    let checksum = compute_block_checksum(&block, ChecksumType::Crc32c);
    image.extend_from_slice(&block);
    put_fixed32(&mut image, checksum);

    let mut footer = Footer::new(BLOCK_BASED_TABLE_MAGIC_NUMBER, 2);
    footer.set_metaindex_handle(handle);
    footer.set_index_handle(handle);
    footer.encode_to(&mut image);

    let path = dir.path().join("bench.sst");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&image).unwrap();
    file.sync_all().unwrap();
    (path, handle, footer)
}

// ================================================================================================
// Codec benchmarks
// ================================================================================================

fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoding");

    group.bench_function("varint64_encode_decode", |b| {
        b.iter(|| {
            let mut buf = Vec::with_capacity(10);
            put_varint64(&mut buf, black_box(0xdead_beef_u64));
            let mut input = buf.as_slice();
            black_box(get_varint64(&mut input))
        })
    });

    group.bench_function("footer_encode_decode", |b| {
        let mut footer = Footer::new(BLOCK_BASED_TABLE_MAGIC_NUMBER, 2);
        footer.set_metaindex_handle(BlockHandle::new(10, 20));
        footer.set_index_handle(BlockHandle::new(30, 40));
        b.iter(|| {
            let mut buf = Vec::with_capacity(Footer::MAX_ENCODED_LENGTH);
            footer.encode_to(&mut buf);
            let mut input = buf.as_slice();
            black_box(Footer::decode_from(&mut input).unwrap())
        })
    });

    group.finish();
}

fn bench_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksum");
    let payload = block_payload();
    let mut block = payload.clone();
    block.push(0);
    group.throughput(Throughput::Bytes(block.len() as u64));

    for ty in [ChecksumType::Crc32c, ChecksumType::XxHash32] {
        let stored = compute_block_checksum(&block, ty);
        group.bench_function(format!("verify_{ty:?}"), |b| {
            b.iter(|| verify_block_checksum(black_box(&block), stored, ty).unwrap())
        });
    }

    group.finish();
}

fn bench_compression(c: &mut Criterion) {
    let mut group = c.benchmark_group("compression");
    let payload = block_payload();
    group.throughput(Throughput::Bytes(payload.len() as u64));

    for ty in [CompressionType::Snappy, CompressionType::Lz4, CompressionType::Zstd] {
        let compressed = compress_block_contents(&payload, ty, 2, &[]).unwrap();
        let mut block = compressed.clone();
        block.push(ty.as_u8());
        let opts = ImmutableOptions::default();
        group.bench_function(format!("uncompress_{ty:?}"), |b| {
            b.iter(|| {
                lapistable::compression::uncompress_block_contents(
                    black_box(&block),
                    compressed.len(),
                    2,
                    &[],
                    &opts,
                )
                .unwrap()
            })
        });
    }

    group.finish();
}

// ================================================================================================
// Pipeline benchmarks
// ================================================================================================

fn bench_read_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_pipeline");
    let payload = block_payload();

    let dir = TempDir::new().unwrap();
    let (path, handle, footer) = build_table_file(&dir, &payload, 0);
    let reader = MmapFileReader::open(&path).unwrap();
    group.throughput(Throughput::Bytes(payload.len() as u64));

    group.bench_function("footer_read", |b| {
        b.iter(|| read_footer_from_file(&reader, reader.file_size(), 0).unwrap())
    });

    group.bench_function("block_read_verified", |b| {
        b.iter(|| {
            read_block(&reader, &footer, &ReadOptions::default(), &handle).unwrap()
        })
    });

    group.bench_function("block_contents_uncompressed", |b| {
        let opts = ImmutableOptions::default();
        let cache_options = PersistentCacheOptions::default();
        b.iter(|| {
            read_block_contents(
                &reader,
                &footer,
                &ReadOptions::default(),
                &handle,
                &opts,
                true,
                &[],
                &cache_options,
            )
            .unwrap()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_encoding,
    bench_checksum,
    bench_compression,
    bench_read_pipeline
);
criterion_main!(benches);
