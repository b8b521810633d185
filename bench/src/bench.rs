use criterion::{BenchmarkId, Criterion, Throughput};
use std::io::{Cursor, Read, Write};
use zipcodec::{CompressionMethod, ZipArchive, ZipArchiveWriter, ZipDateTime};

fn crc32(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc32");
    for size in &[1, 4, 16, 64, 256, 1024, 4096, 16384, 65536] {
        let data = vec![0; *size];
        let input = data.as_slice();
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _size| {
            b.iter(|| zipcodec::crc32(input));
        });
    }
    group.finish();
}

fn eocd(c: &mut Criterion) {
    let mut group = c.benchmark_group("eocd-locator");
    for size in &[1, 4, 16, 64, 256, 1024, 4096, 16384, 65536] {
        let data = vec![4; *size];
        let input = data.as_slice();
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _size| {
            b.iter(|| ZipArchive::from_slice(input).is_err());
        });
    }
    group.finish();
}

fn create_test_zip() -> Vec<u8> {
    let mut archive = ZipArchiveWriter::new(Vec::new());
    for i in 0..200_000 {
        let filename = format!("file{:06}.txt", i);
        let handle = archive
            .add_entry(&filename, ZipDateTime::default(), CompressionMethod::Store)
            .unwrap();
        let mut writer = handle.open_write_stream(&mut archive).unwrap();
        writer.write_all(b"x").unwrap();
        writer.close().unwrap();
    }

    archive.finish().unwrap()
}

fn entries(c: &mut Criterion) {
    let zip_data = create_test_zip();
    let mut group = c.benchmark_group("entries");

    group.bench_function("slice", |b| {
        b.iter(|| {
            let archive = ZipArchive::from_slice(&zip_data).unwrap();
            let total_size: u64 = archive.entries().iter().map(|e| e.uncompressed_size()).sum();
            assert_eq!(total_size, 200_000);
        })
    });

    group.bench_function("seekable", |b| {
        b.iter(|| {
            let archive = ZipArchive::from_seekable(Cursor::new(&zip_data)).unwrap();
            let total_size: u64 = archive.entries().iter().map(|e| e.uncompressed_size()).sum();
            assert_eq!(total_size, 200_000);
        })
    });

    group.finish();
}

fn round_trip(c: &mut Criterion) {
    let data: Vec<u8> = (0..1 << 20).map(|i: u32| (i % 251) as u8).collect();
    let mut group = c.benchmark_group("round-trip");
    group.throughput(Throughput::Bytes(data.len() as u64));

    for method in [CompressionMethod::Store, CompressionMethod::Deflate] {
        let name = format!("{:?}", method).to_lowercase();
        group.bench_function(BenchmarkId::new("write", &name), |b| {
            b.iter(|| {
                let mut archive = ZipArchiveWriter::new(Vec::with_capacity(data.len()));
                let handle = archive
                    .add_entry("data.bin", ZipDateTime::default(), method)
                    .unwrap();
                let mut writer = handle.open_write_stream(&mut archive).unwrap();
                writer.write_all(&data).unwrap();
                writer.close().unwrap();
                archive.finish().unwrap()
            })
        });

        let mut archive = ZipArchiveWriter::new(Vec::new());
        let handle = archive
            .add_entry("data.bin", ZipDateTime::default(), method)
            .unwrap();
        let mut writer = handle.open_write_stream(&mut archive).unwrap();
        writer.write_all(&data).unwrap();
        writer.close().unwrap();
        let zip_data = archive.finish().unwrap();

        group.bench_function(BenchmarkId::new("read", &name), |b| {
            let mut out = Vec::with_capacity(data.len());
            b.iter(|| {
                out.clear();
                let archive = ZipArchive::from_slice(&zip_data).unwrap();
                let mut reader = archive.open_read_stream(&archive.entries()[0]).unwrap();
                reader.read_to_end(&mut out).unwrap();
                assert_eq!(out.len(), data.len());
            })
        });
    }

    group.finish();
}

criterion::criterion_group!(benches, crc32, eocd, entries, round_trip);
criterion::criterion_main!(benches);
