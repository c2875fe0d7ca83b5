#![allow(dead_code)]

use std::io::Write;

use zimcluster::{ClusterInfo, Compression};

/// Every compression kind this build can read.
pub fn readable_kinds() -> Vec<Compression> {
    [
        Compression::Default,
        Compression::None,
        Compression::Zlib,
        Compression::Lzma,
        Compression::Zstd,
    ]
    .into_iter()
    .filter(|k| k.is_available())
    .collect()
}

/// Offset table followed by blob data, as it looks after decompression.
pub fn payload(blobs: &[Vec<u8>], extended: bool) -> Vec<u8> {
    let width = if extended { 8u64 } else { 4 };
    let mut offset = width * (blobs.len() as u64 + 1);
    let mut out = Vec::new();
    let push = |out: &mut Vec<u8>, v: u64| {
        if extended {
            out.extend_from_slice(&v.to_le_bytes());
        } else {
            out.extend_from_slice(&(v as u32).to_le_bytes());
        }
    };
    push(&mut out, offset);
    for b in blobs {
        offset += b.len() as u64;
        push(&mut out, offset);
    }
    for b in blobs {
        out.extend_from_slice(b);
    }
    out
}

/// Compress a raw payload the way a writer would for `compression`.
pub fn compress(raw: &[u8], compression: Compression) -> Vec<u8> {
    match compression {
        Compression::Default | Compression::None => raw.to_vec(),
        Compression::Zlib => {
            let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            enc.write_all(raw).unwrap();
            enc.finish().unwrap()
        }
        Compression::Lzma => {
            let mut out = Vec::new();
            lzma_rs::xz_compress(&mut &raw[..], &mut out).unwrap();
            out
        }
        Compression::Zstd => zstd::encode_all(raw, 3).unwrap(),
        Compression::Bzip2 => panic!("no bzip2 encoder in tests"),
    }
}

/// Info byte plus encoded payload.
pub fn encode_cluster(blobs: &[Vec<u8>], compression: Compression, extended: bool) -> Vec<u8> {
    encode_raw(&payload(blobs, extended), compression, extended)
}

/// Info byte plus an arbitrary (possibly malformed) payload.
pub fn encode_raw(raw: &[u8], compression: Compression, extended: bool) -> Vec<u8> {
    let mut out = vec![ClusterInfo { compression, extended }.to_byte()];
    out.extend_from_slice(&compress(raw, compression));
    out
}

/// Narrow offset table with explicit raw entries and trailing data.
pub fn raw_table(entries: &[u32], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for e in entries {
        out.extend_from_slice(&e.to_le_bytes());
    }
    out.extend_from_slice(data);
    out
}

pub fn sample_blobs() -> Vec<Vec<u8>> {
    vec![
        b"first blob".to_vec(),
        Vec::new(),
        (0..=255u8).collect(),
        b"x".to_vec(),
        b"the quick brown fox jumps over the lazy dog".repeat(20),
    ]
}

/// Incompressible bytes from a small LCG, so compressed size tracks input size.
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as u8
        })
        .collect()
}
