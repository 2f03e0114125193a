/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::io::{Read, Write};

use xz_oneshot::{
    decode, decode_with_config, encode, encode_with_config, open_stream, ExitCode, LzmaStatus,
    ProcessBuffer, XzCompressProcessor, XzConfig, XzDecompressProcessor, SCRATCH_BUFFER_SIZE,
    STREAM_PREFIX,
};

/// deterministic input mixing runs of text with stretches of noise
fn sample_data(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(6364136223846793005) | 1;
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as u32
    };

    let mut result = Vec::with_capacity(len);
    while result.len() < len {
        if next() % 4 == 0 {
            for _ in 0..(next() % 64) {
                result.push(next() as u8);
            }
        } else {
            result.extend_from_slice(b"the quick brown fox jumps over the lazy dog. ");
        }
    }
    result.truncate(len);
    result
}

#[track_caller]
fn assert_roundtrip(original: &[u8], level: u32) -> Vec<u8> {
    let compressed = encode(original, level).unwrap();
    let recreated = decode(&compressed, 0).unwrap();

    assert!(
        recreated == original,
        "roundtrip mismatch at level {level} for {} bytes",
        original.len()
    );
    compressed
}

#[test]
fn roundtrip_sizes() {
    for len in [
        0,
        1,
        100,
        SCRATCH_BUFFER_SIZE - 1,
        SCRATCH_BUFFER_SIZE,
        SCRATCH_BUFFER_SIZE + 1,
        7 * SCRATCH_BUFFER_SIZE + 13,
        1 << 20,
    ] {
        assert_roundtrip(&sample_data(len, len as u64), 6);
    }
}

#[test]
fn roundtrip_empty() {
    let compressed = assert_roundtrip(&[], 6);
    assert!(!compressed.is_empty());
    assert!(decode(&compressed, 0).unwrap().is_empty());
}

#[test]
fn roundtrip_all_levels() {
    let original = sample_data(200_000, 99);

    for level in 0..=9 {
        assert_roundtrip(&original, level);
    }
}

#[test]
fn invalid_level_is_initialization_failure() {
    for level in [10, 100, 0x8000_0009, u32::MAX] {
        let e = encode(b"abc", level).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::InitializationFailure);
        assert!(e.codec_status().is_some());
    }
}

#[test]
fn corrupt_input_fails() {
    for seed in 0..20u64 {
        let garbage: Vec<u8> = sample_data(5000, seed)
            .iter()
            .map(|b| b.wrapping_mul(31) ^ 0xfd)
            .collect();

        let e = decode(&garbage, 256 * 1024 * 1024).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::CodecError, "seed {seed}");
    }
}

#[test]
fn corrupted_payload_fails() {
    let original = sample_data(100_000, 4);
    let mut compressed = encode(&original, 6).unwrap();

    let position = compressed.len() / 3;
    compressed[position] ^= 0xff;

    let e = decode(&compressed, 0).unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::CodecError);
    assert!(e.codec_status().is_some());
}

#[test]
fn memory_ceiling_enforced() {
    let original = sample_data(10_000, 8);
    let compressed = encode(&original, 9).unwrap();

    let e = decode(&compressed, 64 * 1024).unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::CodecError);
    assert_eq!(e.codec_status(), Some(LzmaStatus::MemLimitError));
    assert_eq!(e.codec_status().unwrap().code(), 6);

    // a generous ceiling decodes normally
    assert_eq!(decode(&compressed, 1 << 30).unwrap(), original);
}

#[test]
fn truncation_never_leaks_partial_output() {
    let original = sample_data(300_000, 12);
    let compressed = encode(&original, 3).unwrap();

    for cut in [
        compressed.len() / 10,
        compressed.len() / 2,
        compressed.len() - 12,
        compressed.len() - 1,
    ] {
        let e = decode(&compressed[..cut], 0).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::CodecError, "cut {cut}");
        assert!(matches!(
            e.codec_status(),
            Some(LzmaStatus::BufError) | Some(LzmaStatus::DataError)
        ));
    }
}

#[test]
fn concatenated_streams() {
    let parts = [sample_data(10_000, 1), Vec::new(), sample_data(50_000, 2)];

    let mut compressed = Vec::new();
    let mut expected = Vec::new();
    for (level, part) in parts.iter().enumerate() {
        compressed.extend(encode(part, level as u32).unwrap());
        expected.extend_from_slice(part);
    }

    assert!(decode(&compressed, 0).unwrap() == expected);
}

#[test]
fn config_driven_calls() {
    let original = sample_data(40_000, 5);
    let config = XzConfig::default().with_compression_level(1);

    let compressed = encode_with_config(&original, &config).unwrap();
    assert_eq!(compressed, encode(&original, 1).unwrap());
    assert!(decode_with_config(&compressed, &config).unwrap() == original);
}

#[test]
fn processors_agree_with_one_shot() {
    let original = sample_data(123_457, 77);
    let one_shot = encode(&original, 6).unwrap();

    for (read_chunk, write_chunk) in [(1 << 20, usize::MAX), (4096, 4096), (997, 13)] {
        let compressed = XzCompressProcessor::new(6)
            .unwrap()
            .process_vec_size(&original, read_chunk, write_chunk)
            .unwrap();
        assert!(decode(&compressed, 0).unwrap() == original);

        let recreated = XzDecompressProcessor::new(0)
            .unwrap()
            .process_vec_size(&one_shot, read_chunk, write_chunk)
            .unwrap();
        assert!(recreated == original);
    }
}

#[test]
fn file_stream_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.xz");
    let path = path.to_str().unwrap();

    let original = sample_data(250_000, 31);

    let mut writer = open_stream(path, "wb:4", None).unwrap();
    writer.write_all(&original[..1000]).unwrap();
    writer.write_all(&original[1000..]).unwrap();
    writer.close().unwrap();

    let mut writer = open_stream(&format!("{STREAM_PREFIX}{path}"), "ab", Some(0)).unwrap();
    writer.write_all(b"appended").unwrap();
    writer.close().unwrap();

    let mut expected = original.clone();
    expected.extend_from_slice(b"appended");

    let mut reader = open_stream(path, "rb", None).unwrap();
    let mut head = [0u8; 10];
    reader.read_exact(&mut head).unwrap();
    assert_eq!(&head, &expected[..10]);

    let mut rest = Vec::new();
    assert_eq!(
        reader.passthru(&mut rest).unwrap(),
        (expected.len() - 10) as u64
    );
    assert!(rest[..] == expected[10..]);
    reader.close().unwrap();
}

#[test]
fn file_stream_bad_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.xz");

    let e = open_stream(path.to_str().unwrap(), "r+", None).err().unwrap();
    assert_eq!(e.exit_code(), ExitCode::InvalidParameter);
    assert!(!path.exists());
}
