/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::{
    codec_session::CodecSession,
    config::XzConfig,
    output_accumulator::OutputAccumulator,
    scratch_buffer::ScratchBuffer,
    xz_error::{err_exit_code, ExitCode, Result},
};

/// Compresses `data` into a complete .xz stream using the preset `level` (0-9)
/// and a CRC64 check.
///
/// Fails with `ExitCode::InitializationFailure` if the encoder cannot be built
/// (for example an invalid level), and with `ExitCode::CodecError` carrying the
/// engine status if the engine fails part way through. In neither case is any
/// partial output returned.
pub fn encode(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut session = CodecSession::encoder(level)?;

    let mut scratch = ScratchBuffer::new();
    let mut accumulator = OutputAccumulator::new();
    let mut flush = |block: &[u8]| accumulator.append(block).map(|_| ());

    // feed everything, the engine may take less than offered on each call
    if session.drive_run(data, &mut scratch, &mut flush)? {
        return err_exit_code(
            ExitCode::CodecError,
            "encoder signaled end of stream before the input was finished",
        );
    }

    // then force out the buffered data and the stream trailer
    session.drive_finish(&mut scratch, &mut flush)?;

    accumulator.append(scratch.filled())?;

    log::debug!(
        "encoded {} bytes into {} bytes at level {level} ({} flushes)",
        data.len(),
        accumulator.len(),
        accumulator.flushes()
    );

    Ok(accumulator.into_inner())
}

/// Compresses `data` using the default level from `config`.
pub fn encode_with_config(data: &[u8], config: &XzConfig) -> Result<Vec<u8>> {
    encode(data, config.compression_level)
}

#[test]
fn test_encode_empty_is_minimal_stream() {
    let encoded = encode(&[], 6).unwrap();

    // stream header + empty index + stream footer
    assert_eq!(encoded.len(), 32);
    assert_eq!(&encoded[..6], &[0xfd, b'7', b'z', b'X', b'Z', 0x00]);
    assert_eq!(&encoded[encoded.len() - 2..], b"YZ");
}

#[test]
fn test_encode_invalid_level() {
    let e = encode(b"abc", 42).unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::InitializationFailure);
}

#[test]
fn test_encode_spans_many_scratch_buffers() {
    use crate::scratch_buffer::SCRATCH_BUFFER_SIZE;
    use crate::utils::noise;

    // incompressible input so the encoded form is larger than several scratch buffers
    let data = noise(10 * SCRATCH_BUFFER_SIZE + 123, 7);
    let encoded = encode(&data, 0).unwrap();

    assert!(encoded.len() > data.len());
    assert_ne!(encoded.len() % SCRATCH_BUFFER_SIZE, 0);
    assert_eq!(crate::decode(&encoded, 0).unwrap(), data);
}

#[test]
fn test_encode_with_config_uses_default_level() {
    let data = crate::utils::text(50_000, 3);

    let fast = encode_with_config(&data, &XzConfig::default().with_compression_level(0)).unwrap();
    let default = encode_with_config(&data, &XzConfig::default()).unwrap();

    assert_eq!(default, encode(&data, 5).unwrap());
    assert_eq!(fast, encode(&data, 0).unwrap());
}
