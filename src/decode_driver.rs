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

/// Decompresses one or more concatenated .xz (or legacy .lzma) streams.
///
/// `memory_limit` bounds the decoder's working memory in bytes, 0 meaning
/// unlimited. Malformed, truncated or over-budget input fails with
/// `ExitCode::CodecError` and the raw engine status; the partially decoded
/// bytes are dropped, never returned.
pub fn decode(data: &[u8], memory_limit: u64) -> Result<Vec<u8>> {
    let mut session = CodecSession::decoder(memory_limit)?;

    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut scratch = ScratchBuffer::new();
    let mut accumulator = OutputAccumulator::new();
    let mut flush = |block: &[u8]| accumulator.append(block).map(|_| ());

    let stream_end = session.drive_run(data, &mut scratch, &mut flush)?;

    if stream_end {
        // concatenated decoding only reports the end once told the input is finished
        if session.total_in() != data.len() as u64 {
            return err_exit_code(
                ExitCode::CodecError,
                format!(
                    "decoder stopped after {} of {} bytes",
                    session.total_in(),
                    data.len()
                ),
            );
        }
    } else {
        // all input is consumed, make sure the last stream was actually complete
        session.drive_finish(&mut scratch, &mut flush)?;
    }

    accumulator.append(scratch.filled())?;

    log::debug!(
        "decoded {} bytes into {} bytes ({} flushes)",
        data.len(),
        accumulator.len(),
        accumulator.flushes()
    );

    Ok(accumulator.into_inner())
}

/// Decompresses `data` using the memory ceiling from `config`.
pub fn decode_with_config(data: &[u8], config: &XzConfig) -> Result<Vec<u8>> {
    decode(data, config.max_memory)
}

#[test]
fn test_decode_empty_input() {
    assert!(decode(&[], 0).unwrap().is_empty());
}

#[test]
fn test_decode_expands_across_scratch_buffers() {
    use crate::scratch_buffer::SCRATCH_BUFFER_SIZE;
    use crate::utils::assert_eq_array;

    // highly compressible, so the encoded form fits in one scratch buffer but
    // the decoded form crosses the boundary many times
    let data = vec![b'x'; 37 * SCRATCH_BUFFER_SIZE + 1];
    let encoded = crate::encode(&data, 6).unwrap();
    assert!(encoded.len() < SCRATCH_BUFFER_SIZE);

    assert_eq_array(&decode(&encoded, 0).unwrap(), &data);
}

#[test]
fn test_decode_exact_scratch_multiple() {
    use crate::scratch_buffer::SCRATCH_BUFFER_SIZE;

    // the final partial flush is empty when the output is an exact multiple
    let data = crate::utils::text(4 * SCRATCH_BUFFER_SIZE, 11);
    let encoded = crate::encode(&data, 3).unwrap();
    assert_eq!(decode(&encoded, 0).unwrap(), data);
}

#[test]
fn test_decode_concatenated_streams() {
    let mut encoded = crate::encode(b"first stream,", 1).unwrap();
    encoded.extend(crate::encode(b"", 1).unwrap());
    encoded.extend(crate::encode(b" second stream", 9).unwrap());

    assert_eq!(decode(&encoded, 0).unwrap(), b"first stream, second stream");
}

#[test]
fn test_decode_truncated_stream_fails() {
    let data = crate::utils::text(200_000, 5);
    let encoded = crate::encode(&data, 6).unwrap();

    for cut in [1, 12, encoded.len() / 2, encoded.len() - 1] {
        let e = decode(&encoded[..cut], 0).unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::CodecError, "cut at {cut}");
        assert!(e.codec_status().is_some());
    }
}

#[test]
fn test_decode_garbage_fails() {
    let e = decode(b"this is definitely not an xz stream", 1 << 26).unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::CodecError);
}

#[test]
fn test_decode_with_config_applies_memory_limit() {
    use crate::codec_session::LzmaStatus;

    let encoded = crate::encode(b"needs a dictionary", 6).unwrap();

    let e = decode_with_config(&encoded, &XzConfig::default().with_max_memory(1024)).unwrap_err();
    assert_eq!(e.codec_status(), Some(LzmaStatus::MemLimitError));

    let decoded = decode_with_config(&encoded, &XzConfig::default()).unwrap();
    assert_eq!(decoded, b"needs a dictionary");
}
