/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Incremental versions of the encode and decode drivers using the
//! ProcessBuffer model, where the caller hands over input a piece at a time
//! and pulls output with a cap on how much is written per call. Each call runs
//! the same burst and flush loop as the one-shot drivers on the piece it was
//! given.

use std::{
    collections::VecDeque,
    io::{BufRead, Write},
};

use crate::{
    codec_session::CodecSession,
    scratch_buffer::ScratchBuffer,
    utils::write_dequeue,
    xz_error::{err_exit_code, AddContext, ExitCode, Result},
};

pub trait ProcessBuffer {
    /// Processes `input`, writing at most `max_output_write` bytes to `writer`.
    ///
    /// Returns true once `input_complete` has been signaled and all of the
    /// output has been written.
    fn process_buffer(
        &mut self,
        input: &[u8],
        input_complete: bool,
        writer: &mut impl Write,
        max_output_write: usize,
    ) -> Result<bool>;

    /// Processes all of `input` and returns the output as a vector.
    fn process_vec(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.process_vec_size(input, usize::MAX, usize::MAX)
    }

    /// Processes all of `input`, feeding at most `read_chunk_size` bytes and
    /// pulling at most `write_chunk_size` bytes per call.
    fn process_vec_size(
        &mut self,
        input: &[u8],
        read_chunk_size: usize,
        write_chunk_size: usize,
    ) -> Result<Vec<u8>> {
        let mut writer = Vec::new();
        let mut done = false;

        let mut input_start_offset: usize = 0;

        while !done {
            let input_end_offset =
                (input_start_offset.saturating_add(read_chunk_size)).min(input.len());

            done = self.process_buffer(
                &input[input_start_offset..input_end_offset],
                input_end_offset == input.len(),
                &mut writer,
                write_chunk_size,
            )?;

            input_start_offset = input_end_offset;
        }
        Ok(writer)
    }

    /// Reads everything from input and writes it to the output.
    /// Wraps calls to process buffer
    fn copy_to_end(&mut self, input: &mut impl BufRead, output: &mut impl Write) -> Result<()> {
        self.copy_to_end_size(input, output, 1024 * 1024)
    }

    /// Reads everything from input and writes it to the output, handing at
    /// most `read_chunk_size` bytes to each call of process_buffer.
    fn copy_to_end_size(
        &mut self,
        input: &mut impl BufRead,
        output: &mut impl Write,
        read_chunk_size: usize,
    ) -> Result<()> {
        let mut input_complete = false;
        loop {
            let buffer: &[u8] = if input_complete {
                &[]
            } else {
                let b = input.fill_buf().context()?;
                if b.is_empty() {
                    input_complete = true
                }
                b
            };

            if input_complete {
                if self
                    .process_buffer(&[], true, output, usize::MAX)
                    .context()?
                {
                    break;
                }
            } else {
                // process buffer a piece at a time to avoid overflowing memory
                let mut amount_read = 0;
                while amount_read < buffer.len() {
                    let chunk_size = (buffer.len() - amount_read).min(read_chunk_size);

                    if self
                        .process_buffer(
                            &buffer[amount_read..amount_read + chunk_size],
                            false,
                            output,
                            usize::MAX,
                        )
                        .context()?
                    {
                        return err_exit_code(
                            ExitCode::GeneralFailure,
                            "process_buffer should not return done until input is done",
                        );
                    }

                    amount_read += chunk_size;
                }

                let buflen = buffer.len();
                input.consume(buflen);
            }
        }

        Ok(())
    }
}

fn more_data_after_complete<T>() -> Result<T> {
    err_exit_code(
        ExitCode::InvalidParameter,
        "more data provided after input_complete signaled",
    )
}

/// Compresses its input into a single .xz stream.
pub struct XzCompressProcessor {
    session: CodecSession,
    scratch: ScratchBuffer,
    pending: VecDeque<u8>,
    input_complete: bool,
}

impl XzCompressProcessor {
    pub fn new(level: u32) -> Result<Self> {
        Ok(XzCompressProcessor {
            session: CodecSession::encoder(level)?,
            scratch: ScratchBuffer::new(),
            pending: VecDeque::new(),
            input_complete: false,
        })
    }

    pub fn total_in(&self) -> u64 {
        self.session.total_in()
    }

    pub fn total_out(&self) -> u64 {
        self.session.total_out()
    }
}

impl ProcessBuffer for XzCompressProcessor {
    fn process_buffer(
        &mut self,
        input: &[u8],
        input_complete: bool,
        writer: &mut impl Write,
        max_output_write: usize,
    ) -> Result<bool> {
        if self.input_complete && (!input.is_empty() || !input_complete) {
            return more_data_after_complete();
        }

        let pending = &mut self.pending;
        let mut flush = |block: &[u8]| -> Result<()> {
            pending.extend(block);
            Ok(())
        };

        if !input.is_empty()
            && self
                .session
                .drive_run(input, &mut self.scratch, &mut flush)?
        {
            return err_exit_code(
                ExitCode::CodecError,
                "encoder signaled end of stream before the input was finished",
            );
        }

        if input_complete && !self.input_complete {
            self.input_complete = true;

            self.session.drive_finish(&mut self.scratch, &mut flush)?;

            pending.extend(self.scratch.filled());
            self.scratch.reset();

            log::debug!(
                "compress processor finished {} -> {} bytes",
                self.session.total_in(),
                self.session.total_out()
            );
        }

        write_dequeue(&mut self.pending, writer, max_output_write).context()?;

        Ok(self.input_complete && self.pending.is_empty())
    }
}

/// Decompresses one or more concatenated .xz or .lzma streams.
pub struct XzDecompressProcessor {
    session: CodecSession,
    scratch: ScratchBuffer,
    pending: VecDeque<u8>,
    input_complete: bool,
    input_seen: bool,
}

impl XzDecompressProcessor {
    /// `memory_limit` bounds the decoder's working memory, 0 meaning unlimited
    pub fn new(memory_limit: u64) -> Result<Self> {
        Ok(XzDecompressProcessor {
            session: CodecSession::decoder(memory_limit)?,
            scratch: ScratchBuffer::new(),
            pending: VecDeque::new(),
            input_complete: false,
            input_seen: false,
        })
    }

    pub fn total_in(&self) -> u64 {
        self.session.total_in()
    }

    pub fn total_out(&self) -> u64 {
        self.session.total_out()
    }
}

impl ProcessBuffer for XzDecompressProcessor {
    fn process_buffer(
        &mut self,
        input: &[u8],
        input_complete: bool,
        writer: &mut impl Write,
        max_output_write: usize,
    ) -> Result<bool> {
        if self.input_complete && (!input.is_empty() || !input_complete) {
            return more_data_after_complete();
        }

        let pending = &mut self.pending;
        let mut flush = |block: &[u8]| -> Result<()> {
            pending.extend(block);
            Ok(())
        };

        if !input.is_empty() {
            self.input_seen = true;

            if self
                .session
                .drive_run(input, &mut self.scratch, &mut flush)?
            {
                return err_exit_code(
                    ExitCode::CodecError,
                    "decoder signaled end of stream before the input was finished",
                );
            }
        }

        if input_complete && !self.input_complete {
            self.input_complete = true;

            // an empty input decodes to nothing, anything else has to end on a complete stream
            if self.input_seen {
                self.session.drive_finish(&mut self.scratch, &mut flush)?;
            }
        }

        // decoded data can be handed out as soon as it is produced
        pending.extend(self.scratch.filled());
        self.scratch.reset();

        write_dequeue(&mut self.pending, writer, max_output_write).context()?;

        Ok(self.input_complete && self.pending.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{assert_eq_array, noise, text};

    #[test]
    fn roundtrip_small_chunks() {
        crate::init_logging();

        let original = text(300_000, 17);

        let mut context = XzCompressProcessor::new(6).unwrap();
        let compressed = context.process_vec_size(&original, 997, 997).unwrap();
        assert_eq!(context.total_in(), original.len() as u64);
        assert_eq!(context.total_out(), compressed.len() as u64);

        let mut context = XzDecompressProcessor::new(0).unwrap();
        let recreated = context.process_vec_size(&compressed, 997, 997).unwrap();

        assert_eq_array(&original, &recreated);
    }

    #[test]
    fn roundtrip_one_byte_at_a_time() {
        let original = noise(10_000, 3);

        let mut context = XzCompressProcessor::new(1).unwrap();
        let compressed = context.process_vec_size(&original, 1, 1).unwrap();

        let mut context = XzDecompressProcessor::new(0).unwrap();
        let recreated = context.process_vec_size(&compressed, 1, 1).unwrap();

        assert_eq_array(&original, &recreated);
    }

    #[test]
    fn processors_match_one_shot_drivers() {
        let original = text(100_000, 29);

        // the one-shot output decodes incrementally
        let encoded = crate::encode(&original, 4).unwrap();
        let mut context = XzDecompressProcessor::new(0).unwrap();
        assert_eq_array(
            &context.process_vec_size(&encoded, 4096, 333).unwrap(),
            &original,
        );

        // and the incremental output decodes in one shot
        let mut context = XzCompressProcessor::new(4).unwrap();
        let compressed = context.process_vec(&original).unwrap();
        assert_eq_array(&crate::decode(&compressed, 0).unwrap(), &original);
    }

    #[test]
    fn copy_to_end_roundtrip() {
        let original = text(70_000, 41);

        let mut compressed = Vec::new();
        XzCompressProcessor::new(2)
            .unwrap()
            .copy_to_end_size(&mut std::io::Cursor::new(&original), &mut compressed, 1000)
            .unwrap();

        let mut recreated = Vec::new();
        XzDecompressProcessor::new(0)
            .unwrap()
            .copy_to_end(&mut std::io::Cursor::new(&compressed), &mut recreated)
            .unwrap();

        assert_eq_array(&original, &recreated);
    }

    #[test]
    fn empty_input() {
        let mut context = XzCompressProcessor::new(6).unwrap();
        let compressed = context.process_vec(&[]).unwrap();
        assert_eq!(compressed, crate::encode(&[], 6).unwrap());

        let mut context = XzDecompressProcessor::new(0).unwrap();
        assert!(context.process_vec(&compressed).unwrap().is_empty());

        let mut context = XzDecompressProcessor::new(0).unwrap();
        assert!(context.process_vec(&[]).unwrap().is_empty());
    }

    #[test]
    fn data_after_complete_is_rejected() {
        let mut context = XzCompressProcessor::new(6).unwrap();
        let mut out = Vec::new();
        assert!(context.process_buffer(b"abc", true, &mut out, usize::MAX).unwrap());

        let e = context
            .process_buffer(b"more", true, &mut out, usize::MAX)
            .unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::InvalidParameter);

        let mut context = XzDecompressProcessor::new(0).unwrap();
        assert!(context.process_buffer(&out, true, &mut Vec::new(), usize::MAX).unwrap());
        let e = context
            .process_buffer(&[], false, &mut Vec::new(), usize::MAX)
            .unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::InvalidParameter);
    }

    #[test]
    fn truncated_input_fails_on_completion() {
        let encoded = crate::encode(&text(50_000, 2), 6).unwrap();
        let truncated = &encoded[..encoded.len() - 20];

        let mut context = XzDecompressProcessor::new(0).unwrap();
        let mut out = Vec::new();
        assert!(!context
            .process_buffer(truncated, false, &mut out, usize::MAX)
            .unwrap());

        let e = context
            .process_buffer(&[], true, &mut out, usize::MAX)
            .unwrap_err();
        assert_eq!(e.exit_code(), ExitCode::CodecError);
    }
}
