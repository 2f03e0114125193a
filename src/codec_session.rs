/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! Owns a single liblzma engine instance and drives it one burst at a time
//! against a [`ScratchBuffer`]. The run and finish loops here are shared by the
//! one-shot drivers and by the incremental processors.

use xz2::stream::{Action, Check, Filters, LzmaOptions, Status, Stream, CONCATENATED};

use crate::{
    config::MAX_COMPRESSION_LEVEL,
    scratch_buffer::ScratchBuffer,
    xz_error::{Result, XzError},
};

/// Raw status codes as reported by liblzma (`lzma_ret`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum LzmaStatus {
    Ok = 0,
    StreamEnd = 1,
    NoCheck = 2,
    UnsupportedCheck = 3,
    GetCheck = 4,
    MemError = 5,
    MemLimitError = 6,
    FormatError = 7,
    OptionsError = 8,
    DataError = 9,
    BufError = 10,
    ProgError = 11,
}

impl LzmaStatus {
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl From<xz2::stream::Error> for LzmaStatus {
    fn from(e: xz2::stream::Error) -> Self {
        use xz2::stream::Error;

        match e {
            Error::Data => LzmaStatus::DataError,
            Error::Options => LzmaStatus::OptionsError,
            Error::Format => LzmaStatus::FormatError,
            Error::MemLimit => LzmaStatus::MemLimitError,
            Error::Mem => LzmaStatus::MemError,
            Error::Program => LzmaStatus::ProgError,
            Error::NoCheck => LzmaStatus::NoCheck,
            Error::UnsupportedCheck => LzmaStatus::UnsupportedCheck,
        }
    }
}

/// Memory ceiling used when the configured limit is 0.
pub const UNLIMITED_MEMORY: u64 = u64::MAX;

/// What a session was constructed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Encode { level: u32 },
    Decode { memory_limit: u64 },
}

/// How the engine should treat the input of a burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstAction {
    /// consume input without forcing the end of the stream
    Run,
    /// emit everything buffered plus the stream trailer
    Finish,
}

/// Result of a single engine call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Burst {
    pub consumed: usize,
    pub produced: usize,
    pub stream_end: bool,
}

/// Filters applied by the encoder, built from a preset level.
///
/// The chain is a single LZMA2 filter. The engine appends the terminating
/// sentinel entry itself.
pub struct FilterChain {
    level: u32,
    filters: Filters,
}

impl FilterChain {
    pub fn from_preset(level: u32) -> Result<FilterChain> {
        // flag bits such as the "extreme" modifier are not part of the level
        if level > MAX_COMPRESSION_LEVEL {
            return Err(XzError::initialization(
                LzmaStatus::OptionsError,
                format!("invalid compression level {level}"),
            ));
        }

        let options = LzmaOptions::new_preset(level).map_err(|e| {
            XzError::initialization(e.into(), format!("invalid compression level {level}"))
        })?;

        let mut filters = Filters::new();
        filters.lzma2(&options);

        Ok(FilterChain { level, filters })
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}

/// A live engine plus the configuration it was built with.
///
/// Dropping the session releases the engine (`lzma_end`), which happens exactly
/// once on every path out of the driver that owns it.
pub struct CodecSession {
    stream: Stream,
    mode: SessionMode,
}

impl CodecSession {
    /// Creates an xz encoder using the preset `level` and a CRC64 integrity check.
    pub fn encoder(level: u32) -> Result<CodecSession> {
        let chain = FilterChain::from_preset(level)?;

        let stream = Stream::new_stream_encoder(&chain.filters, Check::Crc64).map_err(|e| {
            XzError::initialization(
                e.into(),
                format!("failed to create encoder at level {}", chain.level()),
            )
        })?;

        log::debug!("created encoder session at level {}", chain.level());

        Ok(CodecSession {
            stream,
            mode: SessionMode::Encode {
                level: chain.level(),
            },
        })
    }

    /// Creates a decoder that auto-detects .xz and legacy .lzma input and
    /// accepts concatenated streams. A `memory_limit` of 0 means unlimited.
    pub fn decoder(memory_limit: u64) -> Result<CodecSession> {
        let effective_limit = if memory_limit == 0 {
            UNLIMITED_MEMORY
        } else {
            memory_limit
        };

        let stream = Stream::new_auto_decoder(effective_limit, CONCATENATED).map_err(|e| {
            XzError::initialization(
                e.into(),
                format!("failed to create decoder with memory limit {memory_limit}"),
            )
        })?;

        log::debug!("created decoder session with memory limit {memory_limit}");

        Ok(CodecSession {
            stream,
            mode: SessionMode::Decode { memory_limit },
        })
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn total_in(&self) -> u64 {
        self.stream.total_in()
    }

    pub fn total_out(&self) -> u64 {
        self.stream.total_out()
    }

    /// Invokes the engine once, writing into the unfilled part of `scratch`.
    ///
    /// Any status other than "continue" or "stream end" is returned as the raw
    /// engine status. A call that can make no progress at all is reported by the
    /// engine as `BufError`.
    pub fn burst(
        &mut self,
        input: &[u8],
        scratch: &mut ScratchBuffer,
        action: BurstAction,
    ) -> std::result::Result<Burst, LzmaStatus> {
        let action = match action {
            BurstAction::Run => Action::Run,
            BurstAction::Finish => Action::Finish,
        };

        let in_before = self.stream.total_in();
        let out_before = self.stream.total_out();

        let result = self.stream.process(input, scratch.unfilled(), action);

        let consumed = (self.stream.total_in() - in_before) as usize;
        let produced = (self.stream.total_out() - out_before) as usize;
        scratch.advance(produced);

        let stream_end = match result {
            Ok(Status::Ok) | Ok(Status::GetCheck) => false,
            Ok(Status::StreamEnd) => true,
            Ok(Status::MemNeeded) => return Err(LzmaStatus::BufError),
            Err(e) => return Err(e.into()),
        };

        Ok(Burst {
            consumed,
            produced,
            stream_end,
        })
    }

    /// Run phase: feeds all of `input` to the engine, handing every completely
    /// filled scratch buffer to `flush` and resetting it.
    ///
    /// Returns true if the engine reported the end of the stream before the
    /// input ran out.
    pub fn drive_run(
        &mut self,
        mut input: &[u8],
        scratch: &mut ScratchBuffer,
        flush: &mut impl FnMut(&[u8]) -> Result<()>,
    ) -> Result<bool> {
        while !input.is_empty() {
            let burst = self
                .burst(input, scratch, BurstAction::Run)
                .map_err(|status| self.mid_stream_failure(status, "run"))?;

            input = &input[burst.consumed..];

            if scratch.is_full() {
                flush(scratch.filled())?;
                scratch.reset();
            }

            if burst.stream_end {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Finish phase: invokes the engine in finish mode until it signals the end
    /// of the stream, handing every completely filled scratch buffer to `flush`.
    ///
    /// The final partial scratch buffer is left for the caller.
    pub fn drive_finish(
        &mut self,
        scratch: &mut ScratchBuffer,
        flush: &mut impl FnMut(&[u8]) -> Result<()>,
    ) -> Result<()> {
        loop {
            let burst = self
                .burst(&[], scratch, BurstAction::Finish)
                .map_err(|status| self.mid_stream_failure(status, "finish"))?;

            if scratch.is_full() {
                flush(scratch.filled())?;
                scratch.reset();
            }

            if burst.stream_end {
                return Ok(());
            }
        }
    }

    fn mid_stream_failure(&self, status: LzmaStatus, phase: &str) -> XzError {
        let operation = match self.mode {
            SessionMode::Encode { .. } => "encode",
            SessionMode::Decode { .. } => "decode",
        };

        XzError::codec(
            status,
            format!(
                "{operation} failed during {phase} phase after consuming {} bytes and producing {} bytes",
                self.stream.total_in(),
                self.stream.total_out()
            ),
        )
    }
}

impl Drop for CodecSession {
    fn drop(&mut self) {
        log::trace!(
            "releasing {:?} session (in={}, out={})",
            self.mode,
            self.stream.total_in(),
            self.stream.total_out()
        );
    }
}

#[test]
fn test_invalid_preset_is_initialization_failure() {
    use crate::xz_error::ExitCode;

    let e = CodecSession::encoder(10).err().unwrap();
    assert_eq!(e.exit_code(), ExitCode::InitializationFailure);
    assert!(e.codec_status().is_some());

    for level in 0..=9 {
        let session = CodecSession::encoder(level).unwrap();
        assert_eq!(session.mode(), SessionMode::Encode { level });
    }
}

#[test]
fn test_decoder_records_limit() {
    let session = CodecSession::decoder(0).unwrap();
    assert_eq!(session.mode(), SessionMode::Decode { memory_limit: 0 });

    let session = CodecSession::decoder(1 << 20).unwrap();
    assert_eq!(
        session.mode(),
        SessionMode::Decode {
            memory_limit: 1 << 20
        }
    );
}

#[test]
fn test_burst_reports_progress() {
    let mut session = CodecSession::encoder(1).unwrap();
    let mut scratch = ScratchBuffer::new();

    let burst = session
        .burst(b"hello hello hello", &mut scratch, BurstAction::Run)
        .unwrap();
    assert_eq!(burst.consumed, 17);
    assert!(!burst.stream_end);
    assert_eq!(burst.produced, scratch.filled().len());

    let mut flushed = Vec::new();
    session
        .drive_finish(&mut scratch, &mut |b: &[u8]| {
            flushed.extend_from_slice(b);
            Ok(())
        })
        .unwrap();
    flushed.extend_from_slice(scratch.filled());

    assert_eq!(session.total_in(), 17);
    assert_eq!(session.total_out() as usize, flushed.len());
    // xz stream header magic
    assert_eq!(&flushed[..6], &[0xfd, b'7', b'z', b'X', b'Z', 0x00]);
}

#[test]
fn test_lzma_status_codes() {
    assert_eq!(LzmaStatus::Ok.code(), 0);
    assert_eq!(LzmaStatus::MemLimitError.code(), 6);
    assert_eq!(LzmaStatus::DataError.code(), 9);
    assert_eq!(LzmaStatus::ProgError.code(), 11);
    assert_eq!(
        LzmaStatus::from(xz2::stream::Error::Format),
        LzmaStatus::FormatError
    );
}
