/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

//! File handles that transparently compress on write and decompress on read,
//! built on top of the incremental stream processors.

use std::{
    collections::VecDeque,
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use crate::{
    config::{XzConfig, MAX_COMPRESSION_LEVEL},
    stream_processor::{ProcessBuffer, XzCompressProcessor, XzDecompressProcessor},
    xz_error::{err_exit_code, AddContext, ExitCode, Result, XzError},
};

/// wrapper prefix accepted in front of file paths
pub const STREAM_PREFIX: &str = "compress.lzma://";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// decompressing reads
    Read,
    /// compressing writes to a new or truncated file
    Write,
    /// compressing writes of a new stream at the end of an existing file
    Append,
}

/// Parses an fopen style mode string such as "rb", "w" or "w:9".
///
/// The optional level after the colon only matters for writers.
pub fn parse_mode(mode: &str) -> Result<(OpenMode, Option<u32>)> {
    let (base, level) = match mode.split_once(':') {
        Some((base, level)) => match level.parse::<u32>() {
            Ok(level) if level <= MAX_COMPRESSION_LEVEL => (base, Some(level)),
            _ => {
                return err_exit_code(
                    ExitCode::InvalidParameter,
                    format!("invalid compression level in mode \"{mode}\""),
                )
            }
        },
        None => (mode, None),
    };

    let open_mode = match base {
        "r" | "rb" => OpenMode::Read,
        "w" | "wb" => OpenMode::Write,
        "a" | "ab" => OpenMode::Append,
        _ => {
            return err_exit_code(
                ExitCode::InvalidParameter,
                format!("unsupported mode \"{mode}\""),
            )
        }
    };

    Ok((open_mode, level))
}

fn strip_prefix(path: &str) -> &str {
    path.strip_prefix(STREAM_PREFIX).unwrap_or(path)
}

enum Direction {
    Reader {
        file: BufReader<File>,
        processor: XzDecompressProcessor,
        decoded: VecDeque<u8>,
        done: bool,
    },
    Writer {
        file: BufWriter<File>,
        processor: XzCompressProcessor,
        finished: bool,
    },
}

/// An open .xz file, either decompressing on `Read` or compressing on `Write`.
pub struct XzFile {
    path: PathBuf,
    mode: OpenMode,
    direction: Direction,
}

/// Opens `path` according to `mode`, taking the defaults from the environment.
///
/// See `XzFile::open_with_config` for the details.
pub fn open_stream(path: &str, mode: &str, level: Option<u32>) -> Result<XzFile> {
    XzFile::open_with_config(path, mode, level, &XzConfig::from_env())
}

impl XzFile {
    /// Opens `path` according to `mode`.
    ///
    /// The compression level comes from the mode suffix if there is one, then
    /// from `level`, then from the configured default. Readers use the
    /// configured memory ceiling.
    pub fn open_with_config(
        path: &str,
        mode: &str,
        level: Option<u32>,
        config: &XzConfig,
    ) -> Result<XzFile> {
        let (open_mode, mode_level) = parse_mode(mode)?;
        let path = Path::new(strip_prefix(path));

        let direction = match open_mode {
            OpenMode::Read => {
                let file = File::open(path).with_context(|| format!("opening {path:?}"))?;
                Direction::Reader {
                    file: BufReader::new(file),
                    processor: XzDecompressProcessor::new(config.max_memory)?,
                    decoded: VecDeque::new(),
                    done: false,
                }
            }
            OpenMode::Write | OpenMode::Append => {
                let level = mode_level.or(level).unwrap_or(config.compression_level);
                let processor = XzCompressProcessor::new(level)?;

                let file = if open_mode == OpenMode::Append {
                    OpenOptions::new().append(true).create(true).open(path)
                } else {
                    File::create(path)
                }
                .with_context(|| format!("opening {path:?}"))?;

                Direction::Writer {
                    file: BufWriter::new(file),
                    processor,
                    finished: false,
                }
            }
        };

        log::debug!("opened {path:?} as {open_mode:?}");

        Ok(XzFile {
            path: path.to_path_buf(),
            mode: open_mode,
            direction,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Copies the rest of the decompressed content into `output`, returning
    /// the number of bytes copied.
    pub fn passthru(&mut self, output: &mut impl Write) -> Result<u64> {
        if !matches!(self.direction, Direction::Reader { .. }) {
            return err_exit_code(
                ExitCode::InvalidParameter,
                "passthru on a file opened for writing",
            );
        }

        let copied = std::io::copy(self, output)?;
        Ok(copied)
    }

    /// Finishes the file. Writers emit the end of the stream and flush it to disk.
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        if let Direction::Writer {
            file,
            processor,
            finished,
        } = &mut self.direction
        {
            if !*finished {
                *finished = true;
                processor.process_buffer(&[], true, file, usize::MAX)?;
                file.flush().context()?;

                log::debug!(
                    "closed {:?} after compressing {} bytes into {} bytes",
                    self.path,
                    processor.total_in(),
                    processor.total_out()
                );
            }
        }
        Ok(())
    }
}

fn wrong_direction(operation: &str) -> std::io::Error {
    XzError::new(
        ExitCode::InvalidParameter,
        &format!("{operation} is not supported by the open mode"),
    )
    .into()
}

impl Read for XzFile {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let Direction::Reader {
            file,
            processor,
            decoded,
            done,
        } = &mut self.direction
        else {
            return Err(wrong_direction("read"));
        };

        while decoded.is_empty() && !*done && !buf.is_empty() {
            let input = file.fill_buf()?;

            if input.is_empty() {
                *done = processor.process_buffer(&[], true, decoded, usize::MAX)?;
            } else {
                processor.process_buffer(input, false, decoded, usize::MAX)?;
                let amount = input.len();
                file.consume(amount);
            }
        }

        decoded.read(buf)
    }
}

impl Write for XzFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let Direction::Writer {
            file,
            processor,
            finished,
        } = &mut self.direction
        else {
            return Err(wrong_direction("write"));
        };

        if *finished {
            return Err(wrong_direction("write after close"));
        }

        processor.process_buffer(buf, false, file, usize::MAX)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.direction {
            Direction::Writer { file, .. } => file.flush(),
            Direction::Reader { .. } => Err(wrong_direction("flush")),
        }
    }
}

impl Drop for XzFile {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::warn!("failed to finish {:?} on drop: {e}", self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{assert_eq_array, text};

    fn temp_path(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("r").unwrap(), (OpenMode::Read, None));
        assert_eq!(parse_mode("rb").unwrap(), (OpenMode::Read, None));
        assert_eq!(parse_mode("wb").unwrap(), (OpenMode::Write, None));
        assert_eq!(parse_mode("w:9").unwrap(), (OpenMode::Write, Some(9)));
        assert_eq!(parse_mode("a:0").unwrap(), (OpenMode::Append, Some(0)));

        for mode in ["", "r+", "w+", "x", "rw", "w:", "w:10", "w:fast"] {
            assert_eq!(
                parse_mode(mode).unwrap_err().exit_code(),
                ExitCode::InvalidParameter,
                "mode {mode:?}"
            );
        }
    }

    #[test]
    fn test_write_then_read() {
        crate::init_logging();

        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "data.xz");
        let original = text(150_000, 23);

        let mut writer = open_stream(&path, "wb", Some(6)).unwrap();
        for chunk in original.chunks(5000) {
            writer.write_all(chunk).unwrap();
        }
        writer.close().unwrap();

        // what is on disk is an ordinary .xz stream
        let on_disk = std::fs::read(&path).unwrap();
        assert_eq_array(&crate::decode(&on_disk, 0).unwrap(), &original);

        let mut reader = open_stream(&path, "r", None).unwrap();
        let mut recreated = Vec::new();
        reader.read_to_end(&mut recreated).unwrap();
        assert_eq_array(&recreated, &original);
    }

    #[test]
    fn test_append_concatenates_streams() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "log.xz");

        let mut writer = open_stream(&path, "a", None).unwrap();
        writer.write_all(b"first line\n").unwrap();
        writer.close().unwrap();

        let mut writer = open_stream(&path, "ab:1", None).unwrap();
        writer.write_all(b"second line\n").unwrap();
        writer.close().unwrap();

        let mut recreated = Vec::new();
        let copied = open_stream(&path, "rb", None)
            .unwrap()
            .passthru(&mut recreated)
            .unwrap();

        assert_eq!(recreated, b"first line\nsecond line\n");
        assert_eq!(copied, recreated.len() as u64);
    }

    #[test]
    fn test_prefix_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "prefixed.xz");

        let mut writer = open_stream(&format!("{STREAM_PREFIX}{path}"), "w", None).unwrap();
        assert_eq!(writer.path(), Path::new(&path));
        writer.write_all(b"hello").unwrap();
        writer.close().unwrap();

        assert_eq!(crate::decode(&std::fs::read(&path).unwrap(), 0).unwrap(), b"hello");
    }

    #[test]
    fn test_drop_finishes_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "dropped.xz");

        {
            let mut writer = open_stream(&path, "w:0", None).unwrap();
            writer.write_all(b"never closed explicitly").unwrap();
        }

        assert_eq!(
            crate::decode(&std::fs::read(&path).unwrap(), 0).unwrap(),
            b"never closed explicitly"
        );
    }

    #[test]
    fn test_wrong_direction() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "direction.xz");

        let mut writer = open_stream(&path, "w", None).unwrap();
        let e = writer.read(&mut [0u8; 16]).unwrap_err();
        assert_eq!(XzError::from(e).exit_code(), ExitCode::InvalidParameter);
        assert_eq!(
            writer.passthru(&mut Vec::new()).unwrap_err().exit_code(),
            ExitCode::InvalidParameter
        );
        writer.close().unwrap();

        let mut reader = open_stream(&path, "r", None).unwrap();
        let e = reader.write(b"abc").unwrap_err();
        assert_eq!(XzError::from(e).exit_code(), ExitCode::InvalidParameter);
        assert_eq!(reader.mode(), OpenMode::Read);
    }

    #[test]
    fn test_read_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "corrupt.xz");

        let mut encoded = crate::encode(&text(20_000, 9), 6).unwrap();
        let middle = encoded.len() / 2;
        encoded[middle] ^= 0x55;
        std::fs::write(&path, &encoded).unwrap();

        let config = XzConfig::default();
        let mut reader = XzFile::open_with_config(&path, "r", None, &config).unwrap();
        let e = reader.read_to_end(&mut Vec::new()).unwrap_err();
        assert_eq!(XzError::from(e).exit_code(), ExitCode::CodecError);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir, "missing.xz");

        let e = open_stream(&path, "r", None).err().unwrap();
        assert_eq!(e.exit_code(), ExitCode::OsError);
    }
}
