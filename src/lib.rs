/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

// forbid lints that we already have eliminated from the codebase so they don't show up in the future
#![forbid(unsafe_code)]
#![forbid(trivial_casts)]
#![forbid(non_ascii_idents)]
#![forbid(unused_extern_crates)]
#![forbid(unused_import_braces)]
#![forbid(single_use_lifetimes)]
#![forbid(unused_lifetimes)]
#![forbid(macro_use_extern_crate)]

mod codec_session;
mod config;
mod decode_driver;
mod encode_driver;
mod output_accumulator;
mod scratch_buffer;
mod stream_processor;
mod utils;
mod xz_error;
mod xz_file;

pub use codec_session::{LzmaStatus, UNLIMITED_MEMORY};
pub use config::{
    XzConfig, COMPRESSION_LEVEL_VAR, DEFAULT_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL,
    MAX_MEMORY_VAR,
};
pub use decode_driver::{decode, decode_with_config};
pub use encode_driver::{encode, encode_with_config};
pub use scratch_buffer::SCRATCH_BUFFER_SIZE;
pub use stream_processor::{ProcessBuffer, XzCompressProcessor, XzDecompressProcessor};
pub use xz_error::{err_exit_code, AddContext, ExitCode, Result, XzError};
pub use xz_file::{open_stream, parse_mode, OpenMode, XzFile, STREAM_PREFIX};

#[cfg(test)]
static INIT: std::sync::Once = std::sync::Once::new();

/// Initialize the logger for tests. This is a no-op if the logger is already initialized.
#[cfg(test)]
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
