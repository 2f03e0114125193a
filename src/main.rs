/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use std::{
    fs,
    path::{Path, PathBuf},
    process,
    time::Instant,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use env_logger::Builder;
use log::LevelFilter;

use xz_oneshot::{decode_with_config, encode_with_config, ExitCode, XzConfig, XzError};

#[derive(Parser)]
#[command(name = "xz_util")]
#[command(about = "Compresses and decompresses files in the xz format", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// level of logging to use
    #[arg(long, default_value = "Error")]
    loglevel: LevelFilter,
}

#[derive(Subcommand)]
enum Command {
    /// Compress a file into an .xz stream
    Compress {
        input: PathBuf,

        /// Output file, defaults to the input with .xz appended
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Compression level (0-9), defaults to XZ_COMPRESSION_LEVEL or 5
        #[arg(short = 'c', long)]
        level: Option<u32>,
    },

    /// Decompress an .xz or .lzma file
    Decompress {
        input: PathBuf,

        /// Output file, defaults to the input with .xz stripped
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Maximum decoder memory in bytes (0 = unlimited), defaults to XZ_MAX_MEMORY
        #[arg(long)]
        max_memory: Option<u64>,
    },

    /// Compress and decompress a file in memory and verify the result
    Roundtrip {
        input: PathBuf,

        /// Compression level (0-9)
        #[arg(short = 'c', long)]
        level: Option<u32>,
    },
}

fn default_compressed_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(".xz");
    PathBuf::from(name)
}

fn default_decompressed_path(input: &Path) -> PathBuf {
    match input.extension() {
        Some(ext) if ext == "xz" || ext == "lzma" => input.with_extension(""),
        _ => {
            let mut name = input.as_os_str().to_owned();
            name.push(".out");
            PathBuf::from(name)
        }
    }
}

fn build_config(level: Option<u32>, max_memory: Option<u64>) -> anyhow::Result<XzConfig> {
    let mut config = XzConfig::from_env();
    if let Some(level) = level {
        config = config.with_compression_level(level);
    }
    if let Some(max_memory) = max_memory {
        config = config.with_max_memory(max_memory);
    }
    config.validate()?;
    Ok(config)
}

fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Compress {
            input,
            output,
            level,
        } => {
            let config = build_config(level, None)?;
            let output = output.unwrap_or_else(|| default_compressed_path(&input));

            let original = fs::read(&input).with_context(|| format!("reading {input:?}"))?;

            let start = Instant::now();
            let compressed = encode_with_config(&original, &config)?;

            println!(
                "compressed {} -> {} bytes ({:.1}%) at level {} in {:?}",
                original.len(),
                compressed.len(),
                compressed.len() as f64 * 100f64 / original.len().max(1) as f64,
                config.compression_level,
                start.elapsed()
            );

            fs::write(&output, compressed).with_context(|| format!("writing {output:?}"))?;
        }
        Command::Decompress {
            input,
            output,
            max_memory,
        } => {
            let config = build_config(None, max_memory)?;
            let output = output.unwrap_or_else(|| default_decompressed_path(&input));

            let compressed = fs::read(&input).with_context(|| format!("reading {input:?}"))?;

            let start = Instant::now();
            let decompressed = decode_with_config(&compressed, &config)?;

            println!(
                "decompressed {} -> {} bytes in {:?}",
                compressed.len(),
                decompressed.len(),
                start.elapsed()
            );

            fs::write(&output, decompressed).with_context(|| format!("writing {output:?}"))?;
        }
        Command::Roundtrip { input, level } => {
            let config = build_config(level, None)?;

            let original = fs::read(&input).with_context(|| format!("reading {input:?}"))?;

            let start = Instant::now();
            let compressed = encode_with_config(&original, &config)?;
            let compress_time = start.elapsed();

            let start = Instant::now();
            let recreated = decode_with_config(&compressed, &config)?;
            let decompress_time = start.elapsed();

            if recreated != original {
                anyhow::bail!("roundtrip of {input:?} did not reproduce the original");
            }

            println!(
                "{input:?}: {} -> {} bytes, compress {compress_time:?}, decompress {decompress_time:?}",
                original.len(),
                compressed.len()
            );
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    Builder::new().filter_level(cli.loglevel).init();

    if let Err(e) = run(cli.command) {
        eprintln!("error: {e:?}");

        let exit_code = if let Some(xe) = e.downcast_ref::<XzError>() {
            xe.exit_code()
        } else if e.downcast_ref::<std::io::Error>().is_some() {
            ExitCode::OsError
        } else {
            ExitCode::GeneralFailure
        };
        process::exit(exit_code.as_integer_error_code());
    }
}
