/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::xz_error::{err_exit_code, ExitCode, Result};

/// Highest preset level accepted by the encoder.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

pub const DEFAULT_COMPRESSION_LEVEL: u32 = 5;

/// environment variable overriding the default compression level
pub const COMPRESSION_LEVEL_VAR: &str = "XZ_COMPRESSION_LEVEL";

/// environment variable overriding the decoder memory ceiling
pub const MAX_MEMORY_VAR: &str = "XZ_MAX_MEMORY";

/// Configuration snapshot for encode and decode calls.
///
/// Resolved once before an operation starts and passed in explicitly, it is
/// never consulted again while the operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XzConfig {
    /// Preset level (0-9) used when the caller does not specify one.
    pub compression_level: u32,

    /// The maximum amount of memory in bytes that the decoder may use.
    /// 0 stands for unlimited.
    pub max_memory: u64,
}

impl Default for XzConfig {
    fn default() -> Self {
        XzConfig {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            max_memory: 0,
        }
    }
}

impl XzConfig {
    pub fn with_compression_level(self, compression_level: u32) -> Self {
        XzConfig {
            compression_level,
            ..self
        }
    }

    pub fn with_max_memory(self, max_memory: u64) -> Self {
        XzConfig { max_memory, ..self }
    }

    pub fn validate(&self) -> Result<()> {
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return err_exit_code(
                ExitCode::InvalidParameter,
                format!(
                    "compression level {} out of range 0-{MAX_COMPRESSION_LEVEL}",
                    self.compression_level
                ),
            );
        }
        Ok(())
    }

    /// Builds a configuration from the process environment, falling back to
    /// the defaults for variables that are unset or cannot be parsed.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = XzConfig::default();

        if let Some(value) = lookup(COMPRESSION_LEVEL_VAR) {
            match value.trim().parse::<u32>() {
                Ok(level) if level <= MAX_COMPRESSION_LEVEL => config.compression_level = level,
                _ => log::warn!("ignoring invalid {COMPRESSION_LEVEL_VAR}={value}"),
            }
        }

        if let Some(value) = lookup(MAX_MEMORY_VAR) {
            match value.trim().parse::<u64>() {
                Ok(max_memory) => config.max_memory = max_memory,
                Err(_) => log::warn!("ignoring invalid {MAX_MEMORY_VAR}={value}"),
            }
        }

        config
    }
}

#[test]
fn test_defaults() {
    let config = XzConfig::default();
    assert_eq!(config.compression_level, 5);
    assert_eq!(config.max_memory, 0);
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_lookup() {
    let config = XzConfig::from_lookup(|key| match key {
        COMPRESSION_LEVEL_VAR => Some("9".to_owned()),
        MAX_MEMORY_VAR => Some(" 1048576 ".to_owned()),
        _ => None,
    });
    assert_eq!(
        config,
        XzConfig {
            compression_level: 9,
            max_memory: 1048576
        }
    );

    // out of range and garbage values fall back to the defaults
    let config = XzConfig::from_lookup(|key| match key {
        COMPRESSION_LEVEL_VAR => Some("12".to_owned()),
        MAX_MEMORY_VAR => Some("lots".to_owned()),
        _ => None,
    });
    assert_eq!(config, XzConfig::default());
}

#[test]
fn test_validate_level() {
    let e = XzConfig::default()
        .with_compression_level(10)
        .validate()
        .unwrap_err();
    assert_eq!(e.exit_code(), ExitCode::InvalidParameter);

    let config = XzConfig::default()
        .with_compression_level(0)
        .with_max_memory(4096);
    assert!(config.validate().is_ok());
    assert_eq!(config.max_memory, 4096);
}
