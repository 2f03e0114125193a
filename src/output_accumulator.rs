/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

use crate::xz_error::{ExitCode, Result, XzError};

/// Growable buffer that collects the slices flushed out of the scratch buffer.
///
/// The content is always the concatenation, in order, of every slice passed to
/// `append`. Capacity grows geometrically so the prefix is not copied on every
/// flush.
#[derive(Debug, Default)]
pub struct OutputAccumulator {
    buffer: Vec<u8>,
    flushes: usize,
}

impl OutputAccumulator {
    pub fn new() -> Self {
        OutputAccumulator::default()
    }

    /// Appends `source` to the end of the buffer and returns the new total length.
    ///
    /// Allocation failure is reported as `ExitCode::OutOfMemory` and is fatal to
    /// the operation that owns the accumulator.
    pub fn append(&mut self, source: &[u8]) -> Result<usize> {
        if source.is_empty() {
            return Ok(self.buffer.len());
        }

        self.buffer
            .try_reserve(source.len())
            .map_err(|e| XzError::wrap(ExitCode::OutOfMemory, &e))?;
        self.buffer.extend_from_slice(source);
        self.flushes += 1;

        log::trace!(
            "flushed {} bytes, accumulated {}",
            source.len(),
            self.buffer.len()
        );

        Ok(self.buffer.len())
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// number of non-empty slices appended so far
    pub fn flushes(&self) -> usize {
        self.flushes
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

#[test]
fn test_append_returns_running_total() {
    let mut acc = OutputAccumulator::new();
    assert!(acc.is_empty());

    assert_eq!(acc.append(b"hello").unwrap(), 5);
    assert_eq!(acc.append(b", ").unwrap(), 7);
    assert_eq!(acc.append(b"world").unwrap(), 12);

    assert_eq!(acc.as_slice(), b"hello, world");
    assert_eq!(acc.flushes(), 3);
}

#[test]
fn test_append_empty_is_noop() {
    let mut acc = OutputAccumulator::new();
    assert_eq!(acc.append(&[]).unwrap(), 0);

    acc.append(b"abc").unwrap();
    assert_eq!(acc.append(&[]).unwrap(), 3);
    assert_eq!(acc.flushes(), 1);
    assert_eq!(acc.into_inner(), b"abc");
}

#[test]
fn test_append_full_scratch_blocks() {
    use crate::scratch_buffer::SCRATCH_BUFFER_SIZE;

    let mut acc = OutputAccumulator::new();
    let mut expected = Vec::new();

    // several full blocks followed by a final partial one
    for i in 0..5u8 {
        let block = [i; SCRATCH_BUFFER_SIZE];
        acc.append(&block).unwrap();
        expected.extend_from_slice(&block);
    }
    acc.append(&[0xff; 17]).unwrap();
    expected.extend_from_slice(&[0xff; 17]);

    assert_eq!(acc.len(), 5 * SCRATCH_BUFFER_SIZE + 17);
    assert!(acc.as_slice() == &expected[..]);
}
