/*---------------------------------------------------------------------------------------------
 *  Copyright (c) Microsoft Corporation. All rights reserved.
 *  Licensed under the Apache License, Version 2.0. See LICENSE.txt in the project root for license information.
 *  This software incorporates material from third parties. See NOTICE.txt for details.
 *--------------------------------------------------------------------------------------------*/

/// Size of the buffer the engine writes into on every burst.
pub const SCRATCH_BUFFER_SIZE: usize = 4096;

/// Fixed size output target for a single engine burst.
///
/// The engine writes into the unfilled tail, and the owner flushes the filled
/// prefix once the buffer is full (or once at the very end of the stream).
/// Never resized.
pub struct ScratchBuffer {
    buffer: [u8; SCRATCH_BUFFER_SIZE],
    position: usize,
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScratchBuffer {
    pub fn new() -> Self {
        ScratchBuffer {
            buffer: [0; SCRATCH_BUFFER_SIZE],
            position: 0,
        }
    }

    /// the part of the buffer the engine may still write to
    pub fn unfilled(&mut self) -> &mut [u8] {
        &mut self.buffer[self.position..]
    }

    /// marks `amount` bytes of the unfilled region as written
    pub fn advance(&mut self, amount: usize) {
        assert!(
            amount <= self.remaining(),
            "engine wrote past the end of the scratch buffer"
        );
        self.position += amount;
    }

    /// bytes produced since the last reset
    pub fn filled(&self) -> &[u8] {
        &self.buffer[..self.position]
    }

    /// remaining output space
    pub fn remaining(&self) -> usize {
        SCRATCH_BUFFER_SIZE - self.position
    }

    pub fn is_full(&self) -> bool {
        self.position == SCRATCH_BUFFER_SIZE
    }

    /// moves the write cursor back to the start of the buffer
    pub fn reset(&mut self) {
        self.position = 0;
    }
}

#[test]
fn test_scratch_cursor() {
    let mut scratch = ScratchBuffer::new();
    assert_eq!(scratch.remaining(), SCRATCH_BUFFER_SIZE);
    assert!(scratch.filled().is_empty());

    scratch.unfilled()[..3].copy_from_slice(b"abc");
    scratch.advance(3);
    assert_eq!(scratch.filled(), b"abc");
    assert_eq!(scratch.unfilled().len(), SCRATCH_BUFFER_SIZE - 3);
    assert!(!scratch.is_full());

    scratch.advance(SCRATCH_BUFFER_SIZE - 3);
    assert!(scratch.is_full());
    assert_eq!(scratch.remaining(), 0);
    assert!(scratch.unfilled().is_empty());

    scratch.reset();
    assert_eq!(scratch.remaining(), SCRATCH_BUFFER_SIZE);
    assert!(scratch.filled().is_empty());
}

#[test]
#[should_panic]
fn test_scratch_overrun_panics() {
    let mut scratch = ScratchBuffer::new();
    scratch.advance(SCRATCH_BUFFER_SIZE + 1);
}
