use std::{collections::VecDeque, io::Write};

use crate::Result;

/// writes the pending output to the writer, at most `max_output_write` bytes
pub fn write_dequeue(
    pending_output: &mut VecDeque<u8>,
    writer: &mut impl Write,
    max_output_write: usize,
) -> Result<usize> {
    if !pending_output.is_empty() {
        let slices = pending_output.as_slices();

        let mut amount_written = 0;
        let len = slices.0.len().min(max_output_write);
        writer.write_all(&slices.0[..len])?;
        amount_written += len;

        if amount_written < max_output_write {
            let len = slices.1.len().min(max_output_write - amount_written);
            writer.write_all(&slices.1[..len])?;
            amount_written += len;
        }

        pending_output.drain(..amount_written);
        Ok(amount_written)
    } else {
        Ok(0)
    }
}

#[test]
fn test_write_dequeue_limits_output() {
    let mut pending: VecDeque<u8> = (0..10u8).collect();
    // force the queue to wrap so both slices are used
    pending.drain(..4);
    pending.extend(10..14u8);

    let mut out = Vec::new();
    assert_eq!(write_dequeue(&mut pending, &mut out, 5).unwrap(), 5);
    assert_eq!(out, [4, 5, 6, 7, 8]);

    assert_eq!(write_dequeue(&mut pending, &mut out, usize::MAX).unwrap(), 5);
    assert_eq!(out, (4..14u8).collect::<Vec<_>>());
    assert!(pending.is_empty());

    assert_eq!(write_dequeue(&mut pending, &mut out, 5).unwrap(), 0);
}

/// xorshift generated bytes that do not compress
#[cfg(test)]
pub fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

/// word soup that compresses reasonably but not trivially
#[cfg(test)]
pub fn text(len: usize, seed: u64) -> Vec<u8> {
    const WORDS: [&[u8]; 8] = [
        b"stream ", b"buffer ", b"scratch ", b"engine ", b"flush ", b"xz ", b"lzma2 ", b"\n",
    ];

    let choices = noise(len, seed);
    let mut result = Vec::with_capacity(len + 8);
    let mut i = 0;
    while result.len() < len {
        result.extend_from_slice(WORDS[usize::from(choices[i % len] & 7)]);
        i += 1;
    }
    result.truncate(len);
    result
}

/// handy function to compare two arrays, and print the first mismatch. Useful for debugging.
#[cfg(test)]
#[track_caller]
pub fn assert_eq_array<T: PartialEq + std::fmt::Debug>(a: &[T], b: &[T]) {
    use core::panic;

    if a.len() != b.len() {
        for i in 0..std::cmp::min(a.len(), b.len()) {
            assert_eq!(
                a[i],
                b[i],
                "length mismatch {},{} and first mismatch at offset {}",
                a.len(),
                b.len(),
                i
            );
        }
        panic!(
            "length mismatch {} and {}, but common prefix identical",
            a.len(),
            b.len()
        );
    } else {
        for i in 0..a.len() {
            assert_eq!(
                a[i],
                b[i],
                "length identical {}, but first mismatch at offset {}",
                a.len(),
                i
            );
        }
    }
}
