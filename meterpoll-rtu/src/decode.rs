//! Reassembly of multi-word register values and fixed-point scaling.
//!
//! Words arrive most-significant first. The full unsigned integer is built
//! before the scale is applied, so no bits are lost on 32/64-bit values:
//!
//! | words | integer | result |
//! |-------|---------|--------|
//! | 1     | `u16`   | `f32`  |
//! | 2     | `u32`   | `f32`  |
//! | 4     | `u64`   | `f64`  |

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::registers::WordCount;

/// Error raised when raw words cannot be turned into a scaled value.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    #[error("expected {expected} words, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("scaled value {0} is not finite")]
    NotFinite(f64),
}

/// A scaled register value with width-dependent precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaledValue {
    /// One or two word registers.
    Single(f32),
    /// Four word registers.
    Double(f64),
}

impl ScaledValue {
    /// Value widened to `f64`.
    pub fn as_f64(&self) -> f64 {
        match *self {
            ScaledValue::Single(v) => f64::from(v),
            ScaledValue::Double(v) => v,
        }
    }
}

impl std::fmt::Display for ScaledValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaledValue::Single(v) => write!(f, "{:.3}", v),
            ScaledValue::Double(v) => write!(f, "{:.6}", v),
        }
    }
}

impl Serialize for ScaledValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            ScaledValue::Single(v) => serializer.serialize_f32(v),
            ScaledValue::Double(v) => serializer.serialize_f64(v),
        }
    }
}

/// Combine two big-endian words into a 32-bit magnitude.
pub fn combine_u32(high: u16, low: u16) -> u32 {
    (u32::from(high) << 16) | u32::from(low)
}

/// Combine four big-endian words into a 64-bit magnitude.
pub fn combine_u64(words: [u16; 4]) -> u64 {
    (u64::from(words[0]) << 48)
        | (u64::from(words[1]) << 32)
        | (u64::from(words[2]) << 16)
        | u64::from(words[3])
}

/// Reassemble `words` according to `count` and apply `scale`.
pub fn decode_words(
    words: &[u16],
    count: WordCount,
    scale: f64,
) -> Result<ScaledValue, DecodeError> {
    let expected = usize::from(count.words());
    if words.len() != expected {
        return Err(DecodeError::Length {
            expected,
            actual: words.len(),
        });
    }

    let value = match count {
        WordCount::One => ScaledValue::Single((f64::from(words[0]) * scale) as f32),
        WordCount::Two => {
            let combined = combine_u32(words[0], words[1]);
            ScaledValue::Single((f64::from(combined) * scale) as f32)
        }
        WordCount::Four => {
            let combined = combine_u64([words[0], words[1], words[2], words[3]]);
            ScaledValue::Double(combined as f64 * scale)
        }
    };

    // JSON has no representation for infinities
    if !value.as_f64().is_finite() {
        return Err(DecodeError::NotFinite(value.as_f64()));
    }

    Ok(value)
}
