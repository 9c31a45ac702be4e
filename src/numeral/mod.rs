//! Fixed-width positional numerals over caller-supplied alphabets.
//!
//! A raw value is exactly `width` characters: an optional leading run of
//! pad characters followed by alphabet digits, most significant first.
//! When the pad character is not part of the alphabet it is a placeholder
//! for "no digit yet", and an all-pad string is the state before the first
//! value. When the pad equals the alphabet's first character, padding is
//! plain zero-fill and every raw value is an ordinary numeral.

use std::collections::HashSet;

use crate::contracts::CodecError;

/// Outcome of incrementing a raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The next raw value, same width as the input.
    Next(String),
    /// The input was the largest representable value.
    Overflow,
}

/// Number of distinct values a `width`-digit numeral in base `base` can hold,
/// or `None` if that count does not fit in a `u128`.
pub fn capacity(base: usize, width: usize) -> Option<u128> {
    let width = u32::try_from(width).ok()?;
    (base as u128).checked_pow(width)
}

/// An alphabet, a pad character and a width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumeralSystem {
    digits: Vec<char>,
    pad: char,
    width: usize,
    capacity: u128,
}

impl NumeralSystem {
    /// Validates the parts and builds the system.
    ///
    /// The alphabet needs at least two distinct characters. The pad must be
    /// outside the alphabet or equal to its first character. `base^width`
    /// must fit in a `u128`.
    pub fn new(alphabet: &str, pad: char, width: usize) -> Result<Self, CodecError> {
        let digits: Vec<char> = alphabet.chars().collect();
        if digits.len() < 2 {
            return Err(CodecError::InvalidAlphabet(format!(
                "need at least 2 characters, got {}",
                digits.len()
            )));
        }

        let mut seen = HashSet::with_capacity(digits.len());
        if let Some(dup) = digits.iter().find(|c| !seen.insert(**c)) {
            return Err(CodecError::InvalidAlphabet(format!(
                "duplicate character {:?}",
                dup
            )));
        }

        if let Some(pos) = digits.iter().position(|&c| c == pad) {
            if pos != 0 {
                return Err(CodecError::InvalidPadChar(pad));
            }
        }

        if width == 0 {
            return Err(CodecError::InvalidWidth {
                width,
                reason: "must be at least 1".into(),
            });
        }

        let capacity = capacity(digits.len(), width).ok_or_else(|| CodecError::InvalidWidth {
            width,
            reason: format!("{}^{} values exceed the supported range", digits.len(), width),
        })?;

        Ok(Self {
            digits,
            pad,
            width,
            capacity,
        })
    }

    pub fn base(&self) -> usize {
        self.digits.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn pad(&self) -> char {
        self.pad
    }

    /// `base^width`, the number of distinct representable values.
    pub fn capacity(&self) -> u128 {
        self.capacity
    }

    /// True when the pad is the alphabet's zero digit rather than a placeholder.
    pub fn is_zero_filled(&self) -> bool {
        self.digits[0] == self.pad
    }

    /// The all-pad raw value a new sequence starts from.
    pub fn blank(&self) -> String {
        std::iter::repeat(self.pad).take(self.width).collect()
    }

    /// Checks that `raw` is a well-formed value of this system.
    pub fn validate(&self, raw: &str) -> Result<(), CodecError> {
        self.parse(raw).map(|_| ())
    }

    /// Adds one to `raw`, carrying leftwards.
    ///
    /// Digit positions are updated in place and never revert to padding. A
    /// carry reaching a placeholder turns it into digit value 1; an
    /// all-placeholder value becomes the first digit in the last position.
    pub fn increment(&self, raw: &str) -> Result<Step, CodecError> {
        let mut positions = self.parse(raw)?;

        if positions.iter().all(Option::is_none) {
            positions[self.width - 1] = Some(0);
            return Ok(Step::Next(self.render(&positions)));
        }

        let base = self.base();
        for slot in positions.iter_mut().rev() {
            let next = slot.map_or(1, |d| d + 1);
            if next == base {
                *slot = Some(0);
                continue;
            }
            *slot = Some(next);
            return Ok(Step::Next(self.render(&positions)));
        }

        Ok(Step::Overflow)
    }

    /// Renders `value` with the fewest digits, left-padded to the width.
    pub fn encode(&self, value: u128) -> Result<String, CodecError> {
        if value >= self.capacity {
            return Err(CodecError::ValueTooLarge(value));
        }

        let base = self.base() as u128;
        let mut reversed = Vec::with_capacity(self.width);
        let mut rest = value;
        loop {
            reversed.push(self.digits[(rest % base) as usize]);
            rest /= base;
            if rest == 0 {
                break;
            }
        }

        let mut out = String::with_capacity(self.width);
        out.extend(std::iter::repeat(self.pad).take(self.width - reversed.len()));
        out.extend(reversed.into_iter().rev());
        Ok(out)
    }

    /// Returns the numeric value of `raw`, or `None` for the all-placeholder
    /// value that precedes the first real one.
    pub fn decode(&self, raw: &str) -> Result<Option<u128>, CodecError> {
        let positions = self.parse(raw)?;
        if positions.iter().all(Option::is_none) {
            return Ok(None);
        }
        let base = self.base() as u128;
        Ok(Some(
            positions
                .into_iter()
                .flatten()
                .fold(0u128, |acc, d| acc * base + d as u128),
        ))
    }

    /// How many more increments `raw` can take before overflowing.
    pub fn remaining(&self, raw: &str) -> Result<u128, CodecError> {
        Ok(match self.decode(raw)? {
            None => self.capacity,
            Some(value) => self.capacity - 1 - value,
        })
    }

    fn is_placeholder(&self, c: char) -> bool {
        c == self.pad && !self.is_zero_filled()
    }

    fn digit_value(&self, c: char) -> Option<usize> {
        self.digits.iter().position(|&d| d == c)
    }

    /// Splits `raw` into per-position digit values; `None` marks a placeholder.
    fn parse(&self, raw: &str) -> Result<Vec<Option<usize>>, CodecError> {
        let invalid = |reason: String| CodecError::InvalidRepresentation {
            raw: raw.to_string(),
            reason,
        };

        let len = raw.chars().count();
        if len != self.width {
            return Err(invalid(format!(
                "expected {} characters, got {}",
                self.width, len
            )));
        }

        let mut positions = Vec::with_capacity(self.width);
        let mut in_digits = false;
        for (i, c) in raw.chars().enumerate() {
            if !in_digits && self.is_placeholder(c) {
                positions.push(None);
                continue;
            }
            match self.digit_value(c) {
                Some(d) => {
                    in_digits = true;
                    positions.push(Some(d));
                }
                None if self.is_placeholder(c) => {
                    return Err(invalid(format!("pad character after a digit at {}", i)));
                }
                None => {
                    return Err(invalid(format!("{:?} at {} is not in the alphabet", c, i)));
                }
            }
        }
        Ok(positions)
    }

    fn render(&self, positions: &[Option<usize>]) -> String {
        positions
            .iter()
            .map(|p| p.map_or(self.pad, |d| self.digits[d]))
            .collect()
    }
}
