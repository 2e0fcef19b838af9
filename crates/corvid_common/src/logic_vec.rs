//! Ordered vectors of nine-state logic values.

use crate::logic::Logic;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A fixed-width vector of [`Logic`] values.
///
/// Index 0 is the least significant element. Formatting and parsing use
/// MSB-first order, matching VHDL bit-string literals.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicVec {
    bits: Vec<Logic>,
}

impl LogicVec {
    /// Creates a vector of the given width with every element set to `value`.
    pub fn filled(width: u32, value: Logic) -> Self {
        Self {
            bits: vec![value; width as usize],
        }
    }

    /// Creates a vector of the given width, all `'0'`.
    pub fn all_zero(width: u32) -> Self {
        Self::filled(width, Logic::Low)
    }

    /// Creates a vector of the given width, all `'1'`.
    pub fn all_one(width: u32) -> Self {
        Self::filled(width, Logic::High)
    }

    /// Builds a vector from LSB-first elements.
    pub fn from_bits(bits: Vec<Logic>) -> Self {
        Self { bits }
    }

    /// Encodes an unsigned value; bits beyond `width` are dropped.
    pub fn from_u64(value: u64, width: u32) -> Self {
        let bits = (0..width)
            .map(|i| Logic::from_bool(i < 64 && (value >> i) & 1 != 0))
            .collect();
        Self { bits }
    }

    /// Encodes a two's complement value, sign-extending beyond 64 bits.
    pub fn from_i64(value: i64, width: u32) -> Self {
        let bits = (0..width)
            .map(|i| {
                let bit = if i < 64 {
                    (value >> i) & 1 != 0
                } else {
                    value < 0
                };
                Logic::from_bool(bit)
            })
            .collect();
        Self { bits }
    }

    /// Parses an MSB-first string of `std_ulogic` characters; `_` is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let mut bits = text
            .chars()
            .filter(|c| *c != '_')
            .map(Logic::from_char)
            .collect::<Option<Vec<_>>>()?;
        bits.reverse();
        Some(Self { bits })
    }

    /// Returns the number of elements.
    pub fn width(&self) -> u32 {
        self.bits.len() as u32
    }

    /// Returns the element at `index` (0 = LSB).
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn get(&self, index: u32) -> Logic {
        self.bits[index as usize]
    }

    /// Sets the element at `index` (0 = LSB).
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn set(&mut self, index: u32, value: Logic) {
        self.bits[index as usize] = value;
    }

    /// Iterates LSB first.
    pub fn iter(&self) -> impl Iterator<Item = Logic> + '_ {
        self.bits.iter().copied()
    }

    /// Returns `true` if every element is a strong or weak 0/1.
    pub fn is_definite(&self) -> bool {
        self.bits.iter().all(|b| b.as_bool().is_some())
    }

    /// Interprets the vector as unsigned, if definite and at most 64 bits wide.
    pub fn to_u64(&self) -> Option<u64> {
        if self.width() > 64 {
            return None;
        }
        let mut out = 0u64;
        for (i, b) in self.bits.iter().enumerate() {
            if b.as_bool()? {
                out |= 1 << i;
            }
        }
        Some(out)
    }

    /// Interprets the vector as two's complement, if definite and at most 64 bits wide.
    pub fn to_i64(&self) -> Option<i64> {
        let raw = self.to_u64()?;
        let width = self.width();
        if width == 0 {
            return Some(0);
        }
        if width == 64 {
            return Some(raw as i64);
        }
        let sign = raw >> (width - 1) & 1 == 1;
        Some(if sign {
            (raw | (u64::MAX << width)) as i64
        } else {
            raw as i64
        })
    }

    /// Returns the elements `low..=high` as a new vector.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    pub fn slice(&self, high: u32, low: u32) -> Self {
        Self {
            bits: self.bits[low as usize..=high as usize].to_vec(),
        }
    }

    /// Concatenates `self` (upper part) with `low` (lower part).
    pub fn concat(&self, low: &LogicVec) -> Self {
        let mut bits = low.bits.clone();
        bits.extend_from_slice(&self.bits);
        Self { bits }
    }

    /// Returns `true` if every element equals `value`.
    pub fn is_all(&self, value: Logic) -> bool {
        self.bits.iter().all(|b| *b == value)
    }
}

impl fmt::Display for LogicVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.bits.iter().rev() {
            write!(f, "{b}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for LogicVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LogicVec(\"{self}\")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_encoding() {
        let v = LogicVec::from_u64(5, 4);
        assert_eq!(v.to_string(), "0101");
        assert_eq!(v.to_u64(), Some(5));
    }

    #[test]
    fn signed_encoding() {
        let v = LogicVec::from_i64(-2, 4);
        assert_eq!(v.to_string(), "1110");
        assert_eq!(v.to_i64(), Some(-2));
        assert_eq!(LogicVec::from_i64(3, 4).to_i64(), Some(3));
    }

    #[test]
    fn parse_msb_first() {
        let v = LogicVec::parse("10_ZU").unwrap();
        assert_eq!(v.width(), 4);
        assert_eq!(v.get(0), Logic::Uninit);
        assert_eq!(v.get(3), Logic::High);
        assert!(!v.is_definite());
        assert!(LogicVec::parse("10q").is_none());
    }

    #[test]
    fn slice_and_concat() {
        let v = LogicVec::parse("11000101").unwrap();
        assert_eq!(v.slice(7, 4).to_string(), "1100");
        let hi = LogicVec::parse("11").unwrap();
        let lo = LogicVec::parse("00").unwrap();
        assert_eq!(hi.concat(&lo).to_string(), "1100");
    }

    #[test]
    fn fill_helpers() {
        assert!(LogicVec::all_one(3).is_all(Logic::High));
        assert!(LogicVec::all_zero(3).is_all(Logic::Low));
        assert_eq!(LogicVec::all_zero(70).to_u64(), None);
    }

    #[test]
    fn serde_roundtrip() {
        let v = LogicVec::parse("1X0").unwrap();
        let json = serde_json::to_string(&v).unwrap();
        let back: LogicVec = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
