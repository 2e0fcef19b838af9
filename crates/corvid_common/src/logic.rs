//! IEEE 1164 nine-state logic values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Not};

/// A single `std_ulogic` value.
///
/// The states follow IEEE 1164 order: `U X 0 1 Z W L H -`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Logic {
    /// Uninitialized (`'U'`).
    Uninit,
    /// Forcing unknown (`'X'`).
    Unknown,
    /// Forcing low (`'0'`).
    Low,
    /// Forcing high (`'1'`).
    High,
    /// High impedance (`'Z'`).
    HighZ,
    /// Weak unknown (`'W'`).
    Weak,
    /// Weak low (`'L'`).
    WeakLow,
    /// Weak high (`'H'`).
    WeakHigh,
    /// Don't care (`'-'`).
    DontCare,
}

impl Logic {
    /// Every state in IEEE 1164 declaration order.
    pub const ALL: [Logic; 9] = [
        Logic::Uninit,
        Logic::Unknown,
        Logic::Low,
        Logic::High,
        Logic::HighZ,
        Logic::Weak,
        Logic::WeakLow,
        Logic::WeakHigh,
        Logic::DontCare,
    ];

    /// Parses the VHDL character literal body of a `std_ulogic` value.
    pub fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'U' | 'u' => Logic::Uninit,
            'X' | 'x' => Logic::Unknown,
            '0' => Logic::Low,
            '1' => Logic::High,
            'Z' | 'z' => Logic::HighZ,
            'W' | 'w' => Logic::Weak,
            'L' | 'l' => Logic::WeakLow,
            'H' | 'h' => Logic::WeakHigh,
            '-' => Logic::DontCare,
            _ => return None,
        })
    }

    /// Returns the VHDL character for this state.
    pub fn to_char(self) -> char {
        match self {
            Logic::Uninit => 'U',
            Logic::Unknown => 'X',
            Logic::Low => '0',
            Logic::High => '1',
            Logic::HighZ => 'Z',
            Logic::Weak => 'W',
            Logic::WeakLow => 'L',
            Logic::WeakHigh => 'H',
            Logic::DontCare => '-',
        }
    }

    /// Maps a host boolean to `'1'`/`'0'`.
    pub fn from_bool(value: bool) -> Self {
        if value {
            Logic::High
        } else {
            Logic::Low
        }
    }

    /// Strength-strips the value like `to_x01`: weak levels become strong,
    /// everything that is not a level becomes `'X'`.
    pub fn to_x01(self) -> Logic {
        match self {
            Logic::Low | Logic::WeakLow => Logic::Low,
            Logic::High | Logic::WeakHigh => Logic::High,
            _ => Logic::Unknown,
        }
    }

    /// Returns the boolean level if the value is a (weak or strong) 0/1.
    pub fn as_bool(self) -> Option<bool> {
        match self.to_x01() {
            Logic::Low => Some(false),
            Logic::High => Some(true),
            _ => None,
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

impl BitAnd for Logic {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        use Logic::*;
        match (self.to_x01(), rhs.to_x01()) {
            (Low, _) | (_, Low) => Low,
            _ if self == Uninit || rhs == Uninit => Uninit,
            (High, High) => High,
            _ => Unknown,
        }
    }
}

impl BitOr for Logic {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        use Logic::*;
        match (self.to_x01(), rhs.to_x01()) {
            (High, _) | (_, High) => High,
            _ if self == Uninit || rhs == Uninit => Uninit,
            (Low, Low) => Low,
            _ => Unknown,
        }
    }
}

impl BitXor for Logic {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self {
        use Logic::*;
        if self == Uninit || rhs == Uninit {
            return Uninit;
        }
        match (self.to_x01(), rhs.to_x01()) {
            (Low, Low) | (High, High) => Low,
            (Low, High) | (High, Low) => High,
            _ => Unknown,
        }
    }
}

impl Not for Logic {
    type Output = Self;

    fn not(self) -> Self {
        use Logic::*;
        match self {
            Uninit => Uninit,
            _ => match self.to_x01() {
                Low => High,
                High => Low,
                _ => Unknown,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Logic::{self, *};

    #[test]
    fn char_roundtrip() {
        for v in Logic::ALL {
            assert_eq!(Logic::from_char(v.to_char()), Some(v));
        }
        assert_eq!(Logic::from_char('q'), None);
    }

    #[test]
    fn and_low_dominates() {
        assert_eq!(Low & Uninit, Low);
        assert_eq!(WeakLow & High, Low);
        assert_eq!(High & WeakHigh, High);
        assert_eq!(High & Uninit, Uninit);
        assert_eq!(High & HighZ, Unknown);
    }

    #[test]
    fn or_high_dominates() {
        assert_eq!(High | Uninit, High);
        assert_eq!(Low | WeakHigh, High);
        assert_eq!(Low | Low, Low);
        assert_eq!(Low | DontCare, Unknown);
    }

    #[test]
    fn xor_and_not() {
        assert_eq!(High ^ Low, High);
        assert_eq!(WeakHigh ^ High, Low);
        assert_eq!(Uninit ^ Low, Uninit);
        assert_eq!(!High, Low);
        assert_eq!(!WeakLow, High);
        assert_eq!(!HighZ, Unknown);
        assert_eq!(!Uninit, Uninit);
    }

    #[test]
    fn as_bool_levels() {
        assert_eq!(WeakHigh.as_bool(), Some(true));
        assert_eq!(Low.as_bool(), Some(false));
        assert_eq!(Weak.as_bool(), None);
    }
}
