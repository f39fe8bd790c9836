use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{CharzError, Result};

/// Which bus a binary literal drives.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Operand {
    Address,
    Data,
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Address => write!(f, "address"),
            Operand::Data => write!(f, "data"),
        }
    }
}

/// A fixed-width bus value.
///
/// Bit `i` is stored at index `i`, so index 0 is the least significant bit.
/// Literals are written and read most significant bit first.
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BitSignal {
    bits: Vec<bool>,
}

impl BitSignal {
    /// Parses a literal such as `"1011"`, whose first character is the MSB.
    pub fn parse(literal: &str, operand: Operand) -> Result<Self> {
        let bits = literal
            .chars()
            .rev()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                _ => Err(CharzError::NonBinaryLiteral {
                    operand,
                    literal: literal.to_string(),
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { bits })
    }

    /// Parses a literal and checks that it is exactly `width` bits wide.
    pub fn parse_with_width(literal: &str, width: usize, operand: Operand) -> Result<Self> {
        let signal = Self::parse(literal, operand)?;
        if signal.width() != width {
            return Err(CharzError::MalformedOperand {
                operand,
                expected: width,
                actual: signal.width(),
            });
        }
        Ok(signal)
    }

    pub fn from_u64(mut value: u64, width: usize) -> Self {
        let mut bits = Vec::with_capacity(width);
        for _ in 0..width {
            bits.push(value & 1 != 0);
            value >>= 1;
        }
        Self { bits }
    }

    pub fn from_lsb_bits(bits: Vec<bool>) -> Self {
        Self { bits }
    }

    #[inline]
    pub fn zeros(width: usize) -> Self {
        Self {
            bits: vec![false; width],
        }
    }

    #[inline]
    pub fn ones(width: usize) -> Self {
        Self {
            bits: vec![true; width],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.bits.len()
    }

    pub fn bit(&self, i: usize) -> bool {
        self.bits[i]
    }

    /// Iterates from the least significant bit.
    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }

    pub fn to_literal(&self) -> String {
        self.bits
            .iter()
            .rev()
            .map(|&b| if b { '1' } else { '0' })
            .collect()
    }
}

impl Display for BitSignal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_literal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msb_first_round_trip() {
        let signal = BitSignal::parse("1011", Operand::Address).unwrap();
        assert_eq!(signal.width(), 4);
        assert!(signal.bit(3));
        assert!(!signal.bit(2));
        assert!(signal.bit(1));
        assert!(signal.bit(0));
        assert_eq!(signal.to_literal(), "1011");
        assert_eq!(signal, BitSignal::from_u64(0b1011, 4));
    }

    #[test]
    fn test_non_binary_rejected_before_width() {
        for width in 0..6 {
            let err = BitSignal::parse_with_width("102", width, Operand::Address).unwrap_err();
            assert!(matches!(
                err,
                CharzError::NonBinaryLiteral {
                    operand: Operand::Address,
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_width_mismatch() {
        let err = BitSignal::parse_with_width("10", 4, Operand::Data).unwrap_err();
        assert!(matches!(
            err,
            CharzError::MalformedOperand {
                operand: Operand::Data,
                expected: 4,
                actual: 2,
            }
        ));
    }
}
