use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest addressable GDAC bit (bits 0-7 fine, 8-15 coarse).
pub const MAX_GDAC_BIT: u8 = 15;

/// Global threshold (GDAC) setting split into the coarse and fine registers
/// (Vthin_AltCoarse / Vthin_AltFine).
///
/// Values are never modified in place; each trial derives a new candidate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TuningRegisterValue {
    pub coarse: u8,
    pub fine: u8,
}

impl TuningRegisterValue {
    pub const ZERO: TuningRegisterValue = TuningRegisterValue { coarse: 0, fine: 0 };

    pub fn new(coarse: u8, fine: u8) -> Self {
        Self { coarse, fine }
    }

    pub fn from_combined(value: u16) -> Self {
        Self {
            coarse: (value >> 8) as u8,
            fine: (value & 0xFF) as u8,
        }
    }

    /// Scan parameter value: `coarse << 8 | fine`.
    pub fn combined(&self) -> u16 {
        (self.coarse as u16) << 8 | self.fine as u16
    }

    pub fn bit(&self, bit: u8) -> bool {
        bit <= MAX_GDAC_BIT && self.combined() & (1 << bit) != 0
    }

    /// Candidate with `bit` set or cleared. Bits above [`MAX_GDAC_BIT`] are ignored.
    #[must_use]
    pub fn with_bit(self, bit: u8, on: bool) -> Self {
        if bit > MAX_GDAC_BIT {
            return self;
        }
        let mask = 1u16 << bit;
        let value = if on {
            self.combined() | mask
        } else {
            self.combined() & !mask
        };
        Self::from_combined(value)
    }

    /// The search ran into the register's lower bound or the fine field's top.
    pub fn is_saturated(&self) -> bool {
        (self.coarse == 0 && self.fine == 0) || self.fine >= 254
    }
}

impl fmt::Display for TuningRegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.coarse, self.fine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_above_seven_address_the_coarse_field() {
        let value = TuningRegisterValue::ZERO.with_bit(9, true).with_bit(3, true);
        assert_eq!(value, TuningRegisterValue::new(0b10, 0b1000));
        assert_eq!(value.combined(), 0x0208);
        assert!(value.bit(9));
        assert!(!value.with_bit(9, false).bit(9));
    }

    #[test]
    fn saturation_limits() {
        assert!(TuningRegisterValue::ZERO.is_saturated());
        assert!(TuningRegisterValue::new(1, 254).is_saturated());
        assert!(!TuningRegisterValue::new(1, 0).is_saturated());
        assert!(!TuningRegisterValue::new(0, 140).is_saturated());
    }
}
