//! Storable calibration record for one analog channel.
//!
//! The record is encoded field by field into a fixed 5 byte layout, so the stored format doesn't depend on how the
//! compiler lays out the struct:
//!
//! | byte | content                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | flags: bit 0 `active`, bit 1 `invert`, bits 2..7 reserved |
//! | 1..2 | `raw_min`, little endian                                  |
//! | 3..4 | `raw_max`, little endian                                  |
//!
//! Where the bytes are kept is up to the firmware. This crate only defines the record, the pedal firmware doesn't store
//! one yet and recalibrates from the foot switch instead.

use crate::analog_channel::ADC_MAX;

/// The number of bytes in an encoded record.
pub const ENCODED_LEN: usize = 5;

const FLAG_ACTIVE: u8 = 1 << 0;
const FLAG_INVERT: u8 = 1 << 1;
const RESERVED_FLAGS: u8 = !(FLAG_ACTIVE | FLAG_INVERT);

/// Calibration bounds and response flags of one analog channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    pub raw_min: u16,
    pub raw_max: u16,
    pub invert: bool,
    pub active: bool,
}

/// Reasons a stored record is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Fewer than `ENCODED_LEN` bytes were given
    Truncated,

    /// A reserved flag bit is set, erased flash reads like this
    ReservedBits,

    /// A bound is above the largest ADC reading
    OutOfRange,

    /// `raw_min` is above `raw_max`
    Inverted,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            raw_min: 0,
            raw_max: ADC_MAX,
            invert: false,
            active: true,
        }
    }
}

impl ChannelConfig {
    /// `cfg.encode()` is the record in its stored byte layout.
    pub fn encode(&self) -> [u8; ENCODED_LEN] {
        let mut flags = 0;
        if self.active {
            flags |= FLAG_ACTIVE;
        }
        if self.invert {
            flags |= FLAG_INVERT;
        }

        let [min_lo, min_hi] = self.raw_min.to_le_bytes();
        let [max_lo, max_hi] = self.raw_max.to_le_bytes();

        [flags, min_lo, min_hi, max_lo, max_hi]
    }

    /// `ChannelConfig::decode(b)` is the record stored in the first `ENCODED_LEN` bytes of `b`.
    ///
    /// # Arguments:
    ///
    /// * `bytes` - The stored bytes, anything past `ENCODED_LEN` is ignored
    pub fn decode(bytes: &[u8]) -> Result<Self, ConfigError> {
        let bytes = bytes.get(..ENCODED_LEN).ok_or(ConfigError::Truncated)?;

        let flags = bytes[0];
        if flags & RESERVED_FLAGS != 0 {
            return Err(ConfigError::ReservedBits);
        }

        let raw_min = u16::from_le_bytes([bytes[1], bytes[2]]);
        let raw_max = u16::from_le_bytes([bytes[3], bytes[4]]);
        if raw_min > ADC_MAX || raw_max > ADC_MAX {
            return Err(ConfigError::OutOfRange);
        }
        if raw_min > raw_max {
            return Err(ConfigError::Inverted);
        }

        Ok(Self {
            raw_min,
            raw_max,
            invert: flags & FLAG_INVERT != 0,
            active: flags & FLAG_ACTIVE != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_flags_then_little_endian_bounds() {
        let config = ChannelConfig {
            raw_min: 0x0123,
            raw_max: 0x0ABC,
            invert: true,
            active: false,
        };

        assert_eq!(config.encode(), [0b10, 0x23, 0x01, 0xBC, 0x0A]);
    }

    #[test]
    fn decodes_what_was_encoded() {
        let config = ChannelConfig {
            raw_min: 180,
            raw_max: 3900,
            invert: false,
            active: true,
        };

        assert_eq!(ChannelConfig::decode(&config.encode()), Ok(config));
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let bytes = [0b01, 0x00, 0x00, 0xFF, 0x0F, 0xAA, 0x55];

        assert_eq!(
            ChannelConfig::decode(&bytes),
            Ok(ChannelConfig::default())
        );
    }

    #[test]
    fn short_input_is_truncated() {
        assert_eq!(
            ChannelConfig::decode(&[0b01, 0, 0, 0xFF]),
            Err(ConfigError::Truncated)
        );
    }

    #[test]
    fn erased_flash_is_rejected() {
        assert_eq!(
            ChannelConfig::decode(&[0xFF; ENCODED_LEN]),
            Err(ConfigError::ReservedBits)
        );
    }

    #[test]
    fn bounds_past_the_converter_are_rejected() {
        assert_eq!(
            ChannelConfig::decode(&[0b01, 0x00, 0x00, 0x00, 0x10]),
            Err(ConfigError::OutOfRange)
        );
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        assert_eq!(
            ChannelConfig::decode(&[0b01, 0x00, 0x02, 0x00, 0x01]),
            Err(ConfigError::Inverted)
        );
    }
}
