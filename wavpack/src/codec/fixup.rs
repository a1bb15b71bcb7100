// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Final per-block sample conversions: float reassembly, extended integer
//! reconstruction, hybrid clipping and the stored left shift.

use symphonia_core::errors::{decode_error, Result};

use crate::reader::{BYTES_STORED, FLOAT_DATA, HYBRID_FLAG, INT32_DATA, MONO_FLAG, SHIFT_LSB, SHIFT_MASK};

// Float information flags. Only the presence of the "sent" style bits matters
// to this decoder: it does not reconstruct them and instead marks the stream
// lossy.
pub const FLOAT_SHIFT_ONES: u8 = 0x01; // bits left-shifted into float = '1'
pub const FLOAT_SHIFT_SAME: u8 = 0x02; // bits left-shifted into float are the same
pub const FLOAT_SHIFT_SENT: u8 = 0x04; // bits shifted into float are sent literally
pub const FLOAT_ZEROS_SENT: u8 = 0x08; // "zeros" are not all real zeros
pub const FLOAT_NEG_ZEROS: u8 = 0x10; // contains negative zeros
pub const FLOAT_EXCEPTIONS: u8 = 0x20; // contains exceptions (inf, nan, etc.)

/// Side information for 32-bit IEEE float blocks.
#[derive(Clone, Copy, Debug, Default)]
pub struct FloatInfo {
    pub flags: u8,
    pub shift: u8,
    pub max_exp: u8,
    pub norm_exp: u8,
}

impl FloatInfo {
    /// True when the block used a float coding mode this decoder cannot
    /// reproduce exactly.
    pub fn is_lossy(&self) -> bool {
        self.flags & (FLOAT_EXCEPTIONS | FLOAT_ZEROS_SENT | FLOAT_SHIFT_SENT | FLOAT_SHIFT_SAME)
            != 0
    }
}

pub fn read_float_info(data: &[u8]) -> Result<FloatInfo> {
    if data.len() != 4 {
        return decode_error("wavpack: invalid float info");
    }
    Ok(FloatInfo { flags: data[0], shift: data[1], max_exp: data[2], norm_exp: data[3] })
}

/// Side information for extended (more than 24 significant bits) integer
/// blocks: counts of redundant low bits removed by the encoder.
#[derive(Clone, Copy, Debug, Default)]
pub struct Int32Info {
    pub sent_bits: u8,
    pub zeros: u8,
    pub ones: u8,
    pub dups: u8,
}

impl Int32Info {
    pub fn total_bits(&self) -> u32 {
        u32::from(self.sent_bits) + u32::from(self.zeros) + u32::from(self.ones)
            + u32::from(self.dups)
    }
}

pub fn read_int32_info(data: &[u8]) -> Result<Int32Info> {
    if data.len() != 4 {
        return decode_error("wavpack: invalid int32 info");
    }
    Ok(Int32Info { sent_bits: data[0], zeros: data[1], ones: data[2], dups: data[3] })
}

/// Left shift that saturates sanely instead of wrapping when a corrupt
/// side-info sum pushes the count past the word size.
#[inline]
fn shl(value: i32, shift: u32) -> i32 {
    if shift < 32 {
        value.wrapping_shl(shift)
    }
    else {
        0
    }
}

#[inline]
fn shr(value: i32, shift: u32) -> i32 {
    value >> shift.min(31)
}

/// Restore float samples to 24-bit integer range by undoing the encoder's
/// exponent normalization, clipping to +/-2^23.
fn float_values(float: &FloatInfo, values: &mut [i32]) {
    let shift = (i32::from(float.max_exp) - i32::from(float.norm_exp) + i32::from(float.shift))
        .max(-32)
        .min(32);

    for value in values.iter_mut() {
        let wide = if shift > 0 {
            i64::from(*value) << shift
        }
        else {
            i64::from(*value) >> -shift
        };

        *value = wide.max(-8_388_608).min(8_388_607) as i32;
    }
}

/// Apply the final conversions to `sample_count` decoded samples. The order
/// matters: float reassembly, then extended-int reconstruction, then either
/// the hybrid clip-and-shift or the plain lossless shift.
pub fn fixup_samples(
    flags: u32,
    int32: &Int32Info,
    float: &FloatInfo,
    buffer: &mut [i32],
    sample_count: usize,
) {
    let mut shift = (flags & SHIFT_MASK) >> SHIFT_LSB;

    let count = if flags & MONO_FLAG != 0 { sample_count } else { sample_count * 2 };

    if flags & FLOAT_DATA != 0 {
        float_values(float, &mut buffer[..count]);
    }

    if flags & INT32_DATA != 0 {
        let zeros = u32::from(int32.zeros);
        let ones = u32::from(int32.ones);
        let dups = u32::from(int32.dups);

        if flags & HYBRID_FLAG == 0 && int32.sent_bits == 0 && zeros + ones + dups != 0 {
            for value in buffer[..count].iter_mut() {
                if zeros != 0 {
                    *value = shl(*value, zeros);
                }
                else if ones != 0 {
                    *value = shl(value.wrapping_add(1), ones).wrapping_sub(1);
                }
                else if dups != 0 {
                    let lsb = *value & 1;
                    *value = shl(value.wrapping_add(lsb), dups).wrapping_sub(lsb);
                }
            }
        }
        else {
            shift += int32.total_bits();
        }
    }

    if flags & HYBRID_FLAG != 0 {
        // Lossy data is clipped to the range of the stored sample width
        // before shifting. Four-byte samples span the full 32-bit range, so
        // no clipping applies there.
        let (min_value, max_value) = match flags & BYTES_STORED {
            0 => (-0x80, 0x7f),
            1 => (-0x8000, 0x7fff),
            2 => (-0x80_0000, 0x7f_ffff),
            _ => (i32::MIN, i32::MAX),
        };

        let min_shifted = shl(shr(min_value, shift), shift);
        let max_shifted = shl(shr(max_value, shift), shift);

        for value in buffer[..count].iter_mut() {
            if *value < min_value {
                *value = min_shifted;
            }
            else if *value > max_value {
                *value = max_shifted;
            }
            else {
                *value = shl(*value, shift);
            }
        }
    }
    else if shift != 0 {
        for value in buffer[..count].iter_mut() {
            *value = shl(*value, shift);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_float_shift_and_clip() {
        let float = FloatInfo { flags: 0, shift: 0, max_exp: 140, norm_exp: 126 };
        // Effective shift of 14 bits.
        let mut values = [1, -2, 1000, -1000];
        float_values(&float, &mut values);
        assert_eq!(values, [16384, -32768, 8_388_607, -8_388_608]);
    }

    #[test]
    fn verify_float_negative_shift() {
        let float = FloatInfo { flags: 0, shift: 0, max_exp: 120, norm_exp: 126 };
        let mut values = [640, -640];
        float_values(&float, &mut values);
        assert_eq!(values, [10, -10]);
    }

    #[test]
    fn verify_int32_zeros() {
        let int32 = Int32Info { zeros: 4, ..Default::default() };
        let mut buffer = [1i32, -3];
        fixup_samples(INT32_DATA | MONO_FLAG, &int32, &FloatInfo::default(), &mut buffer, 2);
        assert_eq!(buffer, [16, -48]);
    }

    #[test]
    fn verify_int32_ones() {
        let int32 = Int32Info { ones: 3, ..Default::default() };
        let mut buffer = [2i32, -1];
        fixup_samples(INT32_DATA | MONO_FLAG, &int32, &FloatInfo::default(), &mut buffer, 2);
        // (x + 1) << 3 - 1
        assert_eq!(buffer, [23, -1]);
    }

    #[test]
    fn verify_int32_dups() {
        let int32 = Int32Info { dups: 2, ..Default::default() };
        let mut buffer = [5i32, 4];
        fixup_samples(INT32_DATA | MONO_FLAG, &int32, &FloatInfo::default(), &mut buffer, 2);
        // Odd: (x + 1) << 2 - 1. Even: x << 2.
        assert_eq!(buffer, [23, 16]);
    }

    #[test]
    fn verify_int32_sent_bits_adds_to_shift() {
        // With sent_bits the low bits are gone for good: the counts fold into
        // the final shift instead.
        let int32 = Int32Info { sent_bits: 2, zeros: 3, ..Default::default() };
        let mut buffer = [1i32];
        fixup_samples(INT32_DATA | MONO_FLAG, &int32, &FloatInfo::default(), &mut buffer, 1);
        assert_eq!(buffer, [32]);
    }

    #[test]
    fn verify_hybrid_clip_16_bit() {
        let mut buffer = [40_000i32, -40_000, 100, -100];
        fixup_samples(
            HYBRID_FLAG | MONO_FLAG | 1, // BYTES_STORED = 1 -> 16-bit
            &Int32Info::default(),
            &FloatInfo::default(),
            &mut buffer,
            4,
        );
        assert_eq!(buffer, [32767, -32768, 100, -100]);
    }

    #[test]
    fn verify_hybrid_clip_with_shift() {
        // 8-bit samples, shift 2: out-of-range samples land on the shifted
        // clip bounds (127 >> 2) << 2 = 124 and -128, in-range samples are
        // shifted.
        let mut buffer = [200i32, -200, 3];
        fixup_samples(
            HYBRID_FLAG | MONO_FLAG | (2 << SHIFT_LSB),
            &Int32Info::default(),
            &FloatInfo::default(),
            &mut buffer,
            3,
        );
        assert_eq!(buffer, [124, -128, 12]);
    }

    #[test]
    fn verify_lossless_shift() {
        let mut buffer = [1i32, -1, 0, 5];
        fixup_samples(
            MONO_FLAG | (3 << SHIFT_LSB),
            &Int32Info::default(),
            &FloatInfo::default(),
            &mut buffer,
            4,
        );
        assert_eq!(buffer, [8, -8, 0, 40]);
    }

    #[test]
    fn verify_stereo_count_covers_both_channels() {
        let mut buffer = [1i32, 2, 3, 4];
        fixup_samples(
            1 << SHIFT_LSB,
            &Int32Info::default(),
            &FloatInfo::default(),
            &mut buffer,
            2,
        );
        assert_eq!(buffer, [2, 4, 6, 8]);
    }
}
