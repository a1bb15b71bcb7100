// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The adaptive entropy decoder.
//!
//! Residuals are coded against three running "median" estimators per channel
//! that partition the value range into geometrically growing intervals. A
//! unary prefix selects the interval, a near-minimal binary code refines the
//! position inside it, and a trailing bit carries the sign. Runs of zero
//! samples get a dedicated Elias-style run length code. In hybrid mode the
//! refinement stops early once the interval shrinks below the feedback
//! controlled error limit, which is what bounds the bitrate.

use symphonia_core::errors::{decode_error, Result};
use symphonia_core::io::MediaSourceStream;

use super::bitstream::Bitstream;
use crate::reader::{FALSE_STEREO, HYBRID_BALANCE, HYBRID_BITRATE, HYBRID_FLAG, MONO_FLAG};

/// Maximum consecutive 1s sent for "div" data before an escape is coded.
const LIMIT_ONES: u32 = 16;

// Time constant of the slow level estimate used by hybrid bitrate mode.
const SLS: i32 = 8;
const SLO: i32 = 1 << (SLS - 1);

// Time constants of the three median level breakpoints.
const DIV0: i32 = 128; // 5/7 of samples
const DIV1: i32 = 64; // 10/49 of samples
const DIV2: i32 = 32; // 20/343 of samples

/// Bit length of `index + 1`.
const NBITS_TABLE: [u8; 256] = [
    0, 1, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 4, 4, 4, 4, // 0 - 15
    5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, // 16 - 31
    6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, // 32 - 47
    6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, 6, // 48 - 63
    7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, // 64 - 79
    7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, // 80 - 95
    7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, // 96 - 111
    7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, // 112 - 127
    8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, // 128 - 143
    8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, // 144 - 159
    8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, // 160 - 175
    8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, // 176 - 191
    8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, // 192 - 207
    8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, // 208 - 223
    8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, // 224 - 239
    8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, // 240 - 255
];

/// Fractional log2 with an 8-bit mantissa.
const LOG2_TABLE: [u8; 256] = [
    0x00, 0x01, 0x03, 0x04, 0x06, 0x07, 0x09, 0x0a, 0x0b, 0x0d, 0x0e, 0x10, 0x11, 0x12, 0x14,
    0x15, 0x16, 0x18, 0x19, 0x1a, 0x1c, 0x1d, 0x1e, 0x20, 0x21, 0x22, 0x24, 0x25, 0x26, 0x28,
    0x29, 0x2a, 0x2c, 0x2d, 0x2e, 0x2f, 0x31, 0x32, 0x33, 0x34, 0x36, 0x37, 0x38, 0x39, 0x3b,
    0x3c, 0x3d, 0x3e, 0x3f, 0x41, 0x42, 0x43, 0x44, 0x45, 0x47, 0x48, 0x49, 0x4a, 0x4b, 0x4d,
    0x4e, 0x4f, 0x50, 0x51, 0x52, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x5c, 0x5d, 0x5e,
    0x5f, 0x60, 0x61, 0x62, 0x63, 0x64, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x6b, 0x6c, 0x6d, 0x6e,
    0x6f, 0x70, 0x71, 0x72, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x7b, 0x7c, 0x7d, 0x7e,
    0x7f, 0x80, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, 0x8a, 0x8b, 0x8c, 0x8d,
    0x8e, 0x8f, 0x90, 0x91, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9a, 0x9b, 0x9b,
    0x9c, 0x9d, 0x9e, 0x9f, 0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa7, 0xa8, 0xa9, 0xa9,
    0xaa, 0xab, 0xac, 0xad, 0xae, 0xaf, 0xb0, 0xb1, 0xb2, 0xb2, 0xb3, 0xb4, 0xb5, 0xb6, 0xb7,
    0xb8, 0xb9, 0xb9, 0xba, 0xbb, 0xbc, 0xbd, 0xbe, 0xbf, 0xc0, 0xc0, 0xc1, 0xc2, 0xc3, 0xc4,
    0xc5, 0xc6, 0xc6, 0xc7, 0xc8, 0xc9, 0xca, 0xcb, 0xcb, 0xcc, 0xcd, 0xce, 0xcf, 0xd0, 0xd0,
    0xd1, 0xd2, 0xd3, 0xd4, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8, 0xd8, 0xd9, 0xda, 0xdb, 0xdc, 0xdc,
    0xdd, 0xde, 0xdf, 0xe0, 0xe0, 0xe1, 0xe2, 0xe3, 0xe4, 0xe4, 0xe5, 0xe6, 0xe7, 0xe7, 0xe8,
    0xe9, 0xea, 0xea, 0xeb, 0xec, 0xed, 0xee, 0xee, 0xef, 0xf0, 0xf1, 0xf1, 0xf2, 0xf3, 0xf4,
    0xf4, 0xf5, 0xf6, 0xf7, 0xf7, 0xf8, 0xf9, 0xf9, 0xfa, 0xfb, 0xfc, 0xfc, 0xfd, 0xfe, 0xff,
    0xff,
];

/// Inverse of `LOG2_TABLE`.
const EXP2_TABLE: [u8; 256] = [
    0x00, 0x01, 0x01, 0x02, 0x03, 0x03, 0x04, 0x05, 0x06, 0x06, 0x07, 0x08, 0x08, 0x09, 0x0a,
    0x0b, 0x0b, 0x0c, 0x0d, 0x0e, 0x0e, 0x0f, 0x10, 0x10, 0x11, 0x12, 0x13, 0x13, 0x14, 0x15,
    0x16, 0x16, 0x17, 0x18, 0x19, 0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1d, 0x1e, 0x1f, 0x20, 0x20,
    0x21, 0x22, 0x23, 0x24, 0x24, 0x25, 0x26, 0x27, 0x28, 0x28, 0x29, 0x2a, 0x2b, 0x2c, 0x2c,
    0x2d, 0x2e, 0x2f, 0x30, 0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x35, 0x36, 0x37, 0x38, 0x39,
    0x3a, 0x3a, 0x3b, 0x3c, 0x3d, 0x3e, 0x3f, 0x40, 0x41, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46,
    0x47, 0x48, 0x48, 0x49, 0x4a, 0x4b, 0x4c, 0x4d, 0x4e, 0x4f, 0x50, 0x51, 0x51, 0x52, 0x53,
    0x54, 0x55, 0x56, 0x57, 0x58, 0x59, 0x5a, 0x5b, 0x5c, 0x5d, 0x5e, 0x5e, 0x5f, 0x60, 0x61,
    0x62, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, 0x6a, 0x6b, 0x6c, 0x6d, 0x6e, 0x6f, 0x70,
    0x71, 0x72, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, 0x7a, 0x7b, 0x7c, 0x7d, 0x7e, 0x7f,
    0x80, 0x81, 0x82, 0x83, 0x84, 0x85, 0x87, 0x88, 0x89, 0x8a, 0x8b, 0x8c, 0x8d, 0x8e, 0x8f,
    0x90, 0x91, 0x92, 0x93, 0x95, 0x96, 0x97, 0x98, 0x99, 0x9a, 0x9b, 0x9c, 0x9d, 0x9f, 0xa0,
    0xa1, 0xa2, 0xa3, 0xa4, 0xa5, 0xa6, 0xa8, 0xa9, 0xaa, 0xab, 0xac, 0xad, 0xaf, 0xb0, 0xb1,
    0xb2, 0xb3, 0xb4, 0xb6, 0xb7, 0xb8, 0xb9, 0xba, 0xbc, 0xbd, 0xbe, 0xbf, 0xc0, 0xc2, 0xc3,
    0xc4, 0xc5, 0xc6, 0xc8, 0xc9, 0xca, 0xcb, 0xcd, 0xce, 0xcf, 0xd0, 0xd2, 0xd3, 0xd4, 0xd6,
    0xd7, 0xd8, 0xd9, 0xdb, 0xdc, 0xdd, 0xde, 0xe0, 0xe1, 0xe2, 0xe4, 0xe5, 0xe6, 0xe8, 0xe9,
    0xea, 0xec, 0xed, 0xee, 0xf0, 0xf1, 0xf2, 0xf4, 0xf5, 0xf6, 0xf8, 0xf9, 0xfa, 0xfc, 0xfd,
    0xff,
];

/// Position of the first 0 bit in an 8-bit value, LSB first.
const ONES_COUNT_TABLE: [u8; 256] = [
    0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2, 0, 1, 0, 4, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2, 0, 1, 0,
    5, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2, 0, 1, 0, 4, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2, 0, 1,
    0, 6, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2, 0, 1, 0, 4, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2, 0,
    1, 0, 5, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2, 0, 1, 0, 4, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2,
    0, 1, 0, 7, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2, 0, 1, 0, 4, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0,
    2, 0, 1, 0, 5, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2, 0, 1, 0, 4, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1,
    0, 2, 0, 1, 0, 6, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2, 0, 1, 0, 4, 0, 1, 0, 2, 0, 1, 0, 3, 0,
    1, 0, 2, 0, 1, 0, 5, 0, 1, 0, 2, 0, 1, 0, 3, 0, 1, 0, 2, 0, 1, 0, 4, 0, 1, 0, 2, 0, 1, 0, 3,
    0, 1, 0, 2, 0, 1, 0, 8,
];

/// Per-channel entropy coder state.
#[derive(Clone, Copy, Default)]
pub struct EntropyChannel {
    pub median: [i32; 3],
    pub slow_level: i32,
    pub error_limit: i32,
}

/// Shared entropy coder state for the block.
#[derive(Clone, Copy, Default)]
pub struct WordsState {
    pub c: [EntropyChannel; 2],
    pub bitrate_acc: [u32; 2],
    pub bitrate_delta: [i32; 2],
    pub holding_one: u32,
    pub holding_zero: bool,
    pub zeros_acc: u32,
}

impl WordsState {
    /// Rebuild the entropy state from an entropy-variables sub-block: three
    /// log2-coded medians per active channel.
    pub fn read_entropy_vars(&mut self, data: &[u8], flags: u32) -> Result<()> {
        let mono = flags & (MONO_FLAG | FALSE_STEREO) != 0;

        if data.len() < 6 || (!mono && data.len() != 12) {
            return decode_error("wavpack: invalid entropy variables");
        }

        let median = |i: usize| exp2s(i32::from(data[i]) + (i32::from(data[i + 1]) << 8));

        *self = WordsState::default();
        self.c[0].median = [median(0), median(2), median(4)];
        if !mono {
            self.c[1].median = [median(6), median(8), median(10)];
        }

        Ok(())
    }

    /// Read the hybrid-profile sub-block: slow levels (bitrate mode only),
    /// bitrate accumulators, and optional bitrate deltas.
    pub fn read_hybrid_profile(&mut self, data: &[u8], flags: u32) -> Result<()> {
        let mono = flags & (MONO_FLAG | FALSE_STEREO) != 0;
        let mut pos = 0;

        let get_u16 = |pos: &mut usize| -> Result<i32> {
            if *pos + 2 > data.len() {
                return decode_error("wavpack: invalid hybrid profile");
            }
            let value = i32::from(data[*pos]) + (i32::from(data[*pos + 1]) << 8);
            *pos += 2;
            Ok(value)
        };

        if flags & HYBRID_BITRATE != 0 {
            self.c[0].slow_level = exp2s(get_u16(&mut pos)?);
            if !mono {
                self.c[1].slow_level = exp2s(get_u16(&mut pos)?);
            }
        }

        self.bitrate_acc[0] = (get_u16(&mut pos)? as u32) << 16;
        if !mono {
            self.bitrate_acc[1] = (get_u16(&mut pos)? as u32) << 16;
        }

        if pos < data.len() {
            self.bitrate_delta[0] = exp2s(get_u16(&mut pos)?);
            if !mono {
                self.bitrate_delta[1] = exp2s(get_u16(&mut pos)?);
            }
            if pos < data.len() {
                return decode_error("wavpack: invalid hybrid profile");
            }
        }
        else {
            self.bitrate_delta[0] = 0;
            self.bitrate_delta[1] = 0;
        }

        Ok(())
    }
}

/// Decode up to `nsamples` complete samples worth of residuals into `buffer`
/// (interleaved for stereo). Returns the number of complete samples actually
/// produced, which is short only when the bitstream ran out.
pub fn get_words(
    w: &mut WordsState,
    bs: &mut Bitstream,
    source: &mut MediaSourceStream,
    flags: u32,
    buffer: &mut [i32],
    nsamples: usize,
) -> usize {
    let mono = flags & (MONO_FLAG | FALSE_STEREO) != 0;
    let total = if mono { nsamples } else { nsamples * 2 };

    let mut entidx = if mono { 0 } else { 1 };
    let mut written = 0;

    for csample in 0..total {
        if !mono {
            entidx = 1 - entidx;
        }

        // Fast path for runs of zero samples: once every median has decayed
        // to zero the encoder switches to run-length coding.
        if w.c[0].median[0] & !1 == 0
            && !w.holding_zero
            && w.holding_one == 0
            && w.c[1].median[0] & !1 == 0
        {
            if w.zeros_acc > 0 {
                w.zeros_acc -= 1;
                if w.zeros_acc > 0 {
                    let sl = w.c[entidx].slow_level;
                    w.c[entidx].slow_level = sl - ((sl + SLO) >> SLS);
                    buffer[written] = 0;
                    written += 1;
                    continue;
                }
            }
            else {
                let mut cbits = 0u32;
                while cbits < 33 && bs.getbit(source) == 1 {
                    cbits += 1;
                }
                if cbits == 33 {
                    break;
                }

                if cbits < 2 {
                    w.zeros_acc = cbits;
                }
                else {
                    // An Elias-style tail: cbits - 1 low bits plus the
                    // implicit top bit.
                    cbits -= 1;
                    let mut mask = 1u32;
                    w.zeros_acc = 0;
                    while cbits > 0 {
                        if bs.getbit(source) == 1 {
                            w.zeros_acc |= mask;
                        }
                        mask <<= 1;
                        cbits -= 1;
                    }
                    w.zeros_acc |= mask;
                }

                if w.zeros_acc > 0 {
                    let sl = w.c[entidx].slow_level;
                    w.c[entidx].slow_level = sl - ((sl + SLO) >> SLS);
                    w.c[0].median = [0; 3];
                    w.c[1].median = [0; 3];
                    buffer[written] = 0;
                    written += 1;
                    continue;
                }
            }
        }

        let mut ones_count;

        if w.holding_zero {
            ones_count = 0;
            w.holding_zero = false;
        }
        else {
            let next8 = bs.peek_byte(source);

            if next8 == 0xff {
                bs.skip_bits(8);
                ones_count = 8;
                while ones_count < LIMIT_ONES + 1 && bs.getbit(source) == 1 {
                    ones_count += 1;
                }
                if ones_count == LIMIT_ONES + 1 {
                    break;
                }
                if ones_count == LIMIT_ONES {
                    let mut cbits = 0u32;
                    while cbits < 33 && bs.getbit(source) == 1 {
                        cbits += 1;
                    }
                    if cbits == 33 {
                        break;
                    }

                    if cbits < 2 {
                        ones_count = cbits;
                    }
                    else {
                        cbits -= 1;
                        let mut mask = 1u32;
                        ones_count = 0;
                        while cbits > 0 {
                            if bs.getbit(source) == 1 {
                                ones_count |= mask;
                            }
                            mask <<= 1;
                            cbits -= 1;
                        }
                        ones_count |= mask;
                    }

                    ones_count += LIMIT_ONES;
                }
            }
            else {
                ones_count = u32::from(ONES_COUNT_TABLE[next8 as usize]);
                bs.skip_bits(ones_count + 1);
            }

            // Consecutive unary prefixes share their terminator: odd counts
            // leave a 1 pending, even counts a 0.
            if w.holding_one != 0 {
                w.holding_one = ones_count & 1;
                ones_count = (ones_count >> 1) + 1;
            }
            else {
                w.holding_one = ones_count & 1;
                ones_count >>= 1;
            }

            w.holding_zero = !w.holding_one & 1 != 0;
        }

        if flags & HYBRID_FLAG != 0 && (mono || csample & 1 == 0) {
            update_error_limit(w, flags);
        }

        let mut low;
        let mut high;
        {
            let c = &mut w.c[entidx];

            if ones_count == 0 {
                low = 0;
                high = c.median[0] >> 4;
                c.median[0] -= ((c.median[0] + (DIV0 - 2)) / DIV0) * 2;
            }
            else {
                low = (c.median[0] >> 4) + 1;
                c.median[0] = c.median[0].wrapping_add(((c.median[0] + DIV0) / DIV0) * 5);

                if ones_count == 1 {
                    high = low + (c.median[1] >> 4);
                    c.median[1] -= ((c.median[1] + (DIV1 - 2)) / DIV1) * 2;
                }
                else {
                    low += (c.median[1] >> 4) + 1;
                    c.median[1] = c.median[1].wrapping_add(((c.median[1] + DIV1) / DIV1) * 5);

                    if ones_count == 2 {
                        high = low + (c.median[2] >> 4);
                        c.median[2] -= ((c.median[2] + (DIV2 - 2)) / DIV2) * 2;
                    }
                    else {
                        low = low.wrapping_add(
                            (ones_count as i32 - 2).wrapping_mul((c.median[2] >> 4) + 1),
                        );
                        high = low.wrapping_add(c.median[2] >> 4);
                        c.median[2] = c.median[2].wrapping_add(((c.median[2] + DIV2) / DIV2) * 5);
                    }
                }
            }
        }

        let mut mid = (high.wrapping_add(low) + 1) >> 1;

        if w.c[entidx].error_limit == 0 {
            // Lossless: the binary code pins down the residual exactly.
            mid = low.wrapping_add(read_code(bs, source, high.wrapping_sub(low) as u32) as i32);
        }
        else {
            // Hybrid: binary-search the interval until it is within the
            // permitted error.
            while high.wrapping_sub(low) > w.c[entidx].error_limit {
                if bs.getbit(source) == 1 {
                    low = mid;
                }
                else {
                    high = mid - 1;
                }
                mid = (high.wrapping_add(low) + 1) >> 1;
            }
        }

        buffer[written] = if bs.getbit(source) == 1 { !mid } else { mid };
        written += 1;

        if flags & HYBRID_BITRATE != 0 {
            let c = &mut w.c[entidx];
            c.slow_level = c.slow_level - ((c.slow_level + SLO) >> SLS) + log2_u32(mid as u32);
        }
    }

    if mono {
        written
    }
    else {
        written / 2
    }
}

/// Advance the bitrate accumulators and recompute each channel's maximum
/// permitted residual error. In bitrate mode the limit follows the slow level
/// estimate; in balance mode the two channel bitrates are additionally traded
/// against each other.
fn update_error_limit(w: &mut WordsState, flags: u32) {
    w.bitrate_acc[0] = w.bitrate_acc[0].wrapping_add(w.bitrate_delta[0] as u32);
    let mut bitrate_0 = (w.bitrate_acc[0] >> 16) as i32;

    if flags & (MONO_FLAG | FALSE_STEREO) != 0 {
        if flags & HYBRID_BITRATE != 0 {
            let slow_log_0 = (w.c[0].slow_level + SLO) >> SLS;
            w.c[0].error_limit = if slow_log_0 - bitrate_0 > -0x100 {
                exp2s(slow_log_0 - bitrate_0 + 0x100)
            }
            else {
                0
            };
        }
        else {
            w.c[0].error_limit = exp2s(bitrate_0);
        }
    }
    else {
        w.bitrate_acc[1] = w.bitrate_acc[1].wrapping_add(w.bitrate_delta[1] as u32);
        let mut bitrate_1 = (w.bitrate_acc[1] >> 16) as i32;

        if flags & HYBRID_BITRATE != 0 {
            let slow_log_0 = (w.c[0].slow_level + SLO) >> SLS;
            let slow_log_1 = (w.c[1].slow_level + SLO) >> SLS;

            if flags & HYBRID_BALANCE != 0 {
                let balance = (slow_log_1 - slow_log_0 + bitrate_1 + 1) >> 1;

                if balance > bitrate_0 {
                    bitrate_1 = bitrate_0 * 2;
                    bitrate_0 = 0;
                }
                else if -balance > bitrate_0 {
                    bitrate_0 *= 2;
                    bitrate_1 = 0;
                }
                else {
                    bitrate_1 = bitrate_0 + balance;
                    bitrate_0 -= balance;
                }
            }

            w.c[0].error_limit = if slow_log_0 - bitrate_0 > -0x100 {
                exp2s(slow_log_0 - bitrate_0 + 0x100)
            }
            else {
                0
            };
            w.c[1].error_limit = if slow_log_1 - bitrate_1 > -0x100 {
                exp2s(slow_log_1 - bitrate_1 + 0x100)
            }
            else {
                0
            };
        }
        else {
            w.c[0].error_limit = exp2s(bitrate_0);
            w.c[1].error_limit = exp2s(bitrate_1);
        }
    }
}

/// Number of bits needed to represent `value`.
pub fn count_bits(value: u32) -> u32 {
    if value < 1 << 8 {
        u32::from(NBITS_TABLE[value as usize])
    }
    else if value < 1 << 16 {
        u32::from(NBITS_TABLE[(value >> 8) as usize]) + 8
    }
    else if value < 1 << 24 {
        u32::from(NBITS_TABLE[(value >> 16) as usize]) + 16
    }
    else {
        u32::from(NBITS_TABLE[(value >> 24) as usize]) + 24
    }
}

/// Read a single unsigned value in the range `0..=maxcode`. When the range is
/// not a power of two, the shorter codes cover the low values and one extra
/// bit disambiguates the rest.
fn read_code(bs: &mut Bitstream, source: &mut MediaSourceStream, maxcode: u32) -> u32 {
    let bitcount = count_bits(maxcode);
    if bitcount == 0 {
        return 0;
    }

    let extras = ((1u64 << bitcount) - u64::from(maxcode) - 1) as u32;

    let mut code = bs.getbits(bitcount - 1, source) & ((1 << (bitcount - 1)) - 1);

    if code >= extras {
        code = (code << 1) - extras + bs.getbit(source);
    }

    code
}

/// Log2 of a 32-bit unsigned value with 8 bits of fractional precision.
/// The maximum useful input is about 0xff800000, which maps to 8447.
fn log2_u32(avalue: u32) -> i32 {
    let av = avalue.wrapping_add(avalue >> 9);

    if av < 1 << 8 {
        let dbits = i32::from(NBITS_TABLE[av as usize]);
        (dbits << 8) + i32::from(LOG2_TABLE[((av << (9 - dbits)) & 0xff) as usize])
    }
    else {
        let dbits = if av < 1 << 16 {
            i32::from(NBITS_TABLE[(av >> 8) as usize]) + 8
        }
        else if av < 1 << 24 {
            i32::from(NBITS_TABLE[(av >> 16) as usize]) + 16
        }
        else {
            i32::from(NBITS_TABLE[(av >> 24) as usize]) + 24
        };
        (dbits << 8) + i32::from(LOG2_TABLE[((av >> (dbits - 9)) & 0xff) as usize])
    }
}

/// Signed log2. Not a strict logarithm: it is linear around zero so that zero
/// and negative values are representable. Results are within +/-8192.
pub fn log2s(value: i32) -> i32 {
    if value < 0 {
        -log2_u32(value.wrapping_neg() as u32)
    }
    else {
        log2_u32(value as u32)
    }
}

/// Inverse of [`log2s`]: rebuild the value represented by a signed 8-bit
/// precision logarithm. Valid inputs range from -8192 to +8447.
pub fn exp2s(log: i32) -> i32 {
    if log < 0 {
        return -exp2s(-log);
    }

    let value = i32::from(EXP2_TABLE[(log & 0xff) as usize]) | 0x100;

    if log >> 8 <= 9 {
        value >> (9 - (log >> 8))
    }
    else {
        value.wrapping_shl((log >> 8) as u32 - 9)
    }
}
