// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Metadata sub-block framing.
//!
//! A block payload is a sequence of typed sub-blocks: a 1-byte ID, a length
//! in 16-bit words (1 byte, or 3 bytes little-endian when `ID_LARGE` is set),
//! then the data padded to a word boundary. `ID_ODD_SIZE` marks a data length
//! one less than the padded size, and `ID_OPTIONAL_DATA` marks sub-blocks an
//! old decoder may skip without failing the block.

use symphonia_core::errors::{decode_error, Result};
use symphonia_core::io::{MediaSourceStream, ReadBytes};

pub const ID_DUMMY: u8 = 0x0;
pub const ID_ENCODER_INFO: u8 = 0x1;
pub const ID_DECORR_TERMS: u8 = 0x2;
pub const ID_DECORR_WEIGHTS: u8 = 0x3;
pub const ID_DECORR_SAMPLES: u8 = 0x4;
pub const ID_ENTROPY_VARS: u8 = 0x5;
pub const ID_HYBRID_PROFILE: u8 = 0x6;
pub const ID_SHAPING_WEIGHTS: u8 = 0x7;
pub const ID_FLOAT_INFO: u8 = 0x8;
pub const ID_INT32_INFO: u8 = 0x9;
pub const ID_WV_BITSTREAM: u8 = 0xa;
pub const ID_WVC_BITSTREAM: u8 = 0xb;
pub const ID_WVX_BITSTREAM: u8 = 0xc;
pub const ID_CHANNEL_INFO: u8 = 0xd;

pub const ID_RIFF_HEADER: u8 = 0x21;
pub const ID_RIFF_TRAILER: u8 = 0x22;
pub const ID_REPLAY_GAIN: u8 = 0x23;
pub const ID_CUESHEET: u8 = 0x24;
pub const ID_CONFIG_BLOCK: u8 = 0x25;
pub const ID_MD5_CHECKSUM: u8 = 0x26;
pub const ID_SAMPLE_RATE: u8 = 0x27;

pub const ID_OPTIONAL_DATA: u8 = 0x20;
pub const ID_ODD_SIZE: u8 = 0x40;
pub const ID_LARGE: u8 = 0x80;

/// Size of the scratch buffer sub-block data is read into. Sub-blocks larger
/// than this carry bulk data (RIFF chunks, cuesheets) that the decoder never
/// interprets, so they are skipped instead of buffered.
pub const SCRATCH_SIZE: usize = 1024;

/// One parsed sub-block. When `has_data` is set the first `len` bytes of the
/// scratch buffer hold its payload. The audio bitstream sub-block is never
/// buffered; its payload is left in the source for streaming.
#[derive(Clone, Copy, Debug)]
pub struct SubBlock {
    pub id: u8,
    pub len: u32,
    pub has_data: bool,
}

impl SubBlock {
    /// Bytes the sub-block's data occupies on the wire (padded to a 16-bit
    /// word boundary).
    pub fn aligned_len(&self) -> u32 {
        self.len + (self.len & 1)
    }
}

/// Read the next sub-block out of the current block's payload.
///
/// `bytes_left` is the number of payload bytes remaining in the block and is
/// decremented by everything consumed, which keeps a corrupt length field
/// from walking the scan into the next block. The bitstream sub-block is an
/// exception: its payload is deliberately not consumed here.
pub fn read_sub_block(
    reader: &mut MediaSourceStream,
    scratch: &mut [u8; SCRATCH_SIZE],
    bytes_left: &mut u32,
) -> Result<SubBlock> {
    if *bytes_left < 2 {
        return decode_error("wavpack: invalid metadata");
    }

    let tag = reader.read_byte()?;
    let mut len = u32::from(reader.read_byte()?) << 1;
    *bytes_left -= 2;

    if tag & ID_LARGE != 0 {
        if *bytes_left < 2 {
            return decode_error("wavpack: invalid metadata");
        }
        len += u32::from(reader.read_byte()?) << 9;
        len += u32::from(reader.read_byte()?) << 17;
        *bytes_left -= 2;
    }

    // The padded size is the on-wire size; an odd logical length is one less.
    let aligned_len = len;
    if tag & ID_ODD_SIZE != 0 {
        if len == 0 {
            return decode_error("wavpack: invalid metadata");
        }
        len -= 1;
    }

    if aligned_len > *bytes_left {
        return decode_error("wavpack: invalid metadata");
    }

    let id = tag & !(ID_LARGE | ID_ODD_SIZE);

    // The audio bitstream stays in the source and is consumed bit by bit.
    if id == ID_WV_BITSTREAM {
        return Ok(SubBlock { id, len, has_data: false });
    }

    *bytes_left -= aligned_len;

    if aligned_len == 0 {
        return Ok(SubBlock { id, len, has_data: false });
    }

    if aligned_len as usize > SCRATCH_SIZE {
        reader.ignore_bytes(u64::from(aligned_len))?;
        return Ok(SubBlock { id, len, has_data: false });
    }

    reader.read_buf_exact(&mut scratch[..aligned_len as usize])?;

    Ok(SubBlock { id, len, has_data: true })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use symphonia_core::io::ReadOnlySource;

    fn mss(data: Vec<u8>) -> MediaSourceStream {
        MediaSourceStream::new(Box::new(ReadOnlySource::new(Cursor::new(data))), Default::default())
    }

    #[test]
    fn verify_small_sub_block() {
        let mut source = mss(vec![ID_ENTROPY_VARS, 0x03, 1, 2, 3, 4, 5, 6]);
        let mut scratch = [0u8; SCRATCH_SIZE];
        let mut bytes_left = 8;

        let sub = read_sub_block(&mut source, &mut scratch, &mut bytes_left).unwrap();
        assert_eq!(sub.id, ID_ENTROPY_VARS);
        assert_eq!(sub.len, 6);
        assert!(sub.has_data);
        assert_eq!(&scratch[..6], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(bytes_left, 0);
    }

    #[test]
    fn verify_odd_size_sub_block() {
        // Two words on the wire, one byte of padding.
        let mut source = mss(vec![ID_FLOAT_INFO | ID_ODD_SIZE, 0x02, 9, 8, 7, 0]);
        let mut scratch = [0u8; SCRATCH_SIZE];
        let mut bytes_left = 6;

        let sub = read_sub_block(&mut source, &mut scratch, &mut bytes_left).unwrap();
        assert_eq!(sub.id, ID_FLOAT_INFO);
        assert_eq!(sub.len, 3);
        assert_eq!(sub.aligned_len(), 4);
        assert_eq!(&scratch[..3], &[9, 8, 7]);
        assert_eq!(bytes_left, 0);
    }

    #[test]
    fn verify_large_sub_block_is_skipped() {
        // 0x300 words = 1536 bytes, too big for the scratch buffer.
        let mut data = vec![ID_RIFF_HEADER | ID_LARGE, 0x00, 0x03, 0x00];
        data.extend(std::iter::repeat(0xaa).take(1536));
        data.push(ID_DUMMY);
        data.push(0);
        let mut source = mss(data);
        let mut scratch = [0u8; SCRATCH_SIZE];
        let mut bytes_left = 1542;

        let sub = read_sub_block(&mut source, &mut scratch, &mut bytes_left).unwrap();
        assert_eq!(sub.id, ID_RIFF_HEADER);
        assert_eq!(sub.len, 1536);
        assert!(!sub.has_data);

        // The skip must leave the source aligned on the next sub-block.
        let sub = read_sub_block(&mut source, &mut scratch, &mut bytes_left).unwrap();
        assert_eq!(sub.id, ID_DUMMY);
        assert_eq!(bytes_left, 0);
    }

    #[test]
    fn verify_length_overrun_fails() {
        // Declares 4 bytes of data but the block payload has only 2 left.
        let mut source = mss(vec![ID_DECORR_TERMS, 0x02, 0, 0]);
        let mut scratch = [0u8; SCRATCH_SIZE];
        let mut bytes_left = 4;
        assert!(read_sub_block(&mut source, &mut scratch, &mut bytes_left).is_err());
    }

    #[test]
    fn verify_bitstream_payload_not_consumed() {
        let mut source = mss(vec![ID_WV_BITSTREAM, 0x02, 0xff, 0xff, 0xff, 0xff]);
        let mut scratch = [0u8; SCRATCH_SIZE];
        let mut bytes_left = 6;

        let sub = read_sub_block(&mut source, &mut scratch, &mut bytes_left).unwrap();
        assert_eq!(sub.id, ID_WV_BITSTREAM);
        assert_eq!(sub.len, 4);
        assert!(!sub.has_data);
        // Only the two header bytes were consumed.
        assert_eq!(source.pos(), 2);
    }
}
