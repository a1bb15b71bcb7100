// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Block-level framing: locating, validating and parsing the 32-byte `wvpk`
//! block headers that delimit a WavPack stream.

use symphonia_core::errors::{unsupported_error, Result};
use symphonia_core::io::{MediaSourceStream, ReadBytes};

use log::debug;

pub mod metadata;

pub const STREAM_MARKER: [u8; 4] = *b"wvpk";

/// Lowest stream version this decoder accepts.
pub const MIN_STREAM_VERS: u16 = 0x402;
/// Highest stream version this decoder accepts.
pub const MAX_STREAM_VERS: u16 = 0x410;

// Block header flags.
pub const BYTES_STORED: u32 = 3; // 1-4 bytes per sample
pub const MONO_FLAG: u32 = 4; // not stereo
pub const HYBRID_FLAG: u32 = 8; // hybrid mode
pub const JOINT_STEREO: u32 = 0x10; // joint stereo
pub const CROSS_DECORR: u32 = 0x20; // no-delay cross decorrelation
pub const HYBRID_SHAPE: u32 = 0x40; // noise shape (hybrid mode only)
pub const FLOAT_DATA: u32 = 0x80; // ieee 32-bit floating point data
pub const INT32_DATA: u32 = 0x100; // special extended int handling
pub const HYBRID_BITRATE: u32 = 0x200; // bitrate noise (hybrid mode only)
pub const HYBRID_BALANCE: u32 = 0x400; // balance noise (hybrid stereo mode only)
pub const INITIAL_BLOCK: u32 = 0x800; // initial block of multichannel segment
pub const FINAL_BLOCK: u32 = 0x1000; // final block of multichannel segment
pub const FALSE_STEREO: u32 = 0x4000_0000; // block is stereo, but data is mono

pub const SHIFT_LSB: u32 = 13;
pub const SHIFT_MASK: u32 = 0x1f << SHIFT_LSB;

pub const MAG_LSB: u32 = 18;
pub const MAG_MASK: u32 = 0x1f << MAG_LSB;

pub const SRATE_LSB: u32 = 23;
pub const SRATE_MASK: u32 = 0xf << SRATE_LSB;

/// Sample rates indexed by the header's rate field. The reserved index (0xf)
/// means custom or unknown.
pub const SAMPLE_RATES: [u32; 15] = [
    6000, 8000, 9600, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000, 64000, 88200, 96000,
    192000,
];

/// How many junk bytes `read_next_header` will skip looking for a valid block
/// header before giving up.
const MAX_SCAN_BYTES: u64 = 1024 * 1024;

/// A parsed 32-byte WavPack block header.
///
/// All multi-byte fields are little-endian on the wire. A block with
/// `block_samples == 0` carries no audio (metadata only).
#[derive(Clone, Copy, Debug, Default)]
pub struct BlockHeader {
    /// Size of the entire block minus 8.
    pub ck_size: u32,
    pub version: u16,
    pub track_no: u8,
    pub index_no: u8,
    /// Total samples in the file, if known.
    pub total_samples: Option<u32>,
    /// Index of the first sample in this block relative to the file start.
    pub block_index: u32,
    /// Number of samples in this block, 0 for non-audio blocks.
    pub block_samples: u32,
    pub flags: u32,
    /// Checksum of the decoded samples of this block.
    pub crc: u32,
}

impl BlockHeader {
    pub const SIZE: usize = 32;

    /// True when the block carries one channel of data, either because it is
    /// mono or because it is a stereo block encoded from identical channels.
    pub fn is_mono_data(&self) -> bool {
        self.flags & (MONO_FLAG | FALSE_STEREO) != 0
    }

    /// Final left-shift to apply to decoded samples, in bits.
    pub fn shift(&self) -> u32 {
        (self.flags & SHIFT_MASK) >> SHIFT_LSB
    }

    fn parse(buf: &[u8; BlockHeader::SIZE]) -> BlockHeader {
        let word = |i: usize| u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);

        let total_samples = match word(12) {
            u32::MAX => None,
            n => Some(n),
        };

        BlockHeader {
            ck_size: word(4),
            version: u16::from_le_bytes([buf[8], buf[9]]),
            track_no: buf[10],
            index_no: buf[11],
            total_samples,
            block_index: word(16),
            block_samples: word(20),
            flags: word(24),
            crc: word(28),
        }
    }
}

/// Byte-level sanity check of a candidate 32-byte header window, done before
/// committing to a full parse: the marker itself, a zero reserved flag bit, a
/// sane size field and a supported version.
fn is_valid_header(buf: &[u8; BlockHeader::SIZE]) -> bool {
    buf[0..4] == STREAM_MARKER
        && buf[4] & 1 == 0
        && buf[6] < 16
        && buf[7] == 0
        && buf[9] == 4
        && buf[8] >= (MIN_STREAM_VERS & 0xff) as u8
        && buf[8] <= (MAX_STREAM_VERS & 0xff) as u8
}

/// Read from the current position until a valid block header is found, and
/// parse it. No bytes past the header are consumed.
///
/// Corruption is handled by resynchronization: on a failed validation the
/// window advances to the next `w` byte and retries, giving up only after
/// 1 MiB of skipped input.
pub fn read_next_header(reader: &mut MediaSourceStream) -> Result<BlockHeader> {
    let mut buffer = [0u8; BlockHeader::SIZE];
    let mut bleft = 0;
    let mut bytes_skipped: u64 = 0;

    loop {
        buffer.copy_within(BlockHeader::SIZE - bleft.., 0);
        reader.read_buf_exact(&mut buffer[bleft..])?;

        if is_valid_header(&buffer) {
            if bytes_skipped > 0 {
                debug!("wavpack: skipped {} bytes to resync", bytes_skipped);
            }
            return Ok(BlockHeader::parse(&buffer));
        }

        // Slide the window to the next possible marker start.
        let mut counter = 1;
        while counter < BlockHeader::SIZE && buffer[counter] != b'w' {
            counter += 1;
        }

        bleft = BlockHeader::SIZE - counter;
        bytes_skipped += counter as u64;

        if bytes_skipped > MAX_SCAN_BYTES {
            return unsupported_error("wavpack: no valid block header found");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use symphonia_core::io::ReadOnlySource;

    fn mss(data: Vec<u8>) -> MediaSourceStream {
        MediaSourceStream::new(Box::new(ReadOnlySource::new(Cursor::new(data))), Default::default())
    }

    fn test_header_bytes() -> [u8; 32] {
        let mut buf = [0u8; 32];
        buf[0..4].copy_from_slice(b"wvpk");
        buf[4..8].copy_from_slice(&62u32.to_le_bytes()); // ck_size
        buf[8..10].copy_from_slice(&0x410u16.to_le_bytes()); // version
        buf[12..16].copy_from_slice(&4096u32.to_le_bytes()); // total_samples
        buf[16..20].copy_from_slice(&1024u32.to_le_bytes()); // block_index
        buf[20..24].copy_from_slice(&1024u32.to_le_bytes()); // block_samples
        let flags = MONO_FLAG | INITIAL_BLOCK | FINAL_BLOCK | (9 << SRATE_LSB);
        buf[24..28].copy_from_slice(&flags.to_le_bytes());
        buf[28..32].copy_from_slice(&0xdead_beefu32.to_le_bytes()); // crc
        buf
    }

    #[test]
    fn verify_parse_header() {
        let mut source = mss(test_header_bytes().to_vec());
        let header = read_next_header(&mut source).unwrap();

        assert_eq!(header.ck_size, 62);
        assert_eq!(header.version, 0x410);
        assert_eq!(header.total_samples, Some(4096));
        assert_eq!(header.block_index, 1024);
        assert_eq!(header.block_samples, 1024);
        assert!(header.is_mono_data());
        assert_eq!(header.shift(), 0);
        assert_eq!((header.flags & SRATE_MASK) >> SRATE_LSB, 9);
        assert_eq!(header.crc, 0xdead_beef);
    }

    #[test]
    fn verify_unknown_total_samples() {
        let mut bytes = test_header_bytes();
        bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        let header = read_next_header(&mut mss(bytes.to_vec())).unwrap();
        assert_eq!(header.total_samples, None);
    }

    #[test]
    fn verify_resync_skips_junk() {
        // Junk that includes false 'w' markers and a truncated real marker.
        let mut data = b"now the world wvpknords".to_vec();
        data.extend_from_slice(&test_header_bytes());
        let header = read_next_header(&mut mss(data)).unwrap();
        assert_eq!(header.block_samples, 1024);
    }

    #[test]
    fn verify_unsupported_version_is_skipped() {
        // A block with version 0x500 must not be accepted even though the
        // marker matches.
        let mut bytes = test_header_bytes();
        bytes[8..10].copy_from_slice(&0x500u16.to_le_bytes());
        assert!(read_next_header(&mut mss(bytes.to_vec())).is_err());
    }

    #[test]
    fn verify_scan_gives_up() {
        // More than a megabyte of zeros: no header, bounded failure.
        let data = vec![0u8; 1100 * 1024];
        assert!(read_next_header(&mut mss(data)).is_err());
    }
}
