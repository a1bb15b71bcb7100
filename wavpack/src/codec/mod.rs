// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The WavPack decoder proper: per-block state, the unpack loop, and the
//! public facade.

use symphonia_core::errors::{decode_error, Error, Result};
use symphonia_core::io::MediaSourceStream;

use log::{debug, warn};

use crate::reader::metadata::{self, SubBlock, SCRATCH_SIZE};
use crate::reader::{self, BlockHeader};
use crate::reader::{
    BYTES_STORED, FALSE_STEREO, FINAL_BLOCK, FLOAT_DATA, HYBRID_FLAG, INITIAL_BLOCK, INT32_DATA,
    JOINT_STEREO, MAG_LSB, MAG_MASK, MONO_FLAG, SAMPLE_RATES, SHIFT_LSB, SHIFT_MASK, SRATE_LSB,
    SRATE_MASK,
};

pub mod bitstream;
pub mod decorr;
pub mod fixup;
pub mod words;

use bitstream::Bitstream;
use decorr::{DecorrPass, MAX_TERMS};
use fixup::{FloatInfo, Int32Info};
use words::WordsState;

// Mode bits reported by [`WavPackDecoder::mode`].
pub const MODE_WVC: u32 = 0x1;
pub const MODE_LOSSLESS: u32 = 0x2;
pub const MODE_HYBRID: u32 = 0x4;
pub const MODE_FLOAT: u32 = 0x8;
pub const MODE_VALID_TAG: u32 = 0x10;
pub const MODE_HIGH: u32 = 0x20;
pub const MODE_FAST: u32 = 0x40;

// Encoder configuration bits carried by the config-block metadata. Only the
// ones the mode query reports are named here.
const CONFIG_HYBRID_FLAG: u32 = 8;
const CONFIG_FLOAT_DATA: u32 = 0x80;
const CONFIG_FAST_FLAG: u32 = 0x200;
const CONFIG_HIGH_FLAG: u32 = 0x800;
const CONFIG_LOSSY_MODE: u32 = 0x100_0000;

/// Stream-wide parameters, fixed by the first audio block and any config
/// metadata that precedes it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Config {
    pub flags: u32,
    pub bytes_per_sample: u32,
    pub bits_per_sample: u32,
    pub sample_rate: u32,
    pub num_channels: u32,
    pub channel_mask: u32,
    pub norm_exp: u8,
}

/// All state that is rebuilt for every audio block.
#[derive(Default)]
struct StreamState {
    header: BlockHeader,
    wvbits: Bitstream,
    words: WordsState,
    num_terms: usize,
    passes: [DecorrPass; MAX_TERMS],
    mute_error: bool,
    sample_index: u32,
    crc: u32,
    int32: Int32Info,
    float: FloatInfo,
}

/// A WavPack version 4 decoder over a media source stream.
///
/// Decoding starts at the first audio block found at or after the current
/// stream position, so a handle can be opened anywhere inside a file.
/// Correction files are not consumed, only the first two channels of
/// multi-channel files are decoded, and large integer or floating point
/// files are limited to 24 bits of resolution.
pub struct WavPackDecoder {
    source: MediaSourceStream,
    stream: StreamState,
    config: Config,
    scratch: [u8; SCRATCH_SIZE],
    total_samples: Option<u32>,
    crc_errors: u32,
    lossy_blocks: bool,
    reduced: u32,
    error: Option<&'static str>,
}

fn sub_data<'a>(scratch: &'a [u8; SCRATCH_SIZE], sub: &SubBlock) -> Result<&'a [u8]> {
    if sub.has_data {
        Ok(&scratch[..sub.len as usize])
    }
    else {
        decode_error("wavpack: invalid metadata")
    }
}

fn error_text(err: &Error) -> &'static str {
    match err {
        Error::DecodeError(msg) => *msg,
        Error::Unsupported(msg) => *msg,
        _ => "wavpack: read error",
    }
}

impl WavPackDecoder {
    /// Scan forward for the first audio-bearing block and build a decoder
    /// from its parameters.
    pub fn try_new(source: MediaSourceStream) -> Result<Self> {
        let mut decoder = WavPackDecoder {
            source,
            stream: StreamState::default(),
            config: Config::default(),
            scratch: [0; SCRATCH_SIZE],
            total_samples: None,
            crc_errors: 0,
            lossy_blocks: false,
            reduced: 0,
            error: None,
        };

        loop {
            decoder.stream.header = reader::read_next_header(&mut decoder.source)?;

            let header = &decoder.stream.header;
            if header.block_samples > 0 {
                if let Some(total) = header.total_samples {
                    decoder.total_samples = Some(total);
                }
            }

            decoder.unpack_init()?;

            if decoder.stream.header.block_samples > 0 {
                break;
            }
        }

        let flags = decoder.stream.header.flags;

        decoder.config.flags &= !0xff;
        decoder.config.flags |= flags & 0xff;
        decoder.config.norm_exp = decoder.stream.float.norm_exp;

        decoder.config.bytes_per_sample = (flags & BYTES_STORED) + 1;
        decoder.config.bits_per_sample =
            decoder.config.bytes_per_sample * 8 - ((flags & SHIFT_MASK) >> SHIFT_LSB);

        if decoder.config.flags & CONFIG_FLOAT_DATA != 0 {
            // Floats are delivered as 24-bit integers.
            decoder.config.bytes_per_sample = 3;
            decoder.config.bits_per_sample = 24;
        }

        if decoder.config.sample_rate == 0 {
            let index = (flags & SRATE_MASK) >> SRATE_LSB;
            decoder.config.sample_rate =
                if decoder.stream.header.block_samples == 0 || index == 0xf {
                    44100
                }
                else {
                    SAMPLE_RATES[index as usize]
                };
        }

        if decoder.config.num_channels == 0 {
            decoder.config.num_channels = if flags & MONO_FLAG != 0 { 1 } else { 2 };
            decoder.config.channel_mask = 0x5 - decoder.config.num_channels;
        }

        if flags & FINAL_BLOCK == 0 {
            // The first segment of a multi-channel file; only it is decoded.
            decoder.reduced = if flags & MONO_FLAG != 0 { 1 } else { 2 };
        }

        Ok(decoder)
    }

    /// Unpack up to `samples` complete samples into `buffer`, interleaved
    /// left then right for stereo output. `buffer` must hold at least
    /// `samples * reduced_channels()` entries.
    ///
    /// Samples are right-justified signed integers at the stream's stored
    /// width; lossy samples are already clipped to that width. Returns the
    /// number of complete samples produced, which is less than `samples`
    /// only at the end of the stream or after a fatal error.
    pub fn unpack(&mut self, buffer: &mut [i32], samples: usize) -> usize {
        if self.error.is_some() {
            return 0;
        }

        let chans = self.reduced_channels() as usize;

        let mut samples_left = samples.min(buffer.len() / chans);
        let mut unpacked = 0;
        let mut offset = 0;

        while samples_left > 0 {
            let header = self.stream.header;
            let block_end = header.block_index.wrapping_add(header.block_samples);

            if header.block_samples == 0
                || header.flags & INITIAL_BLOCK == 0
                || self.stream.sample_index >= block_end
            {
                match reader::read_next_header(&mut self.source) {
                    Ok(header) => self.stream.header = header,
                    Err(_) => break,
                }

                let header = self.stream.header;
                debug!(
                    "wavpack: block: index={} samples={} flags={:#010x}",
                    header.block_index, header.block_samples, header.flags
                );

                if header.block_samples == 0 || self.stream.sample_index == header.block_index {
                    if let Err(err) = self.unpack_init() {
                        self.error = Some(error_text(&err));
                        break;
                    }
                }
            }

            let header = self.stream.header;
            let block_end = header.block_index.wrapping_add(header.block_samples);

            if header.block_samples == 0
                || header.flags & INITIAL_BLOCK == 0
                || self.stream.sample_index >= block_end
            {
                continue;
            }

            if self.stream.sample_index < header.block_index {
                // Padding for samples lost to a damaged or missing block.
                let gap = (header.block_index - self.stream.sample_index) as usize;
                let fill = gap.min(samples_left);

                self.stream.sample_index += fill as u32;
                unpacked += fill;
                samples_left -= fill;

                for entry in buffer[offset..offset + fill * chans].iter_mut() {
                    *entry = 0;
                }
                offset += fill * chans;
                continue;
            }

            let count = ((block_end - self.stream.sample_index) as usize).min(samples_left);
            let out = &mut buffer[offset..offset + count * chans];
            for entry in out.iter_mut() {
                *entry = 0;
            }

            self.unpack_block(out, count);

            unpacked += count;
            samples_left -= count;
            offset += count * chans;

            if self.stream.sample_index == block_end {
                if self.stream.crc != header.crc {
                    warn!("wavpack: crc mismatch in block at sample {}", header.block_index);
                    self.crc_errors += 1;
                }
            }

            if self.total_samples == Some(self.stream.sample_index) {
                break;
            }
        }

        unpacked
    }

    /// Total number of samples in the file, if the stream states it.
    pub fn num_samples(&self) -> Option<u32> {
        self.total_samples
    }

    /// Index of the next sample to be unpacked.
    pub fn sample_index(&self) -> u32 {
        self.stream.sample_index
    }

    /// Number of CRC errors encountered so far.
    pub fn num_errors(&self) -> u32 {
        self.crc_errors
    }

    /// True if any lossy (uncorrected hybrid, or unreproducible float/int32)
    /// block was read.
    pub fn lossy_blocks(&self) -> bool {
        self.lossy_blocks
    }

    pub fn sample_rate(&self) -> u32 {
        if self.config.sample_rate != 0 {
            self.config.sample_rate
        }
        else {
            44100
        }
    }

    /// Number of channels in the file. This decoder produces at most the
    /// first two; see [`WavPackDecoder::reduced_channels`].
    pub fn num_channels(&self) -> u32 {
        if self.config.num_channels != 0 {
            self.config.num_channels
        }
        else {
            2
        }
    }

    /// Valid bits per sample in the original file, which need not be a
    /// multiple of eight. Unpacked values are right-justified.
    pub fn bits_per_sample(&self) -> u32 {
        if self.config.bits_per_sample != 0 {
            self.config.bits_per_sample
        }
        else {
            16
        }
    }

    /// Bytes per sample (1 to 4) in the original file.
    pub fn bytes_per_sample(&self) -> u32 {
        if self.config.bytes_per_sample != 0 {
            self.config.bytes_per_sample
        }
        else {
            2
        }
    }

    /// Number of channels actually decoded, always 1 or 2. Normally the
    /// front left and right channels of a multi-channel file.
    pub fn reduced_channels(&self) -> u32 {
        if self.reduced != 0 {
            self.reduced
        }
        else if self.config.num_channels != 0 {
            self.config.num_channels
        }
        else {
            2
        }
    }

    /// Bitmask of `MODE_*` values describing the open file.
    pub fn mode(&self) -> u32 {
        let mut mode = 0;

        if self.config.flags & CONFIG_HYBRID_FLAG != 0 {
            mode |= MODE_HYBRID;
        }
        else if self.config.flags & CONFIG_LOSSY_MODE == 0 {
            mode |= MODE_LOSSLESS;
        }

        if self.lossy_blocks {
            mode &= !MODE_LOSSLESS;
        }

        if self.config.flags & CONFIG_FLOAT_DATA != 0 {
            mode |= MODE_FLOAT;
        }
        if self.config.flags & CONFIG_HIGH_FLAG != 0 {
            mode |= MODE_HIGH;
        }
        if self.config.flags & CONFIG_FAST_FLAG != 0 {
            mode |= MODE_FAST;
        }

        mode
    }

    /// The message of the fatal error that stopped decoding, if any.
    pub fn error_message(&self) -> Option<&'static str> {
        self.error
    }

    /// Scan the metadata of the block whose header was just read, rebuilding
    /// the per-block decoding state, up to and including the audio bitstream
    /// sub-block.
    fn unpack_init(&mut self) -> Result<()> {
        let header = self.stream.header;

        if header.block_samples > 0 {
            self.stream.sample_index = header.block_index;
        }
        self.stream.mute_error = false;
        self.stream.crc = 0xffff_ffff;

        let mut found_bitstream = false;
        let mut bytes_left = header.ck_size.wrapping_add(8).saturating_sub(BlockHeader::SIZE as u32);

        while bytes_left >= 2 {
            let sub = metadata::read_sub_block(&mut self.source, &mut self.scratch, &mut bytes_left)?;

            match sub.id {
                metadata::ID_DUMMY => (),
                metadata::ID_DECORR_TERMS => {
                    let data = sub_data(&self.scratch, &sub)?;
                    self.stream.num_terms = decorr::read_decorr_terms(data, &mut self.stream.passes)?;
                }
                metadata::ID_DECORR_WEIGHTS => {
                    let data = sub_data(&self.scratch, &sub)?;
                    decorr::read_decorr_weights(
                        data,
                        &mut self.stream.passes,
                        self.stream.num_terms,
                        header.flags,
                    )?;
                }
                metadata::ID_DECORR_SAMPLES => {
                    let data = sub_data(&self.scratch, &sub)?;
                    decorr::read_decorr_samples(
                        data,
                        &mut self.stream.passes,
                        self.stream.num_terms,
                        header.flags,
                        header.version,
                    )?;
                }
                metadata::ID_ENTROPY_VARS => {
                    let data = sub_data(&self.scratch, &sub)?;
                    self.stream.words.read_entropy_vars(data, header.flags)?;
                }
                metadata::ID_HYBRID_PROFILE => {
                    let data = sub_data(&self.scratch, &sub)?;
                    self.stream.words.read_hybrid_profile(data, header.flags)?;
                }
                metadata::ID_FLOAT_INFO => {
                    self.stream.float = fixup::read_float_info(sub_data(&self.scratch, &sub)?)?;
                }
                metadata::ID_INT32_INFO => {
                    self.stream.int32 = fixup::read_int32_info(sub_data(&self.scratch, &sub)?)?;
                }
                metadata::ID_CHANNEL_INFO => {
                    let data = sub_data(&self.scratch, &sub)?;
                    if data.is_empty() || data.len() > 5 {
                        return decode_error("wavpack: invalid channel info");
                    }
                    self.config.num_channels = u32::from(data[0]);
                    let mut mask = 0;
                    for (i, &byte) in data[1..].iter().enumerate() {
                        mask |= u32::from(byte) << (8 * i);
                    }
                    self.config.channel_mask = mask;
                }
                metadata::ID_SAMPLE_RATE => {
                    let data = sub_data(&self.scratch, &sub)?;
                    if data.len() == 3 {
                        self.config.sample_rate = u32::from(data[0])
                            | (u32::from(data[1]) << 8)
                            | (u32::from(data[2]) << 16);
                    }
                }
                metadata::ID_CONFIG_BLOCK => {
                    let data = sub_data(&self.scratch, &sub)?;
                    if data.len() >= 3 {
                        self.config.flags &= 0xff;
                        self.config.flags |= u32::from(data[0]) << 8;
                        self.config.flags |= u32::from(data[1]) << 16;
                        self.config.flags |= u32::from(data[2]) << 24;
                    }
                }
                metadata::ID_WV_BITSTREAM => {
                    if sub.aligned_len() > 0 {
                        self.stream.wvbits = Bitstream::new(sub.aligned_len());
                        found_bitstream = true;
                    }
                    break;
                }
                // Present in hybrid streams for the correction decoder; this
                // decoder leaves the stream uncorrected.
                metadata::ID_SHAPING_WEIGHTS
                | metadata::ID_WVC_BITSTREAM
                | metadata::ID_WVX_BITSTREAM => (),
                id if id & metadata::ID_OPTIONAL_DATA != 0 => (),
                _ => return decode_error("wavpack: invalid metadata"),
            }
        }

        if header.block_samples > 0 {
            if !found_bitstream {
                return decode_error("wavpack: block has no audio bitstream");
            }

            if header.flags & INT32_DATA != 0 && self.stream.int32.sent_bits != 0 {
                self.lossy_blocks = true;
            }
            if header.flags & FLOAT_DATA != 0 && self.stream.float.is_lossy() {
                self.lossy_blocks = true;
            }
        }

        Ok(())
    }

    /// Decode `sample_count` samples of the current block into `out`, apply
    /// the decorrelation passes and fixups, and advance the stream. `out` is
    /// zeroed by the caller and holds `sample_count * reduced_channels()`
    /// entries. Always produces `sample_count` samples: if the bitstream runs
    /// out or a sample overflows the magnitude bound, the remainder of the
    /// block is muted to silence.
    fn unpack_block(&mut self, out: &mut [i32], sample_count: usize) {
        let header = self.stream.header;
        let flags = header.flags;

        let block_end = header.block_index.wrapping_add(header.block_samples);
        let sample_count = sample_count.min((block_end - self.stream.sample_index) as usize);

        if self.stream.mute_error {
            for entry in out.iter_mut() {
                *entry = 0;
            }
            self.stream.sample_index += sample_count as u32;
            return;
        }

        let mut mute_limit = (1i64 << ((flags & MAG_MASK) >> MAG_LSB)) + 2;
        if flags & HYBRID_FLAG != 0 {
            mute_limit *= 2;
        }

        let mut crc = self.stream.crc;
        let mut decoded;

        if flags & (MONO_FLAG | FALSE_STEREO) != 0 {
            decoded = words::get_words(
                &mut self.stream.words,
                &mut self.stream.wvbits,
                &mut self.source,
                flags,
                out,
                sample_count,
            );

            for pass in self.stream.passes[..self.stream.num_terms].iter_mut() {
                decorr::decorr_mono_pass(pass, &mut out[..sample_count]);
            }

            for (i, &sample) in out[..sample_count].iter().enumerate() {
                if (i64::from(sample)).abs() > mute_limit {
                    decoded = i;
                    break;
                }
                crc = crc.wrapping_mul(3).wrapping_add(sample as u32);
            }
        }
        else {
            decoded = words::get_words(
                &mut self.stream.words,
                &mut self.stream.wvbits,
                &mut self.source,
                flags,
                out,
                sample_count,
            );

            if sample_count < 16 {
                for pass in self.stream.passes[..self.stream.num_terms].iter_mut() {
                    decorr::decorr_stereo_pass(pass, &mut out[..sample_count * 2]);
                }
            }
            else {
                for pass in self.stream.passes[..self.stream.num_terms].iter_mut() {
                    decorr::decorr_stereo_pass(pass, &mut out[..16]);
                    decorr::decorr_stereo_pass_cont(pass, &mut out[..sample_count * 2], 16);
                }
            }

            let joint = flags & JOINT_STEREO != 0;

            for i in 0..sample_count {
                if joint {
                    out[2 * i + 1] = out[2 * i + 1].wrapping_sub(out[2 * i] >> 1);
                    out[2 * i] = out[2 * i].wrapping_add(out[2 * i + 1]);
                }

                let left = out[2 * i];
                let right = out[2 * i + 1];

                if i64::from(left).abs() > mute_limit || i64::from(right).abs() > mute_limit {
                    decoded = i;
                    break;
                }

                crc = crc
                    .wrapping_mul(3)
                    .wrapping_add(left as u32)
                    .wrapping_mul(3)
                    .wrapping_add(right as u32);
            }
        }

        if decoded != sample_count {
            let reason = if self.stream.wvbits.is_error() {
                "bitstream exhausted"
            }
            else {
                "sample overflow"
            };
            warn!(
                "wavpack: muting block at sample {} from sample {} ({})",
                header.block_index, decoded, reason
            );
            let muted = if flags & MONO_FLAG != 0 { sample_count } else { sample_count * 2 };
            for entry in out[..muted].iter_mut() {
                *entry = 0;
            }
            self.stream.mute_error = true;
            decoded = sample_count;
        }

        fixup::fixup_samples(flags, &self.stream.int32, &self.stream.float, out, decoded);

        if flags & FALSE_STEREO != 0 {
            for i in (0..decoded).rev() {
                let sample = out[i];
                out[2 * i] = sample;
                out[2 * i + 1] = sample;
            }
        }

        self.stream.sample_index += decoded as u32;
        self.stream.crc = crc;
    }
}
