// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end decoding of synthetic WavPack streams assembled byte by byte.

use std::io::Cursor;

use symphonia_core::io::{MediaSourceStream, ReadOnlySource};

use wavpack::codec::{MODE_HYBRID, MODE_LOSSLESS};
use wavpack::reader::metadata::{
    ID_ENTROPY_VARS, ID_HYBRID_PROFILE, ID_ODD_SIZE, ID_WV_BITSTREAM,
};
use wavpack::reader::{
    FALSE_STEREO, FINAL_BLOCK, HYBRID_FLAG, INITIAL_BLOCK, JOINT_STEREO, MONO_FLAG, SRATE_LSB,
};
use wavpack::WavPackDecoder;

fn mss(data: Vec<u8>) -> MediaSourceStream {
    MediaSourceStream::new(Box::new(ReadOnlySource::new(Cursor::new(data))), Default::default())
}

/// Append one metadata sub-block, padding odd data to a word boundary.
fn push_sub_block(payload: &mut Vec<u8>, id: u8, data: &[u8]) {
    let odd = data.len() & 1;
    let words = (data.len() + odd) / 2;
    assert!(words < 256, "test sub-blocks use the short size form");

    payload.push(if odd != 0 { id | ID_ODD_SIZE } else { id });
    payload.push(words as u8);
    payload.extend_from_slice(data);
    if odd != 0 {
        payload.push(0);
    }
}

/// Assemble a complete block: header, metadata, audio bitstream.
fn build_block(
    flags: u32,
    block_index: u32,
    block_samples: u32,
    total_samples: u32,
    crc: u32,
    metadata: &[(u8, Vec<u8>)],
    bitstream: &[u8],
) -> Vec<u8> {
    let mut payload = Vec::new();
    for (id, data) in metadata {
        push_sub_block(&mut payload, *id, data);
    }
    push_sub_block(&mut payload, ID_WV_BITSTREAM, bitstream);

    let mut block = Vec::new();
    block.extend_from_slice(b"wvpk");
    block.extend_from_slice(&(payload.len() as u32 + 24).to_le_bytes());
    block.extend_from_slice(&0x410u16.to_le_bytes());
    block.push(0); // track_no
    block.push(0); // index_no
    block.extend_from_slice(&total_samples.to_le_bytes());
    block.extend_from_slice(&block_index.to_le_bytes());
    block.extend_from_slice(&block_samples.to_le_bytes());
    block.extend_from_slice(&flags.to_le_bytes());
    block.extend_from_slice(&crc.to_le_bytes());
    block.extend_from_slice(&payload);
    block
}

/// Encode a run of `n` zero samples as the entropy coder's run-length code:
/// a unary count of the run's bit length, then the value below its implicit
/// top bit, low bit first.
fn zero_run_bits(n: u32) -> Vec<u8> {
    assert!(n >= 2);
    let cbits = 32 - n.leading_zeros();

    let mut bits = Vec::new();
    bits.extend(std::iter::repeat(1u8).take(cbits as usize));
    bits.push(0);
    for j in 0..cbits - 1 {
        bits.push(((n >> j) & 1) as u8);
    }

    let mut bytes = vec![0u8; (bits.len() + 7) / 8];
    for (i, bit) in bits.iter().enumerate() {
        bytes[i / 8] |= bit << (i % 8);
    }
    bytes
}

/// The rolling block checksum of a buffer of zero samples.
fn crc_of_zeros(count: u32) -> u32 {
    let mut crc: u32 = 0xffff_ffff;
    for _ in 0..count {
        crc = crc.wrapping_mul(3);
    }
    crc
}

const SRATE_44100: u32 = 9 << SRATE_LSB;

fn mono_silence_stream(samples: u32) -> Vec<u8> {
    build_block(
        MONO_FLAG | INITIAL_BLOCK | FINAL_BLOCK | SRATE_44100,
        0,
        samples,
        samples,
        crc_of_zeros(samples),
        &[(ID_ENTROPY_VARS, vec![0; 6])],
        &zero_run_bits(samples),
    )
}

#[test]
fn verify_mono_silence() {
    let mut decoder = WavPackDecoder::try_new(mss(mono_silence_stream(1024))).unwrap();

    assert_eq!(decoder.num_samples(), Some(1024));
    assert_eq!(decoder.sample_rate(), 44100);
    assert_eq!(decoder.num_channels(), 1);
    assert_eq!(decoder.reduced_channels(), 1);
    assert_eq!(decoder.bits_per_sample(), 8);
    assert_eq!(decoder.bytes_per_sample(), 1);
    assert_ne!(decoder.mode() & MODE_LOSSLESS, 0);

    let mut buffer = vec![0x55i32; 2048];
    let unpacked = decoder.unpack(&mut buffer, 2000);

    assert_eq!(unpacked, 1024);
    assert!(buffer[..1024].iter().all(|&s| s == 0));
    assert_eq!(decoder.num_errors(), 0);
    assert_eq!(decoder.sample_index(), 1024);

    // End of stream.
    assert_eq!(decoder.unpack(&mut buffer, 16), 0);
    assert!(decoder.error_message().is_none());
}

#[test]
fn verify_two_blocks_in_sequence() {
    // Two 512-sample blocks; both headers state the full 1024-sample length.
    let mut data = Vec::new();
    for index in [0u32, 512] {
        data.extend(build_block(
            MONO_FLAG | INITIAL_BLOCK | FINAL_BLOCK | SRATE_44100,
            index,
            512,
            1024,
            crc_of_zeros(512),
            &[(ID_ENTROPY_VARS, vec![0; 6])],
            &zero_run_bits(512),
        ));
    }

    let mut decoder = WavPackDecoder::try_new(mss(data)).unwrap();
    let mut buffer = vec![0i32; 4096];

    // Both blocks decode in one call, crossing a block boundary.
    assert_eq!(decoder.unpack(&mut buffer, 4096), 1024);
    assert_eq!(decoder.num_errors(), 0);
}

#[test]
fn verify_false_stereo_expands() {
    let samples = 64;
    let stream = build_block(
        FALSE_STEREO | INITIAL_BLOCK | FINAL_BLOCK | SRATE_44100,
        0,
        samples,
        samples,
        crc_of_zeros(samples),
        &[(ID_ENTROPY_VARS, vec![0; 6])],
        &zero_run_bits(samples),
    );

    let mut decoder = WavPackDecoder::try_new(mss(stream)).unwrap();
    assert_eq!(decoder.reduced_channels(), 2);

    let mut buffer = vec![0x55i32; 256];
    let unpacked = decoder.unpack(&mut buffer, 100);

    // One decoded channel, two channels of output.
    assert_eq!(unpacked, 64);
    assert!(buffer[..128].iter().all(|&s| s == 0));
    assert_eq!(decoder.num_errors(), 0);
}

#[test]
fn verify_joint_stereo_silence() {
    let samples = 48u32;
    let stream = build_block(
        JOINT_STEREO | INITIAL_BLOCK | FINAL_BLOCK | SRATE_44100,
        0,
        samples,
        samples,
        crc_of_zeros(samples * 2),
        &[(ID_ENTROPY_VARS, vec![0; 12])],
        &zero_run_bits(samples * 2),
    );

    let mut decoder = WavPackDecoder::try_new(mss(stream)).unwrap();
    assert_eq!(decoder.num_channels(), 2);

    let mut buffer = vec![0x55i32; 128];
    assert_eq!(decoder.unpack(&mut buffer, 64), 48);
    assert!(buffer[..96].iter().all(|&s| s == 0));
    assert_eq!(decoder.num_errors(), 0);
}

#[test]
fn verify_hybrid_silence() {
    let samples = 256u32;
    let stream = build_block(
        MONO_FLAG | HYBRID_FLAG | INITIAL_BLOCK | FINAL_BLOCK | SRATE_44100,
        0,
        samples,
        samples,
        crc_of_zeros(samples),
        &[(ID_ENTROPY_VARS, vec![0; 6]), (ID_HYBRID_PROFILE, vec![0, 0])],
        &zero_run_bits(samples),
    );

    let mut decoder = WavPackDecoder::try_new(mss(stream)).unwrap();
    assert_ne!(decoder.mode() & MODE_HYBRID, 0);
    assert_eq!(decoder.mode() & MODE_LOSSLESS, 0);

    let mut buffer = vec![0i32; 256];
    assert_eq!(decoder.unpack(&mut buffer, 256), 256);
    assert_eq!(decoder.num_errors(), 0);
}

#[test]
fn verify_resync_before_first_block() {
    // A kilobyte of junk with misleading marker fragments prepended.
    let mut data: Vec<u8> = (0..1000u32).map(|i| b"wvpz"[(i % 4) as usize]).collect();
    data.extend(mono_silence_stream(1024));

    let mut decoder = WavPackDecoder::try_new(mss(data)).unwrap();
    let mut buffer = vec![0i32; 1024];
    assert_eq!(decoder.unpack(&mut buffer, 1024), 1024);
    assert_eq!(decoder.num_errors(), 0);
}

#[test]
fn verify_corrupt_crc_is_soft() {
    let mut data = mono_silence_stream(1024);
    // Flip a bit of the stored checksum.
    data[28] ^= 1;

    let mut decoder = WavPackDecoder::try_new(mss(data)).unwrap();
    let mut buffer = vec![0i32; 1024];

    // Decoding continues; the mismatch is only counted.
    assert_eq!(decoder.unpack(&mut buffer, 1024), 1024);
    assert_eq!(decoder.num_errors(), 1);
    assert!(decoder.error_message().is_none());
}

#[test]
fn verify_truncated_bitstream_stays_silent() {
    let mut data = mono_silence_stream(1024);
    // Cut the stream inside the audio bitstream: the block still fills with
    // silence and the decoder stays usable.
    data.truncate(data.len() - 2);

    let mut decoder = WavPackDecoder::try_new(mss(data)).unwrap();
    let mut buffer = vec![0x55i32; 1024];

    assert_eq!(decoder.unpack(&mut buffer, 1024), 1024);
    assert!(buffer.iter().all(|&s| s == 0));
    assert!(decoder.error_message().is_none());

    assert_eq!(decoder.unpack(&mut buffer, 16), 0);
}

#[test]
fn verify_garbage_is_rejected() {
    let data = vec![0u8; 1100 * 1024];
    assert!(WavPackDecoder::try_new(mss(data)).is_err());
}

#[test]
fn verify_empty_source_is_rejected() {
    assert!(WavPackDecoder::try_new(mss(Vec::new())).is_err());
}
