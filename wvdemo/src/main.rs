// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decode a WavPack file to `output.wav`.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use clap::Parser;
use log::info;

use symphonia_core::io::MediaSourceStream;
use wavpack::WavPackDecoder;

/// Samples decoded per call, counted in buffer entries (all channels).
const SAMPLE_BUFFER_SIZE: usize = 256;

#[derive(Parser)]
#[command(name = "wvdemo", about = "Decode a WavPack file to output.wav.")]
struct Args {
    /// Input WavPack file.
    #[arg(default_value = "input.wv")]
    input: PathBuf,
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();

    let file = File::open(&args.input)
        .with_context(|| format!("cannot open input file {}", args.input.display()))?;
    let source = MediaSourceStream::new(Box::new(file), Default::default());

    let mut decoder = WavPackDecoder::try_new(source).context("cannot open WavPack stream")?;

    let num_channels = decoder.reduced_channels();
    let total_samples = decoder.num_samples();
    let bps = decoder.bytes_per_sample();

    println!("The wavpack file has {} channels", num_channels);
    match total_samples {
        Some(total) => println!("The wavpack file has {} samples", total),
        None => println!("The wavpack file has an unknown number of samples"),
    }
    println!("The wavpack file has {} bytes per sample", bps);

    let output = File::create("output.wav").context("cannot create output.wav")?;
    let mut writer = BufWriter::new(output);

    write_wav_header(&mut writer, &decoder, total_samples.unwrap_or(0))?;

    let mut buffer = vec![0i32; SAMPLE_BUFFER_SIZE];
    let mut total_unpacked: u64 = 0;

    loop {
        let unpacked = decoder.unpack(&mut buffer, SAMPLE_BUFFER_SIZE / num_channels as usize);
        if unpacked == 0 {
            break;
        }

        total_unpacked += unpacked as u64;
        write_samples(&mut writer, &buffer[..unpacked * num_channels as usize], bps)?;
    }

    info!("unpacked {} samples", total_unpacked);

    if total_samples.is_none() {
        // The stream did not state its length up front; go back and patch
        // the RIFF sizes now that it is known.
        patch_wav_sizes(&mut writer, total_unpacked as u32 * num_channels * bps)?;
    }

    writer.flush()?;

    if let Some(message) = decoder.error_message() {
        bail!("decoding failed: {}", message);
    }

    if let Some(total) = total_samples {
        if total_unpacked != u64::from(total) {
            bail!("incorrect number of samples");
        }
    }

    if decoder.num_errors() > 0 {
        bail!("crc errors detected");
    }

    println!("Finished!");
    Ok(())
}

/// Write the canonical 44-byte RIFF/fmt/data header.
fn write_wav_header<W: Write>(
    writer: &mut W,
    decoder: &WavPackDecoder,
    total_samples: u32,
) -> Result<()> {
    let num_channels = decoder.reduced_channels();
    let bps = decoder.bytes_per_sample();
    let sample_rate = decoder.sample_rate();

    let data_size = total_samples * num_channels * bps;
    let block_align = num_channels * bps;

    writer.write_all(b"RIFF")?;
    writer.write_u32::<LittleEndian>(data_size + 8 * 2 + 16 + 4)?;
    writer.write_all(b"WAVE")?;

    writer.write_all(b"fmt ")?;
    writer.write_u32::<LittleEndian>(16)?;
    writer.write_u16::<LittleEndian>(1)?; // PCM
    writer.write_u16::<LittleEndian>(num_channels as u16)?;
    writer.write_u32::<LittleEndian>(sample_rate)?;
    writer.write_u32::<LittleEndian>(sample_rate * block_align)?;
    writer.write_u16::<LittleEndian>(block_align as u16)?;
    writer.write_u16::<LittleEndian>(decoder.bits_per_sample() as u16)?;

    writer.write_all(b"data")?;
    writer.write_u32::<LittleEndian>(data_size)?;

    Ok(())
}

/// Fix up the RIFF and data chunk sizes once the decoded length is known.
fn patch_wav_sizes(writer: &mut BufWriter<File>, data_size: u32) -> Result<()> {
    writer.flush()?;
    let file = writer.get_mut();

    file.seek(SeekFrom::Start(4))?;
    file.write_u32::<LittleEndian>(data_size + 8 * 2 + 16 + 4)?;

    file.seek(SeekFrom::Start(40))?;
    file.write_u32::<LittleEndian>(data_size)?;

    file.seek(SeekFrom::End(0))?;
    Ok(())
}

/// Reformat right-justified samples to little-endian PCM of `bps` bytes.
/// Eight-bit WAV data is unsigned; everything wider is two's complement.
fn write_samples<W: Write>(writer: &mut W, samples: &[i32], bps: u32) -> Result<()> {
    for &sample in samples {
        match bps {
            1 => writer.write_u8(sample.wrapping_add(128) as u8)?,
            2 => writer.write_i16::<LittleEndian>(sample as i16)?,
            3 => {
                writer.write_u8(sample as u8)?;
                writer.write_u8((sample >> 8) as u8)?;
                writer.write_u8((sample >> 16) as u8)?;
            }
            _ => writer.write_i32::<LittleEndian>(sample)?,
        }
    }
    Ok(())
}
