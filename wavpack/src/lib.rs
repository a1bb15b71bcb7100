// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A pure-Rust decoder for WavPack version 4 streams (stream versions 0x402
//! through 0x410).
//!
//! The decoder handles mono and stereo blocks (including joint and false
//! stereo), lossless and hybrid-lossy modes, integer data from 1 to 32 bits
//! per sample, and 32-bit IEEE float data (delivered as 24-bit integers).
//! Multi-channel files are reduced to their first mono or stereo sub-stream.
//!
//! Open a [`codec::WavPackDecoder`] over a
//! [`MediaSourceStream`](symphonia_core::io::MediaSourceStream) and pull
//! right-justified interleaved `i32` samples out of it:
//!
//! ```no_run
//! use symphonia_core::io::MediaSourceStream;
//! use wavpack::WavPackDecoder;
//!
//! let file = std::fs::File::open("input.wv").unwrap();
//! let mss = MediaSourceStream::new(Box::new(file), Default::default());
//! let mut decoder = WavPackDecoder::try_new(mss).unwrap();
//!
//! let channels = decoder.reduced_channels() as usize;
//! let mut buffer = vec![0i32; 256 * channels];
//! loop {
//!     let unpacked = decoder.unpack(&mut buffer, 256);
//!     if unpacked == 0 {
//!         break;
//!     }
//!     // consume buffer[..unpacked * channels]
//! }
//! ```

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod reader;

pub use codec::WavPackDecoder;

pub use symphonia_core::errors::{Error, Result};
