//! RIFF/WAVE blob handling
//!
//! Level files embed sound effects as raw RIFF/WAVE blobs, often packed
//! back to back. A blob is `RIFF`, a little-endian u32 payload size, then
//! `size` bytes beginning with `WAVE`.

use crate::decoder::AudioStreamDecoder;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::probe::Hint;
use tracing::trace;

const RIFF_MAGIC: &[u8; 4] = b"RIFF";
const WAVE_MAGIC: &[u8; 4] = b"WAVE";
const HEADER_LEN: usize = 8;

/// Fully decoded PCM for a single-buffer voice
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPcm {
    /// Interleaved samples
    pub samples: Vec<i16>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedPcm {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

/// Validate the RIFF header and return the complete blob `[0, 8 + size)`.
///
/// Trailing bytes after the blob are ignored.
pub fn riff_blob(data: &[u8]) -> Result<&[u8]> {
    if data.len() < HEADER_LEN + WAVE_MAGIC.len() {
        return Err(Error::InvalidWav(format!("{} bytes is too short", data.len())));
    }
    if &data[0..4] != RIFF_MAGIC {
        return Err(Error::InvalidWav("missing RIFF magic".to_string()));
    }

    let size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let end = HEADER_LEN
        .checked_add(size)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| {
            Error::InvalidWav(format!(
                "RIFF size {} exceeds available {} bytes",
                size,
                data.len() - HEADER_LEN
            ))
        })?;

    if &data[HEADER_LEN..HEADER_LEN + 4] != WAVE_MAGIC {
        return Err(Error::InvalidWav("missing WAVE form type".to_string()));
    }
    Ok(&data[..end])
}

/// Iterate over consecutive RIFF blobs in a sample bank.
pub fn riff_blobs(data: &[u8]) -> RiffBlobs<'_> {
    RiffBlobs { data, offset: 0 }
}

/// Iterator returned by [`riff_blobs`]; stops at the first malformed blob.
pub struct RiffBlobs<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for RiffBlobs<'a> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.data.len() {
            return None;
        }
        match riff_blob(&self.data[self.offset..]) {
            Ok(blob) => {
                self.offset += blob.len();
                Some(Ok(blob))
            }
            Err(e) => {
                self.offset = self.data.len();
                Some(Err(e))
            }
        }
    }
}

/// Decode a whole RIFF/WAVE blob at its native rate.
pub fn decode_wav(data: &[u8]) -> Result<DecodedPcm> {
    let blob = riff_blob(data)?;
    let mut hint = Hint::new();
    hint.with_extension("wav");
    let decoder = AudioStreamDecoder::open(Box::new(Cursor::new(blob.to_vec())), hint, None)?;

    let channels = decoder.channels();
    let mut samples = Vec::new();
    let mut chunk = vec![0i16; 4096 * channels as usize];

    while let Some(packet) = decoder.next_packet()? {
        decoder.push(&packet)?;
        loop {
            let frames = decoder.read(&mut chunk, 4096);
            if frames == 0 {
                break;
            }
            samples.extend_from_slice(&chunk[..frames * channels as usize]);
        }
    }

    trace!(
        "Decoded WAV blob: {} frames, {} channels, {}Hz",
        samples.len() / channels as usize,
        channels,
        decoder.sample_rate()
    );

    Ok(DecodedPcm {
        samples,
        channels,
        sample_rate: decoder.sample_rate(),
    })
}
