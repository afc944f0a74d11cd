//! Stream sources feeding streaming voices
//!
//! [`StreamSource`] is the seam between a [`crate::StreamVoice`] and whatever
//! produces its PCM. [`DecoderStreamSource`] wraps an
//! [`AudioStreamDecoder`] and can be opened on a file, an in-memory blob or a
//! section of a larger archive file.

use crate::decoder::AudioStreamDecoder;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;
use symphonia::core::formats::Packet;
use symphonia::core::io::MediaSource;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Producer of interleaved 16-bit PCM for a streaming voice.
pub trait StreamSource: Send {
    /// Fill `buffer` with up to `frame_count` frames.
    ///
    /// With `looping` set, the source restarts from the beginning when it
    /// runs out. Frames not produced are zero-filled. Returns the number of
    /// frames produced.
    fn read(&mut self, buffer: &mut [i16], frame_count: usize, looping: bool) -> Result<usize>;

    fn channels(&self) -> u16;

    fn sample_rate(&self) -> u32;

    fn position(&self) -> Duration;

    fn seek(&mut self, position: Duration);

    fn duration(&self) -> Option<Duration>;
}

/// Stream source backed by an [`AudioStreamDecoder`].
pub struct DecoderStreamSource {
    decoder: AudioStreamDecoder,
    /// Packet read while the queue was full; pushed before reading another
    stash: Option<Packet>,
    at_end: bool,
}

impl DecoderStreamSource {
    pub fn new(decoder: AudioStreamDecoder) -> Self {
        Self {
            decoder,
            stash: None,
            at_end: false,
        }
    }

    /// Stream a standalone audio file.
    pub fn from_file(path: &Path, output_rate: Option<u32>) -> Result<Self> {
        Ok(Self::new(AudioStreamDecoder::from_path(path, output_rate)?))
    }

    /// Stream an in-memory encoded blob.
    ///
    /// # Arguments
    /// - `data`: Complete encoded file contents
    /// - `extension`: Format hint such as `"wav"` or `"ogg"`
    pub fn from_memory(data: Vec<u8>, extension: Option<&str>, output_rate: Option<u32>) -> Result<Self> {
        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }
        let decoder = AudioStreamDecoder::open(Box::new(Cursor::new(data)), hint, output_rate)?;
        Ok(Self::new(decoder))
    }

    /// Stream a track stored at `[offset, offset + len)` inside an archive.
    pub fn from_file_section(
        path: &Path,
        offset: u64,
        len: u64,
        extension: Option<&str>,
        output_rate: Option<u32>,
    ) -> Result<Self> {
        debug!(
            "Opening {} bytes at offset {} of {}",
            len,
            offset,
            path.display()
        );
        let section = FileSection::open(path, offset, len)?;
        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }
        let decoder = AudioStreamDecoder::open(Box::new(section), hint, output_rate)?;
        Ok(Self::new(decoder))
    }

    pub fn decoder(&self) -> &AudioStreamDecoder {
        &self.decoder
    }

    /// Move packets into the decoder until its queue is full or the stream ends.
    fn feed(&mut self) -> Result<()> {
        while !self.at_end {
            let packet = match self.stash.take() {
                Some(packet) => packet,
                None => match self.decoder.next_packet()? {
                    Some(packet) => packet,
                    None => {
                        if self.decoder.finish()? {
                            trace!("Stream source drained");
                            self.at_end = true;
                        }
                        break;
                    }
                },
            };

            if !self.decoder.push(&packet)? && packet.track_id() == self.decoder.track_id() {
                self.stash = Some(packet);
                break;
            }
        }
        Ok(())
    }
}

impl StreamSource for DecoderStreamSource {
    fn read(&mut self, buffer: &mut [i16], frame_count: usize, looping: bool) -> Result<usize> {
        let channels = self.decoder.channels() as usize;
        let frame_count = frame_count.min(buffer.len() / channels);
        let mut produced = 0;
        let mut restarted = false;

        while produced < frame_count {
            self.feed()?;
            let n = self
                .decoder
                .read(&mut buffer[produced * channels..], frame_count - produced);
            produced += n;
            if n > 0 {
                restarted = false;
            }

            if produced >= frame_count || !self.at_end || self.decoder.queued_chunks() > 0 {
                continue;
            }
            // Stream exhausted; an empty stream must not restart forever
            if !looping || restarted {
                break;
            }
            self.seek(Duration::ZERO);
            restarted = true;
        }

        Ok(produced)
    }

    fn channels(&self) -> u16 {
        self.decoder.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.decoder.sample_rate()
    }

    fn position(&self) -> Duration {
        self.decoder.position()
    }

    fn seek(&mut self, position: Duration) {
        self.stash = None;
        self.at_end = false;
        self.decoder.seek(position);
    }

    fn duration(&self) -> Option<Duration> {
        self.decoder.duration()
    }
}

/// Read-only window onto a byte range of a file.
///
/// Lets a track packed inside an archive be probed and seeked as if it were a
/// standalone file.
pub struct FileSection {
    file: File,
    start: u64,
    len: u64,
    pos: u64,
}

impl FileSection {
    pub fn open(path: &Path, start: u64, len: u64) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();
        if start.checked_add(len).map_or(true, |end| end > file_len) {
            return Err(Error::InvalidInput(format!(
                "Section [{}, {}) exceeds file length {} of {}",
                start,
                start.saturating_add(len),
                file_len,
                path.display()
            )));
        }
        file.seek(SeekFrom::Start(start))?;
        Ok(Self {
            file,
            start,
            len,
            pos: 0,
        })
    }
}

impl Read for FileSection {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = self.len.saturating_sub(self.pos) as usize;
        let n = buf.len().min(remaining);
        if n == 0 {
            return Ok(0);
        }
        let read = self.file.read(&mut buf[..n])?;
        self.pos += read as u64;
        Ok(read)
    }
}

impl Seek for FileSection {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek before start of file section",
            )
        })?;

        self.file.seek(SeekFrom::Start(self.start + target))?;
        self.pos = target;
        Ok(target)
    }
}

impl MediaSource for FileSection {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn section_fixture() -> (tempfile::NamedTempFile, FileSection) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"HEADERpayload-bytesTRAILER").unwrap();
        file.flush().unwrap();
        let section = FileSection::open(file.path(), 6, 13).unwrap();
        (file, section)
    }

    #[test]
    fn test_section_reads_only_its_range() {
        let (_file, mut section) = section_fixture();
        let mut contents = String::new();
        section.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "payload-bytes");
    }

    #[test]
    fn test_section_seek_is_relative() {
        let (_file, mut section) = section_fixture();
        assert_eq!(section.seek(SeekFrom::End(-5)).unwrap(), 8);
        let mut tail = String::new();
        section.read_to_string(&mut tail).unwrap();
        assert_eq!(tail, "bytes");
        assert!(section.seek(SeekFrom::Current(-100)).is_err());
        assert_eq!(section.byte_len(), Some(13));
    }

    #[test]
    fn test_section_out_of_bounds_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"short").unwrap();
        assert!(FileSection::open(file.path(), 2, 10).is_err());
    }
}
