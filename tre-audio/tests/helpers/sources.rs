//! Synthetic stream sources

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tre_audio::StreamSource;

/// Mono source producing `total_frames` frames with value `1 + frame % 100`.
///
/// Frames are counted in a shared counter so tests can observe how far the
/// voice has pulled the stream.
pub struct CountingSource {
    pub total_frames: usize,
    pub sample_rate: u32,
    pub cursor: usize,
    pub frames_read: Arc<AtomicUsize>,
    pub seeks: Arc<AtomicUsize>,
}

impl CountingSource {
    pub fn new(total_frames: usize, sample_rate: u32) -> Self {
        Self {
            total_frames,
            sample_rate,
            cursor: 0,
            frames_read: Arc::new(AtomicUsize::new(0)),
            seeks: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl StreamSource for CountingSource {
    fn read(&mut self, buffer: &mut [i16], frame_count: usize, looping: bool) -> tre_audio::Result<usize> {
        let mut produced = 0;
        while produced < frame_count {
            if self.cursor >= self.total_frames {
                if looping && self.total_frames > 0 {
                    self.cursor = 0;
                } else {
                    break;
                }
            }
            buffer[produced] = 1 + (self.cursor % 100) as i16;
            self.cursor += 1;
            produced += 1;
        }
        buffer[produced..frame_count].fill(0);
        self.frames_read.fetch_add(produced, Ordering::SeqCst);
        Ok(produced)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn position(&self) -> Duration {
        Duration::from_secs_f64(self.cursor as f64 / self.sample_rate as f64)
    }

    fn seek(&mut self, position: Duration) {
        self.seeks.fetch_add(1, Ordering::SeqCst);
        self.cursor = ((position.as_secs_f64() * self.sample_rate as f64) as usize).min(self.total_frames);
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(self.total_frames as f64 / self.sample_rate as f64))
    }
}
