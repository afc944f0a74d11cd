//! Decoder queue and stream source tests on generated WAV fixtures

mod helpers;

use helpers::{generate_ramp_wav, generate_sine_wav, ramp_sample, wav_bytes};
use std::io::Write;
use std::time::Duration;
use symphonia::core::formats::Packet;
use tempfile::TempDir;
use tre_audio::{AudioStreamDecoder, DecoderStreamSource, StreamSource, QUEUE_LIMIT};

/// Push packets until the queue refuses one or the stream ends.
fn fill_queue(decoder: &AudioStreamDecoder) -> bool {
    while let Some(packet) = decoder.next_packet().unwrap() {
        if !decoder.push(&packet).unwrap() {
            return true;
        }
    }
    false
}

#[test]
fn test_queue_is_bounded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("long.wav");
    generate_sine_wav(&path, 10_000, 440.0, 0.5, 44100).unwrap();

    let decoder = AudioStreamDecoder::from_path(&path, None).unwrap();
    assert!(fill_queue(&decoder), "queue never filled");
    assert_eq!(decoder.queued_chunks(), QUEUE_LIMIT);
    assert!(decoder.is_full());

    // Draining one chunk lets the next push through
    let frames = decoder.queued_frames() / QUEUE_LIMIT;
    let mut buf = vec![0i16; 2 * 4096];
    decoder.read(&mut buf, frames.max(1));
    let packet = decoder.next_packet().unwrap().unwrap();
    assert!(decoder.push(&packet).unwrap());
    assert!(decoder.queued_chunks() <= QUEUE_LIMIT);
}

#[test]
fn test_read_returns_exact_samples() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ramp.wav");
    generate_ramp_wav(&path, 3000, 1, 44100).unwrap();

    let decoder = AudioStreamDecoder::from_path(&path, None).unwrap();
    assert_eq!(decoder.channels(), 1);
    assert_eq!(decoder.sample_rate(), 44100);
    fill_queue(&decoder);

    let mut buf = vec![0i16; 1000];
    assert_eq!(decoder.read(&mut buf, 1000), 1000);
    for (i, sample) in buf.iter().enumerate() {
        assert_eq!(*sample, ramp_sample(i));
    }

    // Partially consumed chunks continue where they left off
    let mut buf = vec![0i16; 7];
    assert_eq!(decoder.read(&mut buf, 7), 7);
    assert_eq!(buf[0], ramp_sample(1000));
    assert_eq!(buf[6], ramp_sample(1006));
}

#[test]
fn test_read_zero_fills_past_queued_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.wav");
    generate_ramp_wav(&path, 500, 2, 44100).unwrap();

    let decoder = AudioStreamDecoder::from_path(&path, None).unwrap();
    assert_eq!(decoder.channels(), 2);
    fill_queue(&decoder);

    let mut buf = vec![123i16; 2 * 600];
    assert_eq!(decoder.read(&mut buf, 600), 500);
    assert_eq!(buf[2 * 499], ramp_sample(499));
    assert!(buf[2 * 500..].iter().all(|&s| s == 0));

    // Empty queue: nothing taken, buffer silenced
    let mut buf = vec![123i16; 20];
    assert_eq!(decoder.read(&mut buf, 10), 0);
    assert!(buf.iter().all(|&s| s == 0));
}

#[test]
fn test_seek_discards_queue() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("seek.wav");
    generate_ramp_wav(&path, 44100, 1, 44100).unwrap();

    let decoder = AudioStreamDecoder::from_path(&path, None).unwrap();
    fill_queue(&decoder);
    assert!(decoder.queued_chunks() > 0);

    decoder.seek(Duration::from_millis(500));
    assert_eq!(decoder.queued_chunks(), 0);
    let position = decoder.position();
    assert!(position <= Duration::from_millis(500));
    assert!(position >= Duration::from_millis(400));

    let packet = decoder.next_packet().unwrap().unwrap();
    assert!(decoder.push(&packet).unwrap());
    assert!(decoder.queued_chunks() > 0);
}

#[test]
fn test_foreign_packet_rejected() {
    let bytes = wav_bytes(1000, 1, 44100);
    let source = DecoderStreamSource::from_memory(bytes, Some("wav"), None).unwrap();
    let decoder = source.decoder();

    let foreign = Packet::new_from_slice(decoder.track_id() + 1, 0, 0, &[0u8; 16]);
    assert!(!decoder.push(&foreign).unwrap());
    assert_eq!(decoder.queued_chunks(), 0);
}

#[test]
fn test_duration_from_metadata() {
    let bytes = wav_bytes(22050, 1, 44100);
    let source = DecoderStreamSource::from_memory(bytes, Some("wav"), None).unwrap();
    let duration = source.duration().unwrap();
    assert!((duration.as_secs_f64() - 0.5).abs() < 1e-3);
}

#[test]
fn test_resampling_changes_output_rate() {
    for target in [22050u32, 48000] {
        let bytes = wav_bytes(44100, 2, 44100);
        let mut source = DecoderStreamSource::from_memory(bytes, Some("wav"), Some(target)).unwrap();
        assert_eq!(source.sample_rate(), target);
        assert_eq!(source.decoder().source_rate(), 44100);

        let mut total = 0;
        let mut buf = vec![0i16; 2 * 4096];
        loop {
            let n = source.read(&mut buf, 4096, false).unwrap();
            total += n;
            if n < 4096 {
                break;
            }
        }
        let expected = target as i64;
        assert!(
            (total as i64 - expected).abs() < 2048,
            "{} Hz produced {} frames",
            target,
            total
        );
    }
}

#[test]
fn test_stream_source_stops_without_looping() {
    let bytes = wav_bytes(500, 1, 44100);
    let mut source = DecoderStreamSource::from_memory(bytes, Some("wav"), None).unwrap();

    let mut buf = vec![55i16; 600];
    assert_eq!(source.read(&mut buf, 600, false).unwrap(), 500);
    assert!(buf[500..].iter().all(|&s| s == 0));
    assert_eq!(source.read(&mut buf, 600, false).unwrap(), 0);
}

#[test]
fn test_stream_source_loops_from_start() {
    let bytes = wav_bytes(500, 1, 44100);
    let mut source = DecoderStreamSource::from_memory(bytes, Some("wav"), None).unwrap();

    let mut buf = vec![0i16; 1200];
    assert_eq!(source.read(&mut buf, 1200, true).unwrap(), 1200);
    assert_eq!(buf[499], ramp_sample(499));
    assert_eq!(buf[500], ramp_sample(0));
    assert_eq!(buf[1000], ramp_sample(0));
}

#[test]
fn test_stream_source_seek_restarts_decoding() {
    let bytes = wav_bytes(4410, 1, 44100);
    let mut source = DecoderStreamSource::from_memory(bytes, Some("wav"), None).unwrap();

    let mut buf = vec![0i16; 4410];
    assert_eq!(source.read(&mut buf, 4410, false).unwrap(), 4410);
    source.seek(Duration::ZERO);
    assert_eq!(source.read(&mut buf, 10, false).unwrap(), 10);
    assert_eq!(buf[0], ramp_sample(0));
}

#[test]
fn test_file_section_streams_embedded_track() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("archive.bin");
    let track = wav_bytes(800, 1, 22050);
    {
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0xAB; 100]).unwrap();
        file.write_all(&track).unwrap();
        file.write_all(&[0xCD; 50]).unwrap();
    }

    let mut source =
        DecoderStreamSource::from_file_section(&path, 100, track.len() as u64, Some("wav"), None).unwrap();
    assert_eq!(source.sample_rate(), 22050);

    let mut buf = vec![0i16; 1000];
    assert_eq!(source.read(&mut buf, 1000, false).unwrap(), 800);
    assert_eq!(buf[0], ramp_sample(0));
    assert_eq!(buf[799], ramp_sample(799));
}

#[test]
fn test_file_section_out_of_range_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("small.bin");
    std::fs::write(&path, [0u8; 64]).unwrap();

    assert!(DecoderStreamSource::from_file_section(&path, 32, 64, Some("wav"), None).is_err());
}

#[test]
fn test_garbage_input_fails_to_open() {
    let result = DecoderStreamSource::from_memory(vec![0x42; 256], None, None);
    assert!(result.is_err());
}
