//! Stream decode throughput
//!
//! Measures how fast a [`DecoderStreamSource`] turns an in-memory WAV into
//! 16-bit PCM, with and without resampling, plus the mixer cost of rendering
//! a full ring of streaming buffers.
//!
//! A streaming voice needs one buffer of `stream_buffer_frames` per buffer
//! period; anything above ~10x realtime leaves the drain thread idle.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hound::{WavSpec, WavWriter};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tre_audio::platform::Context;
use tre_audio::{DecoderStreamSource, StreamSource, StreamVoice};

const SOURCE_RATE: u32 = 44100;
const SECONDS: u32 = 10;
const READ_FRAMES: usize = 8192;

fn sine_wav(seconds: u32) -> Vec<u8> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: SOURCE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec).expect("wav writer");
        for i in 0..SOURCE_RATE * seconds {
            let t = i as f32 / SOURCE_RATE as f32;
            let sample = ((2.0 * std::f32::consts::PI * 440.0 * t).sin() * 16000.0) as i16;
            writer.write_sample(sample).expect("write");
            writer.write_sample(sample).expect("write");
        }
        writer.finalize().expect("finalize");
    }
    bytes
}

fn drain(source: &mut DecoderStreamSource, buf: &mut [i16]) -> usize {
    let mut total = 0;
    loop {
        let n = source.read(buf, READ_FRAMES, false).expect("read");
        total += n;
        if n < READ_FRAMES {
            return total;
        }
    }
}

fn bench_decode(c: &mut Criterion) {
    let wav = sine_wav(SECONDS);
    let mut group = c.benchmark_group("decode_throughput");
    group.sample_size(20);
    group.throughput(Throughput::Elements((SOURCE_RATE * SECONDS) as u64));

    for output_rate in [None, Some(22050), Some(48000)] {
        let label = output_rate.map_or_else(|| "native".to_string(), |r| r.to_string());
        group.bench_with_input(BenchmarkId::new("wav_44100", label), &output_rate, |b, rate| {
            let mut buf = vec![0i16; READ_FRAMES * 2];
            b.iter(|| {
                let mut source =
                    DecoderStreamSource::from_memory(wav.clone(), Some("wav"), *rate).expect("open");
                black_box(drain(&mut source, &mut buf))
            });
        });
    }
    group.finish();
}

fn bench_stream_ring(c: &mut Criterion) {
    let wav = sine_wav(2);
    let mut group = c.benchmark_group("stream_ring");

    for buffer_frames in [1024usize, 8192] {
        group.throughput(Throughput::Elements(buffer_frames as u64));
        group.bench_with_input(
            BenchmarkId::new("render_and_refill", buffer_frames),
            &buffer_frames,
            |b, &frames| {
                let context = Arc::new(Context::new(SOURCE_RATE));
                let source =
                    DecoderStreamSource::from_memory(wav.clone(), Some("wav"), None).expect("open");
                let voice = StreamVoice::new(Arc::clone(&context), Box::new(source), frames, 4, Duration::ZERO)
                    .expect("voice");
                voice.set_looping(true);
                let mut out = vec![0.0f32; frames * 2];

                b.iter(|| {
                    context.render(&mut out, 2);
                    voice.update().expect("update");
                    black_box(out[0])
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_decode, bench_stream_ring);
criterion_main!(benches);
