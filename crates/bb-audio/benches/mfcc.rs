use std::hint::black_box;

use bb_audio::mfcc::{MfccExtractor, summarize};
use bb_audio::pipeline::Preprocessor;
use bb_core::config::{AudioConfig, GateConfig};
use criterion::{Criterion, criterion_group, criterion_main};

fn noise(len: usize) -> Vec<f32> {
    // LCG, deterministic across runs
    let mut state = 0x2545_f491_u32;
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0
        })
        .collect()
}

fn bench_mfcc(c: &mut Criterion) {
    let audio = AudioConfig::default();
    let rate = audio.target_sample_rate;
    let extractor = MfccExtractor::new(&audio, rate);
    let clip = noise(rate as usize * 2);

    c.bench_function("mfcc_2s_22050", |b| {
        b.iter(|| {
            let m = extractor.frames(black_box(&clip));
            black_box(summarize(&m, audio.pooling))
        });
    });
}

fn bench_prepare(c: &mut Criterion) {
    let pre = Preprocessor::new(AudioConfig::default());
    let gates = GateConfig::default();
    let bytes: Vec<u8> = noise(32_000)
        .iter()
        .flat_map(|s| ((s * 0.5 * 32767.0) as i16).to_le_bytes())
        .collect();

    c.bench_function("prepare_2s_s16le_16k", |b| {
        b.iter(|| pre.prepare(black_box(&bytes), &gates));
    });
}

criterion_group!(benches, bench_mfcc, bench_prepare);
criterion_main!(benches);
