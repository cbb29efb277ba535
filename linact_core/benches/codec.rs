use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use linact_core::codec::{decode_reply, encode_f32, write_and_query};
use linact_core::mocks::{Reply, ScriptedChannel};
use linact_core::{ControlLoop, Direction, Link, Session};
use linact_traits::clock::test_clock::TestClock;

fn reply(p: f32, v: f32, t: f32) -> Vec<u8> {
    format!(
        "OK\r\nrcv 100 230301{}{}{}\r\n",
        encode_f32(p),
        encode_f32(v),
        encode_f32(t)
    )
    .into_bytes()
}

pub fn bench_codec(c: &mut Criterion) {
    let mut g = c.benchmark_group("codec");
    // BENCH_SAMPLE_SIZE=10 cargo bench -p linact_core --bench codec
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(10));
        }
    }

    g.bench_function("encode_write_and_query", |b| {
        b.iter(|| write_and_query(black_box(Some(498.25)), black_box(None)))
    });

    let buf = reply(498.25, -0.055, 0.04);
    g.bench_function("decode_reply", |b| b.iter(|| decode_reply(black_box(&buf))));
    g.finish();
}

pub fn bench_cruise(c: &mut Criterion) {
    // Whole cruise phase (about 360 ticks) against a scripted bridge with a virtual clock.
    c.bench_function("cruise_forward_scripted", |b| {
        b.iter_batched(
            || {
                let ch = ScriptedChannel::new();
                ch.push_many((1..=400).map(|i| Reply::sample(500.0 - i as f32 * 0.055, -0.055, 0.05)));
                (
                    Link::new(ch, Arc::new(TestClock::new())),
                    Session::new(500.0),
                )
            },
            |(mut link, mut session)| {
                let out = ControlLoop::default().cruise(&mut link, &mut session, Direction::Forward);
                black_box(out.is_ok())
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_codec, bench_cruise);
criterion_main!(benches);
