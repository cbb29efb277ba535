use std::sync::Arc;
use std::time::Duration;

use linact_core::mocks::{Reply, ScriptedChannel};
use linact_core::query::{VALID_QUERY_ATTEMPTS, triple_query, valid_query};
use linact_core::{Link, PositionWindow};
use linact_traits::clock::test_clock::TestClock;

const PERIOD: Duration = Duration::from_micros(900);

fn link(ch: &ScriptedChannel) -> (Link<ScriptedChannel>, Arc<TestClock>) {
    let clock = Arc::new(TestClock::new());
    (Link::new(ch.clone(), clock.clone()), clock)
}

#[test]
fn gives_up_after_bounded_attempts() {
    let ch = ScriptedChannel::new().with_fallback(Reply::sample(9000.0, 0.0, 0.0));
    let (mut link, clock) = link(&ch);
    let got = valid_query(&mut link, &PositionWindow::default(), PERIOD).unwrap();
    assert!(got.is_none());
    assert_eq!(ch.queries(), VALID_QUERY_ATTEMPTS as usize);
    assert_eq!(clock.elapsed(), PERIOD * VALID_QUERY_ATTEMPTS);
}

#[test]
fn skips_garbled_and_out_of_window_replies() {
    let ch = ScriptedChannel::new();
    ch.push_many([
        Reply::Raw(b"OK\r\nrcv 100 230301zzzzzzzz0000000000000000\r\n".to_vec()),
        Reply::Silent,
        Reply::sample(f32::NAN, 0.0, 0.0),
        Reply::sample(497.5, 0.0, 0.02),
    ]);
    let (mut link, _) = link(&ch);
    let got = valid_query(&mut link, &PositionWindow::default(), PERIOD)
        .unwrap()
        .expect("fourth attempt is valid");
    assert_eq!(got.position, 497.5);
    assert_eq!(ch.queries(), 4);
    assert_eq!(link.parse_failures(), 2);
    assert!(ch.written().iter().all(|l| l == "can send 8001 1c0301"));
}

#[test]
fn triple_query_retries_whole_batches() {
    let ch = ScriptedChannel::new();
    ch.push_many([
        Reply::sample(1.0, 0.0, 0.0),
        Reply::sample(2.0, 0.0, 0.0),
        Reply::sample(3.0, 0.0, 0.0),
        Reply::sample(4.0, 0.0, 0.0),
        Reply::sample(505.0, 0.0, 0.0),
        Reply::sample(501.0, 0.0, 0.0),
    ]);
    let (mut link, _) = link(&ch);
    let got = triple_query(&mut link, &PositionWindow::default(), PERIOD).unwrap();
    assert_eq!(got.position, 505.0);
    assert_eq!(ch.queries(), 6);
    assert_eq!(ch.overlapped_writes(), 0);
}
