use linact_core::profile::{linear_ramp, s_curve};
use proptest::prelude::*;
use rstest::rstest;

#[test]
fn reference_accel_ramp() {
    let steps = 50;
    let max_speed = 0.055f32;
    let r = linear_ramp(500.0, max_speed / steps as f32, steps);
    assert_eq!(r.positions.len(), 51);
    let inc = max_speed / steps as f32;
    for w in r.velocities.windows(2) {
        assert!((w[1] - w[0] - inc).abs() < 1e-6);
        assert!(w[1].abs() > w[0].abs());
    }
}

#[rstest]
#[case(0.0, 10.0, 2, &[0.0, 7.616, 9.640])]
#[case(5.0, 5.0, 3, &[5.0, 5.0, 5.0, 5.0])]
#[case(1.0, 2.0, 0, &[1.0])]
fn s_curve_table(#[case] start: f32, #[case] end: f32, #[case] n: usize, #[case] want: &[f32]) {
    let got = s_curve(start, end, n);
    assert_eq!(got.len(), want.len());
    for (g, w) in got.iter().zip(want) {
        assert!((g - w).abs() < 1e-3, "{got:?} vs {want:?}");
    }
}

proptest! {
    #[test]
    fn ramp_has_steps_plus_one_points(steps in 1usize..100, speed in 0.5f32..5.0, forward in any::<bool>()) {
        let sign = if forward { -1.0 } else { 1.0 };
        let r = linear_ramp(500.0, sign * speed / steps as f32, steps);
        prop_assert_eq!(r.positions.len(), steps + 1);
        prop_assert_eq!(r.velocities.len(), steps + 1);
        prop_assert_eq!(r.positions[0], 500.0);
        prop_assert!((r.velocities[steps].abs() - speed).abs() <= speed * 1e-3);
        for w in r.positions.windows(2) {
            if forward { prop_assert!(w[1] < w[0]); } else { prop_assert!(w[1] > w[0]); }
        }
    }

    #[test]
    fn s_curve_is_monotone_and_stops_short(start in -5.0f32..5.0, span in 0.1f32..10.0, n in 1usize..200) {
        let end = start + span;
        let v = s_curve(start, end, n);
        prop_assert_eq!(v.len(), n + 1);
        prop_assert!(v.windows(2).all(|w| w[1] >= w[0]));
        prop_assert!(v[n] < end);
        prop_assert!((v[n] - (start + 2.0f32.tanh() * span)).abs() < 1e-3);
    }
}
