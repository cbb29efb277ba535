mod common;

use std::sync::Arc;

use common::rig;
use linact_core::mocks::{FlagSwitch, Reply, ScriptedChannel};
use linact_core::{
    ControlLoop, Link, MotionProfiles, PositionWindow, SensedConfig, Session, Switches, Timing,
    profile,
};
use linact_hardware::SimParams;
use linact_traits::clock::test_clock::TestClock;

fn control() -> ControlLoop {
    ControlLoop::new(
        MotionProfiles::default(),
        SensedConfig::default(),
        PositionWindow::default(),
        Timing::default(),
    )
}

fn switches(extend_limit: &FlagSwitch) -> Switches {
    Switches::new(
        FlagSwitch::new(false),
        extend_limit.clone(),
        FlagSwitch::new(false),
        FlagSwitch::new(true),
    )
}

fn link(ch: &ScriptedChannel) -> Link<ScriptedChannel> {
    Link::new(ch.clone(), Arc::new(TestClock::new()))
}

#[test]
fn acceleration_stops_at_torque_limit() {
    let ch = ScriptedChannel::new().with_fallback(Reply::sample(495.0, -1.0, 0.1));
    ch.push_many([
        Reply::sample(495.0, -0.5, 0.1),
        Reply::sample(494.0, -1.0, 0.6),
    ]);
    let mut session = Session::new(500.0);
    let limit = FlagSwitch::new(false);
    let reached = control()
        .sensed_acceleration(
            &mut link(&ch),
            &mut session,
            &mut switches(&limit),
            0.0,
            -4.0,
            6,
            490.0,
        )
        .unwrap();
    let curve = profile::s_curve(0.0, -4.0, 6);
    assert_eq!(reached, curve[1]);
    assert_eq!(ch.queries(), 2);
    assert_eq!(session.torque_trace(), &[0.1, 0.6]);
}

#[test]
fn implausible_samples_neither_stop_nor_trace() {
    // 499 is 19 away from the goal, outside the 15-unit band.
    let ch = ScriptedChannel::new().with_fallback(Reply::sample(499.0, -1.0, 0.9));
    let mut session = Session::new(500.0);
    let limit = FlagSwitch::new(false);
    let reached = control()
        .sensed_acceleration(
            &mut link(&ch),
            &mut session,
            &mut switches(&limit),
            0.0,
            -4.0,
            4,
            480.0,
        )
        .unwrap();
    let curve = profile::s_curve(0.0, -4.0, 4);
    assert_eq!(reached, curve[4]);
    assert_eq!(ch.queries(), 5);
    assert!(session.torque_trace().is_empty());
    assert_eq!(session.current_position, 500.0);
}

#[test]
fn extend_limit_cuts_acceleration_short() {
    let ch = ScriptedChannel::new().with_fallback(Reply::sample(485.0, -1.0, 0.1));
    let mut session = Session::new(500.0);
    let limit = FlagSwitch::new(true);
    control()
        .sensed_acceleration(
            &mut link(&ch),
            &mut session,
            &mut switches(&limit),
            0.0,
            -4.0,
            10,
            480.0,
        )
        .unwrap();
    assert_eq!(ch.queries(), 1);
}

#[test]
fn maintain_runs_until_goal_passed() {
    let ch = ScriptedChannel::new();
    ch.push_many([
        Reply::sample(490.0, -2.0, 0.1),
        // Far outside the band; ignored even though it is past the goal.
        Reply::sample(460.0, -2.0, 0.1),
        Reply::Silent,
        Reply::sample(484.0, -2.0, 0.1),
        Reply::sample(479.5, -2.0, 0.1),
    ]);
    let mut session = Session::new(500.0);
    let limit = FlagSwitch::new(false);
    let end = control()
        .maintain_velocity(&mut link(&ch), &mut session, &mut switches(&limit), -2.0, 480.0)
        .unwrap();
    assert_eq!(end, 479.5);
    assert_eq!(ch.queries(), 5);
    assert_eq!(session.torque_trace(), &[0.1, 0.1, 0.1]);
}

#[test]
fn maintain_stops_on_torque_limit() {
    let ch = ScriptedChannel::new();
    ch.push_many([
        Reply::sample(490.0, -2.0, 0.3),
        Reply::sample(489.0, -2.0, 0.85),
        Reply::sample(488.0, -2.0, 0.1),
    ]);
    let mut session = Session::new(500.0);
    let limit = FlagSwitch::new(false);
    let end = control()
        .maintain_velocity(&mut link(&ch), &mut session, &mut switches(&limit), -2.0, 480.0)
        .unwrap();
    assert_eq!(end, 489.0);
    assert_eq!(ch.queries(), 2);
}

#[test]
fn maintain_in_reverse_targets_larger_positions() {
    let ch = ScriptedChannel::new();
    ch.push_many([
        Reply::sample(495.0, 2.0, 0.1),
        Reply::sample(500.2, 2.0, 0.1),
    ]);
    let mut session = Session::new(490.0);
    let limit = FlagSwitch::new(false);
    let end = control()
        .maintain_velocity(&mut link(&ch), &mut session, &mut switches(&limit), 2.0, 500.0)
        .unwrap();
    assert_eq!(end, 500.2);
    // Velocity-mode frames leave the position field at NaN.
    let written = ch.written();
    assert!(written.iter().all(|l| l.starts_with("can send 8001 01000a0c02200000c07f")));
}

#[test]
fn jam_short_of_unreachable_goal_stops_the_hold() {
    // Pinned at the mechanical stop, 19.7 from the goal: implausible but in
    // the window, so the jam torque still ends the hold.
    let ch = ScriptedChannel::new().with_fallback(Reply::sample(500.3, 0.0, 0.9));
    let mut session = Session::new(500.0);
    let limit = FlagSwitch::new(false);
    let end = control()
        .maintain_velocity(&mut link(&ch), &mut session, &mut switches(&limit), 1.0, 520.0)
        .unwrap();
    assert_eq!(ch.queries(), 1);
    assert_eq!(end, 500.0);
    assert!(session.torque_trace().is_empty());
}

#[test]
fn out_of_window_torque_does_not_end_the_hold() {
    let ch = ScriptedChannel::new();
    ch.push_many([
        Reply::sample(9.0e9, 2.0, 5.0),
        Reply::sample(505.0, 2.0, 0.1),
        Reply::sample(520.5, 2.0, 0.1),
    ]);
    let mut session = Session::new(500.0);
    let limit = FlagSwitch::new(false);
    let end = control()
        .maintain_velocity(&mut link(&ch), &mut session, &mut switches(&limit), 2.0, 520.0)
        .unwrap();
    assert_eq!(end, 520.5);
    assert_eq!(ch.queries(), 3);
}

#[test]
fn hold_gives_up_after_max_ticks() {
    // Low torque and never plausible: only the tick budget ends this.
    let ch = ScriptedChannel::new().with_fallback(Reply::sample(500.3, 0.0, 0.01));
    let sensed = SensedConfig {
        max_ticks: 25,
        ..SensedConfig::default()
    };
    let control = ControlLoop::new(
        MotionProfiles::default(),
        sensed,
        PositionWindow::default(),
        Timing::default(),
    );
    let mut session = Session::new(500.0);
    let limit = FlagSwitch::new(false);
    let end = control
        .maintain_velocity(&mut link(&ch), &mut session, &mut switches(&limit), 1.0, 520.0)
        .unwrap();
    assert_eq!(ch.queries(), 25);
    assert_eq!(end, 500.0);
}

#[test]
fn sensed_move_toward_unreachable_goal_returns_at_the_stop() {
    let mut r = rig(SimParams::default());
    let end = r.controller.sensed_move(0.0, 1.0, 10, 520.0).unwrap();
    assert!((r.bridge.physical_position() - 500.3).abs() < 1e-3);
    assert!(end <= 500.3);
    // Well inside the default budget: the jam, not the budget, stopped it.
    assert!(r.bridge.frames() < 1_000, "ran {} frames", r.bridge.frames());
    assert_eq!(r.bridge.overlapped_writes(), 0);
}
