mod common;

use common::rig;
use linact_core::OperationalState::{
    Extended, Extending, Homed, Homing, Sheathing, WaitingToExtend, WaitingToHome,
};
use linact_hardware::SimParams;

#[test]
fn full_cycle_against_simulated_bridge() {
    let mut r = rig(SimParams::default());
    r.activate.set(true);

    let seen = r.tick_until(Homed, 10);
    assert_eq!(seen, vec![Homing, Homed]);

    let seen = r.tick_until(Extended, 10);
    assert_eq!(seen, vec![WaitingToExtend, Extending, Extended]);
    assert!(r.bridge.physical_position() <= 479.6);
    assert!(r.bridge.physical_position() > 479.0);
    assert!(!r.controller.session().obstructed);
    let end = r.controller.session().last_phase_end.unwrap_or(f32::NAN);
    assert!(end <= 479.6 && end > 479.0, "extend ended at {end}");

    let seen = r.tick_until(Homed, 10);
    assert_eq!(seen, vec![Sheathing, Homing, Homed]);
    assert!(r.bridge.physical_position() >= 500.0);
    assert!(r.bridge.physical_position() <= 500.3);

    assert_eq!(r.bridge.overlapped_writes(), 0);
    assert_eq!(r.controller.link().parse_failures(), 0);
}

#[test]
fn holds_while_waiting_for_activation() {
    let mut r = rig(SimParams::default());
    r.tick_until(WaitingToExtend, 10);
    let before = r.bridge.frames();
    for _ in 0..5 {
        assert_eq!(r.controller.tick().unwrap(), WaitingToExtend);
    }
    assert_eq!(r.bridge.frames() - before, 5);
    let last = r.bridge.history().pop().unwrap_or_default();
    assert!(last.starts_with("can send 8001 01000a0c0220"));
    assert!((r.bridge.physical_position() - 500.0).abs() < 1e-3);
}

#[test]
fn away_from_home_waits_for_activation() {
    let mut r = rig(SimParams {
        start_position: 495.0,
        ..SimParams::default()
    });
    assert_eq!(r.controller.tick().unwrap(), WaitingToHome);
    assert_eq!(r.controller.tick().unwrap(), WaitingToHome);
    r.activate.set(true);
    let seen = r.tick_until(Homed, 5);
    assert_eq!(seen, vec![Homing, Homed]);
    assert!(r.bridge.physical_position() >= 500.0);
}

#[test]
fn jam_during_extension_recovers_and_rehomes() {
    let mut r = rig(SimParams {
        jam_at: Some(490.0),
        ..SimParams::default()
    });
    r.activate.set(true);
    r.tick_until(Extended, 10);
    assert!(r.controller.session().obstructed);
    // Backed off the obstacle, not pressed against it.
    assert!(r.bridge.physical_position() > 490.5);
    assert!(r.bridge.physical_position() < 491.0);

    let seen = r.tick_until(WaitingToHome, 5);
    assert_eq!(seen, vec![Sheathing, WaitingToHome]);

    let seen = r.tick_until(Homed, 5);
    assert_eq!(seen, vec![Homing, Homed]);
    assert_eq!(r.bridge.overlapped_writes(), 0);
}

#[test]
fn garbled_replies_do_not_derail_the_cycle() {
    let mut r = rig(SimParams {
        garble_every: Some(7),
        ..SimParams::default()
    });
    r.activate.set(true);
    r.tick_until(Extended, 12);
    r.tick_until(Homed, 10);
    assert!(r.controller.link().parse_failures() > 0);
    assert!(!r.controller.session().obstructed);
}

#[test]
fn change_max_speed_applies_to_both_directions() {
    let mut r = rig(SimParams::default());
    r.controller.change_max_speed(0.08).unwrap();
    assert_eq!(r.controller.control().profiles.forward.max_speed, 0.08);
    assert_eq!(r.controller.control().profiles.reverse.max_speed, 0.08);
    assert!(r.controller.change_max_speed(-1.0).is_err());
    assert_eq!(r.controller.control().profiles.forward.max_speed, 0.08);
}
