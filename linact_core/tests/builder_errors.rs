use linact_core::error::BuildError;
use linact_core::mocks::{FlagSwitch, ScriptedChannel};
use linact_core::{Controller, MotionProfiles, PositionWindow, Switches};
use rstest::rstest;

fn switches() -> Switches {
    Switches::new(
        FlagSwitch::new(true),
        FlagSwitch::new(false),
        FlagSwitch::new(false),
        FlagSwitch::new(true),
    )
}

#[rstest]
fn builder_missing_channel_yields_typed_build_error() {
    let err = Controller::<ScriptedChannel>::builder()
        .with_switches(switches())
        .try_build()
        .expect_err("should fail with MissingChannel");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingChannel) => {}
        other => panic!("expected MissingChannel, got: {other:?}"),
    }
}

#[rstest]
fn builder_missing_switches_yields_typed_build_error() {
    let err = Controller::builder()
        .with_channel(ScriptedChannel::new())
        .try_build()
        .expect_err("should fail with MissingSwitches");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingSwitches) => {}
        other => panic!("expected MissingSwitches, got: {other:?}"),
    }
}

#[rstest]
#[case::zero_speed(|p: &mut MotionProfiles| p.forward.max_speed = 0.0)]
#[case::nan_speed(|p: &mut MotionProfiles| p.reverse.max_speed = f32::NAN)]
#[case::no_accel(|p: &mut MotionProfiles| p.forward.accel_steps = 0)]
#[case::cruise_outside_window(|p: &mut MotionProfiles| p.forward.cruise_end_position = 400.0)]
#[case::zero_stall_threshold(|p: &mut MotionProfiles| p.reverse.stall_torque_threshold = 0.0)]
fn builder_rejects_inconsistent_motion(#[case] tweak: fn(&mut MotionProfiles)) {
    let mut profiles = MotionProfiles::default();
    tweak(&mut profiles);
    let err = Controller::builder()
        .with_channel(ScriptedChannel::new())
        .with_switches(switches())
        .with_profiles(profiles)
        .build()
        .expect_err("should fail with InvalidConfig");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[rstest]
fn builder_rejects_empty_window() {
    let err = Controller::builder()
        .with_channel(ScriptedChannel::new())
        .with_switches(switches())
        .with_window(PositionWindow {
            home_reference: 500.0,
            half_width: 0.0,
        })
        .build()
        .expect_err("should fail with InvalidConfig");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[rstest]
fn defaults_build_and_start_initial() {
    let c = Controller::builder()
        .with_channel(ScriptedChannel::new())
        .with_switches(switches())
        .with_config(&linact_config::Config::default())
        .build()
        .unwrap_or_else(|e| panic!("default config should build: {e:?}"));
    assert_eq!(c.state(), linact_core::OperationalState::Initial);
    assert_eq!(c.session().commanded_position, 500.0);
}
