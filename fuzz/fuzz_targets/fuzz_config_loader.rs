#![no_main]
use libfuzzer_sys::fuzz_target;
use linact_core::mocks::{FlagSwitch, ScriptedChannel};
use linact_core::{Controller, Switches};

// Arbitrary TOML must fail to parse, fail validation, or produce a config
// the controller builder accepts. The two checks must never disagree.
fuzz_target!(|data: &str| {
    let Ok(cfg) = linact_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    let switches = Switches::new(
        FlagSwitch::new(true),
        FlagSwitch::new(false),
        FlagSwitch::new(false),
        FlagSwitch::new(true),
    );
    let built = Controller::builder()
        .with_channel(ScriptedChannel::new())
        .with_switches(switches)
        .with_config(&cfg)
        .build();
    if let Err(e) = built {
        panic!("validated config rejected by the controller: {e:?}");
    }
});
