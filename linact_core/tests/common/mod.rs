//! Controller wired to the simulated bridge with a virtual clock.
#![allow(dead_code)]

use std::sync::Arc;

use linact_core::config::MachineConfig;
use linact_core::mocks::FlagSwitch;
use linact_core::{Controller, OperationalState, Switches};
use linact_hardware::{SimParams, SimulatedBridge};
use linact_traits::clock::test_clock::TestClock;

pub struct Rig {
    pub controller: Controller<SimulatedBridge>,
    pub bridge: SimulatedBridge,
    pub activate: FlagSwitch,
    pub safety: FlagSwitch,
}

pub fn rig(params: SimParams) -> Rig {
    rig_with_machine(params, MachineConfig::default())
}

pub fn rig_with_machine(params: SimParams, machine: MachineConfig) -> Rig {
    let bridge = SimulatedBridge::new(params);
    let activate = FlagSwitch::new(false);
    let safety = FlagSwitch::new(true);
    let switches = Switches::new(
        bridge.home_limit(),
        bridge.extend_limit(),
        activate.clone(),
        safety.clone(),
    );
    let controller = Controller::builder()
        .with_channel(bridge.clone())
        .with_switches(switches)
        .with_clock(Arc::new(TestClock::new()))
        .with_machine(machine)
        .build()
        .unwrap_or_else(|e| panic!("rig should build: {e:?}"));
    Rig {
        controller,
        bridge,
        activate,
        safety,
    }
}

impl Rig {
    /// Tick until `target` is reached; panics after `limit` ticks.
    pub fn tick_until(&mut self, target: OperationalState, limit: usize) -> Vec<OperationalState> {
        let mut seen = Vec::new();
        for _ in 0..limit {
            let s = self
                .controller
                .tick()
                .unwrap_or_else(|e| panic!("tick failed: {e:?}"));
            seen.push(s);
            if s == target {
                return seen;
            }
        }
        panic!("never reached {target}; saw {seen:?}");
    }
}
