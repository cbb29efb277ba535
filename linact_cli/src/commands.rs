//! Subcommand execution: controller assembly, the operations themselves,
//! and result reporting (pretty text or JSON lines on stdout).

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use eyre::WrapErr;
use linact_config::Config;
use linact_core::query::VALID_QUERY_ATTEMPTS;
use linact_core::{ActuatorSample, Controller, HomingOutcome, PhaseOutcome, profile};
use serde_json::{Map, Value, json};

use crate::backend::{self, Channel};
use crate::cli::{Cli, Commands, RtLock};
use crate::error_fmt::CommandError;
use crate::rt::setup_rt_once;

/// Emits one result per command: a JSON line, or plain text.
pub struct Reporter {
    json: bool,
    started: Instant,
}

impl Reporter {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            started: Instant::now(),
        }
    }

    pub fn emit(&self, command: &str, fields: Value, text: impl FnOnce() -> String) {
        if self.json {
            let mut obj = Map::new();
            let ts = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs());
            obj.insert("timestamp".into(), json!(ts));
            obj.insert("command".into(), json!(command));
            obj.insert(
                "duration_ms".into(),
                json!(u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)),
            );
            if let Value::Object(extra) = fields {
                obj.extend(extra);
            }
            println!("{}", Value::Object(obj));
        } else {
            println!("{}", text());
        }
    }
}

fn sample_json(s: &ActuatorSample) -> Value {
    json!({ "position": s.position, "velocity": s.velocity, "torque": s.torque })
}

fn outcome_name(o: PhaseOutcome) -> &'static str {
    match o {
        PhaseOutcome::Completed => "completed",
        PhaseOutcome::Obstructed => "obstructed",
    }
}

fn require_homed(outcome: HomingOutcome) -> eyre::Result<()> {
    if outcome.is_homed() {
        Ok(())
    } else {
        Err(CommandError::HomingFailed(outcome).into())
    }
}

fn interrupted(shutdown: &AtomicBool) -> eyre::Result<()> {
    if shutdown.load(Ordering::Relaxed) {
        eyre::bail!("interrupted");
    }
    Ok(())
}

pub fn execute(cli: &Cli, cfg: &Config, shutdown: Arc<AtomicBool>) -> eyre::Result<()> {
    let out = Reporter::new(cli.json);

    // Pure computation; no bridge needed.
    if let Commands::Ramp {
        start,
        end,
        points,
        drive: false,
        ..
    } = cli.cmd
    {
        let table = profile::s_curve(start, end, points);
        out.emit("ramp", json!({ "velocities": table }), || {
            table
                .iter()
                .enumerate()
                .map(|(i, v)| format!("{i:>4} {v:>10.5}"))
                .collect::<Vec<_>>()
                .join("\n")
        });
        return Ok(());
    }

    setup_rt_once(
        cli.rt,
        cli.rt_prio,
        cli.rt_lock.unwrap_or_else(RtLock::os_default),
        cli.rt_cpu,
    );

    let backend = backend::open(cfg, cli.io_thread)?;
    let (mut c, sim) = backend::controller(cfg, backend)?;
    let result = dispatch(cli, &mut c, &out, &shutdown);
    // Leave the actuator stopped whatever happened.
    c.shutdown();
    if let Some(bridge) = sim {
        tracing::debug!(
            physical = bridge.physical_position(),
            frames = bridge.frames(),
            overlapped = bridge.overlapped_writes(),
            "simulator at exit"
        );
    }
    result
}

fn dispatch(
    cli: &Cli,
    c: &mut Controller<Channel>,
    out: &Reporter,
    shutdown: &Arc<AtomicBool>,
) -> eyre::Result<()> {
    match &cli.cmd {
        Commands::Run {
            max_ticks,
            trace_out,
        } => run(c, out, shutdown, *max_ticks, trace_out.as_deref()),
        Commands::Home => {
            let outcome = c.home()?;
            out.emit("home", json!({ "outcome": format!("{outcome:?}") }), || {
                format!("home: {outcome:?}")
            });
            require_homed(outcome)
        }
        Commands::Extend => phase(c, out, "extend"),
        Commands::Retract => phase(c, out, "retract"),
        Commands::Cycle { count } => cycle(c, out, shutdown, *count),
        Commands::Sweep { speeds, runs, out: path } => {
            sweep(c, out, shutdown, speeds, *runs, path.as_deref())
        }
        Commands::Query { blocking } => {
            let sample = if *blocking {
                c.query_blocking()?
            } else {
                c.query()?
                    .ok_or(CommandError::NoSample(VALID_QUERY_ATTEMPTS))?
            };
            out.emit("query", sample_json(&sample), || {
                format!(
                    "position {:.4}  velocity {:.4}  torque {:.4}",
                    sample.position, sample.velocity, sample.torque
                )
            });
            Ok(())
        }
        Commands::Stop => {
            c.stop()?;
            out.emit("stop", json!({}), || "stop sent".into());
            Ok(())
        }
        Commands::Brake => {
            c.brake()?;
            out.emit("brake", json!({}), || "brake sent".into());
            Ok(())
        }
        Commands::Rezero { position } => {
            c.rezero(*position)?;
            out.emit("rezero", json!({ "position": position }), || {
                format!("origin redefined; position now reads {position}")
            });
            Ok(())
        }
        Commands::Ramp {
            start,
            end,
            points,
            goal,
            ..
        } => {
            let goal = goal.ok_or_else(|| CommandError::Config("--drive needs --goal".into()))?;
            if !c.control().window.contains(goal) {
                return Err(CommandError::Config(format!(
                    "goal {goal} lies outside the position window"
                ))
                .into());
            }
            let position = c.sensed_move(*start, *end, *points, goal)?;
            out.emit(
                "ramp",
                json!({ "goal": goal, "position": position }),
                || format!("sensed move stopped at {position:.4} (goal {goal})"),
            );
            Ok(())
        }
        Commands::Bench { ticks } => bench(c, out, *ticks),
        Commands::SelfCheck => self_check(c, out),
    }
}

fn run(
    c: &mut Controller<Channel>,
    out: &Reporter,
    shutdown: &Arc<AtomicBool>,
    max_ticks: Option<u64>,
    trace_out: Option<&Path>,
) -> eyre::Result<()> {
    tracing::info!(?max_ticks, "state machine start");
    let stop = Arc::clone(shutdown);
    let ticks = c.run(move || stop.load(Ordering::Relaxed), max_ticks)?;
    if let Some(path) = trace_out {
        write_trace(path, c.session().torque_trace())?;
    }
    let s = c.session();
    out.emit(
        "run",
        json!({
            "ticks": ticks,
            "state": s.state.to_string(),
            "obstructed": s.obstructed,
            "torque_samples": s.torque_trace().len(),
            "discarded_samples": s.discarded_samples(),
            "parse_failures": c.link().parse_failures(),
        }),
        || {
            format!(
                "ran {ticks} ticks; state {}, {} torque samples, {} discarded, {} undecodable",
                s.state,
                s.torque_trace().len(),
                s.discarded_samples(),
                c.link().parse_failures()
            )
        },
    );
    Ok(())
}

/// One-column CSV of the torque trace.
fn write_trace(path: &Path, trace: &[f32]) -> eyre::Result<()> {
    let mut w = csv::Writer::from_path(path)
        .wrap_err_with(|| format!("create trace file {}", path.display()))?;
    w.write_record(["torque"])?;
    for t in trace {
        w.write_record([t.to_string()])?;
    }
    w.flush()?;
    tracing::info!(path = %path.display(), rows = trace.len(), "torque trace written");
    Ok(())
}

fn phase(c: &mut Controller<Channel>, out: &Reporter, name: &'static str) -> eyre::Result<()> {
    let outcome = if name == "extend" {
        c.extend()?
    } else {
        c.retract()?
    };
    let end = c.session().last_phase_end;
    out.emit(
        name,
        json!({ "outcome": outcome_name(outcome), "end_position": end }),
        || match end {
            Some(p) => format!("{name}: {} at {p:.4}", outcome_name(outcome)),
            None => format!("{name}: {}", outcome_name(outcome)),
        },
    );
    match outcome {
        PhaseOutcome::Completed => Ok(()),
        PhaseOutcome::Obstructed => Err(CommandError::Obstructed { phase: name }.into()),
    }
}

fn cycle(
    c: &mut Controller<Channel>,
    out: &Reporter,
    shutdown: &AtomicBool,
    count: u32,
) -> eyre::Result<()> {
    require_homed(c.home()?)?;
    for n in 1..=count {
        interrupted(shutdown)?;
        let extended = c.extend().wrap_err_with(|| format!("cycle {n} extend"))?;
        let end = c.session().last_phase_end;
        let retracted = c.retract().wrap_err_with(|| format!("cycle {n} retract"))?;
        out.emit(
            "cycle",
            json!({
                "cycle": n,
                "extend": outcome_name(extended),
                "extend_position": end,
                "retract": outcome_name(retracted),
            }),
            || {
                format!(
                    "cycle {n}: extend {} ({}), retract {}",
                    outcome_name(extended),
                    end.map_or_else(|| "-".to_string(), |p| format!("{p:.4}")),
                    outcome_name(retracted)
                )
            },
        );
        if extended == PhaseOutcome::Obstructed {
            return Err(CommandError::Obstructed { phase: "extend" }.into());
        }
        if retracted == PhaseOutcome::Obstructed {
            return Err(CommandError::Obstructed { phase: "retract" }.into());
        }
        require_homed(c.home()?)?;
    }
    Ok(())
}

fn sweep(
    c: &mut Controller<Channel>,
    out: &Reporter,
    shutdown: &AtomicBool,
    speeds: &[f32],
    runs: u32,
    path: Option<&Path>,
) -> eyre::Result<()> {
    let mut w = match path {
        Some(p) => csv::Writer::from_writer(Box::new(
            std::fs::File::create(p).wrap_err_with(|| format!("create {}", p.display()))?,
        ) as Box<dyn std::io::Write>),
        None => csv::Writer::from_writer(Box::new(std::io::sink()) as Box<dyn std::io::Write>),
    };
    w.write_record(["max_speed", "extend_position"])?;

    require_homed(c.home()?)?;
    for &speed in speeds {
        c.change_max_speed(speed)?;
        let mut ends = Vec::with_capacity(runs as usize);
        for run in 1..=runs {
            interrupted(shutdown)?;
            let outcome = c.extend()?;
            match (outcome, c.session().last_phase_end) {
                (PhaseOutcome::Completed, Some(end)) => {
                    w.write_record([speed.to_string(), end.to_string()])?;
                    ends.push(end);
                }
                _ => tracing::warn!(speed, run, "extension obstructed; not recorded"),
            }
            c.retract()?;
            require_homed(c.home()?)?;
        }
        let avg = if ends.is_empty() {
            None
        } else {
            Some(ends.iter().sum::<f32>() / ends.len() as f32)
        };
        out.emit(
            "sweep",
            json!({ "max_speed": speed, "runs": runs, "recorded": ends.len(), "avg_extend_position": avg }),
            || match avg {
                Some(a) => format!("max_speed {speed}: avg extend position {a:.4} over {} runs", ends.len()),
                None => format!("max_speed {speed}: no completed runs"),
            },
        );
    }
    w.flush()?;
    Ok(())
}

fn bench(c: &mut Controller<Channel>, out: &Reporter, ticks: u32) -> eyre::Result<()> {
    let timing = c.control().timing;
    // A hold tick that overruns the control period means the loop cannot keep pace.
    let deadline = timing.control_period;
    let mut latencies = Vec::with_capacity(ticks as usize);
    let mut missed = 0usize;
    for _ in 0..ticks {
        let t0 = Instant::now();
        c.hold_unchanged()?;
        let dt = t0.elapsed();
        if dt > deadline {
            missed += 1;
        }
        latencies.push(dt);
    }
    let stats = LatencyStats::from_samples(&latencies);
    out.emit(
        "bench",
        json!({
            "ticks": ticks,
            "deadline_us": deadline.as_micros() as u64,
            "min_us": stats.min_us,
            "avg_us": stats.avg_us,
            "max_us": stats.max_us,
            "stdev_us": stats.stdev_us,
            "missed_deadlines": missed,
        }),
        || {
            format!(
                "ticks: {ticks}\nhold period (us): {}\nlatency min/avg/max/stdev (us): {:.0} / {:.1} / {:.0} / {:.1}\nmissed deadlines (> {} us): {missed}",
                timing.hold_period.as_micros(),
                stats.min_us,
                stats.avg_us,
                stats.max_us,
                stats.stdev_us,
                deadline.as_micros()
            )
        },
    );
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    pub min_us: f64,
    pub avg_us: f64,
    pub max_us: f64,
    pub stdev_us: f64,
}

impl LatencyStats {
    /// Sample standard deviation; zero for fewer than two samples.
    pub fn from_samples(samples: &[Duration]) -> Self {
        if samples.is_empty() {
            return Self {
                min_us: 0.0,
                avg_us: 0.0,
                max_us: 0.0,
                stdev_us: 0.0,
            };
        }
        let us: Vec<f64> = samples.iter().map(|d| d.as_secs_f64() * 1e6).collect();
        let n = us.len() as f64;
        let avg = us.iter().sum::<f64>() / n;
        let min = us.iter().copied().fold(f64::INFINITY, f64::min);
        let max = us.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let stdev = if us.len() > 1 {
            (us.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        Self {
            min_us: min,
            avg_us: avg,
            max_us: max,
            stdev_us: stdev,
        }
    }
}

fn self_check(c: &mut Controller<Channel>, out: &Reporter) -> eyre::Result<()> {
    use linact_core::SwitchState;
    use linact_hardware::error::HwError;
    use linact_hardware::util::wait_for_level;

    let sw = c.switches_mut();
    let home = sw.home_limit();
    let extend = sw.extend_limit();
    let activate = sw.activate();
    let safety_ok = wait_for_level(
        || match sw.safety() {
            SwitchState::Asserted => Ok(true),
            SwitchState::Released => Ok(false),
            SwitchState::Fault => Err(HwError::Gpio("safety switch read failed".into())),
        },
        true,
        Duration::from_millis(200),
        Duration::from_millis(10),
    );
    if let Err(e) = &safety_ok {
        tracing::warn!(error = %e, "safety interlock not OK");
    }

    let sample = c
        .query()?
        .ok_or(CommandError::NoSample(VALID_QUERY_ATTEMPTS))?;
    let state = |s: SwitchState| format!("{s:?}").to_ascii_lowercase();
    out.emit(
        "self-check",
        json!({
            "ok": true,
            "sample": sample_json(&sample),
            "switches": {
                "home_limit": state(home),
                "extend_limit": state(extend),
                "activate": state(activate),
                "safety_ok": safety_ok.is_ok(),
            },
        }),
        || {
            format!(
                "self-check ok\n  position {:.4}  torque {:.4}\n  home {}  extend {}  activate {}  safety {}",
                sample.position,
                sample.torque,
                state(home),
                state(extend),
                state(activate),
                if safety_ok.is_ok() { "ok" } else { "OPEN" }
            )
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_stats_match_hand_computation() {
        let s = LatencyStats::from_samples(&[
            Duration::from_micros(1000),
            Duration::from_micros(1200),
            Duration::from_micros(1400),
        ]);
        assert!((s.min_us - 1000.0).abs() < 1e-6);
        assert!((s.max_us - 1400.0).abs() < 1e-6);
        assert!((s.avg_us - 1200.0).abs() < 1e-6);
        assert!((s.stdev_us - 200.0).abs() < 1e-6);
        assert_eq!(LatencyStats::from_samples(&[]).max_us, 0.0);
    }
}
