//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "linact", version, about = "Linear actuator controller")]
pub struct Cli {
    /// Path to config TOML (typed). A missing default file means built-in defaults.
    #[arg(long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Log and report results as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Run serial I/O on a dedicated thread
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub io_thread: bool,

    /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
    #[arg(
        long,
        action = ArgAction::SetTrue,
        global = true,
        long_help = "Enable real-time mode on supported OSes.\n\nLinux: attempts SCHED_FIFO priority, pins to one CPU, and calls mlockall to keep the control loop out of page faults. May require CAP_SYS_NICE / CAP_IPC_LOCK or root.\n\nmacOS: only mlockall is applied."
    )]
    pub rt: bool,

    /// SCHED_FIFO priority for --rt (Linux only); defaults to the maximum
    #[arg(long, value_name = "PRIO", global = true)]
    pub rt_prio: Option<i32>,

    /// Memory locking mode for --rt: none, current, or all
    #[arg(long, value_enum, value_name = "MODE", global = true)]
    pub rt_lock: Option<RtLock>,

    /// CPU index to pin to for --rt (Linux only); defaults to 0
    #[arg(long, value_name = "CPU", global = true)]
    pub rt_cpu: Option<usize>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

pub const DEFAULT_CONFIG: &str = "etc/linact.toml";

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full state machine until ctrl-c or a tick budget
    Run {
        /// Stop after this many state-machine ticks
        #[arg(long, value_name = "N")]
        max_ticks: Option<u64>,
        /// Write the torque trace as CSV on exit
        #[arg(long, value_name = "FILE")]
        trace_out: Option<PathBuf>,
    },
    /// One homing sequence
    Home,
    /// One forward profile from a re-zeroed home reference
    Extend,
    /// One reverse profile from a re-zeroed home reference
    Retract,
    /// Home, then N extend/retract cycles
    Cycle {
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Repeat extend/retract cycles at several max speeds and record where extension ends
    Sweep {
        /// Comma-separated max speeds
        #[arg(long, value_delimiter = ',', required = true, num_args = 1..)]
        speeds: Vec<f32>,
        /// Cycles per speed
        #[arg(long, default_value_t = 3)]
        runs: u32,
        /// CSV output (max_speed,extend_position)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Query position, velocity and torque once
    Query {
        /// Keep querying until an in-window sample arrives
        #[arg(long, action = ArgAction::SetTrue)]
        blocking: bool,
    },
    /// Stop command
    Stop,
    /// Brake command
    Brake,
    /// Redefine the origin so the current position reads P
    Rezero {
        #[arg(long, value_name = "P")]
        position: f32,
    },
    /// Print an S-curve velocity table, or drive it in velocity mode with --drive
    Ramp {
        #[arg(long, allow_negative_numbers = true)]
        start: f32,
        #[arg(long, allow_negative_numbers = true)]
        end: f32,
        #[arg(long)]
        points: usize,
        /// Drive the curve, then hold the final velocity until --goal
        #[arg(long, action = ArgAction::SetTrue, requires = "goal")]
        drive: bool,
        /// Goal position for --drive
        #[arg(long, allow_negative_numbers = true)]
        goal: Option<f32>,
    },
    /// Hold-unchanged ticks with latency statistics
    Bench {
        #[arg(long, default_value_t = 1000)]
        ticks: u32,
    },
    /// Validate config, open the bridge, read the switches and query once
    SelfCheck,
}
