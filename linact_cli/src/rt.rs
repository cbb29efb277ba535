//! Real-time scheduling for the control loop (Linux SCHED_FIFO / affinity /
//! mlockall; macOS mlockall only). Every step is best effort: failures are
//! logged and the run continues with normal scheduling.

use crate::cli::RtLock;
use std::sync::OnceLock;

static RT_ONCE: OnceLock<()> = OnceLock::new();

fn last_os_error<T>(rc: libc::c_int, ok: T) -> std::io::Result<T> {
    if rc == 0 {
        Ok(ok)
    } else {
        Err(std::io::Error::last_os_error())
    }
}

fn mlockall(flags: libc::c_int) -> std::io::Result<()> {
    // SAFETY: mlockall takes plain flags and touches no Rust-managed memory.
    last_os_error(unsafe { libc::mlockall(flags) }, ())
}

/// Lock memory per `lock`. `All` falls back to `Current` when the limit or
/// privileges refuse future pages.
fn apply_mem_lock(lock: RtLock) -> eyre::Result<()> {
    let current = libc::MCL_CURRENT;
    let all = libc::MCL_CURRENT | libc::MCL_FUTURE;
    match lock {
        RtLock::None => Ok(()),
        RtLock::Current => mlockall(current).map_err(|e| memlock_error("current", &e)),
        RtLock::All => match mlockall(all) {
            Ok(()) => Ok(()),
            Err(e) if matches!(e.raw_os_error(), Some(libc::EPERM | libc::ENOMEM)) => {
                tracing::warn!(error = %e, "mlockall(current|future) refused, retrying current only");
                mlockall(current).map_err(|e2| memlock_error("current", &e2))
            }
            Err(e) => Err(memlock_error("current|future", &e)),
        },
    }
}

fn memlock_error(mode: &str, err: &std::io::Error) -> eyre::Report {
    let mut rlim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: rlim is a valid, writable rlimit.
    let limit = if unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, &mut rlim) } == 0 {
        if rlim.rlim_cur == libc::RLIM_INFINITY {
            "unlimited".to_string()
        } else {
            format!("{} KiB", rlim.rlim_cur / 1024)
        }
    } else {
        "unknown".to_string()
    };
    eyre::eyre!(
        "mlockall({mode}) failed: {err}; memlock limit {limit}; needs CAP_IPC_LOCK (or root) and a sufficient 'ulimit -l'"
    )
}

#[cfg(target_os = "linux")]
fn apply_fifo(prio: Option<i32>) -> eyre::Result<i32> {
    // SAFETY: plain queries on a policy constant.
    let (min, max) = unsafe {
        (
            libc::sched_get_priority_min(libc::SCHED_FIFO),
            libc::sched_get_priority_max(libc::SCHED_FIFO),
        )
    };
    let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
    let chosen = prio.unwrap_or(max).clamp(min, max);
    let param = libc::sched_param {
        sched_priority: chosen,
    };
    // SAFETY: param outlives the call; pid 0 is the calling process.
    last_os_error(
        unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) },
        chosen,
    )
    .map_err(|e| {
        eyre::eyre!(
            "sched_setscheduler(SCHED_FIFO, {chosen}) failed: {e}; needs CAP_SYS_NICE or root \
             (e.g. 'sudo setcap cap_sys_nice=ep $(which linact)')"
        )
    })
}

#[cfg(target_os = "linux")]
fn apply_affinity(cpu: usize) -> eyre::Result<()> {
    let bits = std::mem::size_of::<libc::cpu_set_t>() * 8;
    if cpu >= bits {
        eyre::bail!("CPU {cpu} exceeds cpu_set_t capacity {bits}");
    }
    // SAFETY: sysconf has no memory effects.
    let online = usize::try_from(unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) }).unwrap_or(0);
    if cpu >= online {
        eyre::bail!("CPU {cpu} is not online ({online} online)");
    }
    // SAFETY: cpu_set_t is plain data; zeroed is a valid empty set and
    // CPU_* only touch the set passed in.
    unsafe {
        let mut allowed: libc::cpu_set_t = std::mem::zeroed();
        if libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut allowed) == 0
            && !libc::CPU_ISSET(cpu, &allowed)
        {
            eyre::bail!("CPU {cpu} not permitted by the current affinity mask");
        }
        let mut wanted: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut wanted);
        libc::CPU_SET(cpu, &mut wanted);
        last_os_error(
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &wanted),
            (),
        )
        .map_err(|e| eyre::eyre!("sched_setaffinity(CPU {cpu}) failed: {e}"))
    }
}

/// Apply real-time settings once per process. No-op unless `rt` is set.
#[cfg(target_os = "linux")]
pub fn setup_rt_once(rt: bool, prio: Option<i32>, lock: RtLock, cpu: Option<usize>) {
    if !rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        match apply_mem_lock(lock) {
            Ok(()) => tracing::info!(?lock, "RT: memory lock applied"),
            Err(e) => tracing::warn!(error = %e, "RT: memory lock not applied"),
        }
        match apply_fifo(prio) {
            Ok(p) => tracing::info!(priority = p, "RT: SCHED_FIFO"),
            Err(e) => tracing::warn!(error = %e, "RT: scheduler unchanged"),
        }
        let cpu = cpu.unwrap_or(0);
        match apply_affinity(cpu) {
            Ok(()) => tracing::info!(cpu, "RT: pinned"),
            Err(e) => tracing::warn!(error = %e, "RT: affinity unchanged"),
        }
    });
}

/// macOS: only memory locking is available.
#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(rt: bool, prio: Option<i32>, lock: RtLock, cpu: Option<usize>) {
    if !rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        if prio.is_some() || cpu.is_some() {
            tracing::warn!("RT: SCHED_FIFO and CPU affinity are Linux-only; ignoring --rt-prio/--rt-cpu");
        }
        match apply_mem_lock(lock) {
            Ok(()) => tracing::info!(?lock, "RT: memory lock applied"),
            Err(e) => tracing::warn!(error = %e, "RT: memory lock not applied"),
        }
    });
}
