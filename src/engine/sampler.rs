use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::warn;

use crate::common::error::ResourceLimit;
use crate::config::MemoryConfig;

/// Samples process memory while one analysis runs.
///
/// The first sample is taken one interval after start. A sample above the
/// ceiling resolves [`MemorySampler::exceeded`] and stops sampling. A
/// ceiling of 0 disables the sampler. The task is aborted on drop.
#[derive(Debug)]
pub struct MemorySampler {
    peak: Arc<AtomicU64>,
    exceeded: Option<oneshot::Receiver<ResourceLimit>>,
    task: Option<JoinHandle<()>>,
}

impl MemorySampler {
    pub fn start(config: &MemoryConfig) -> Self {
        let peak = Arc::new(AtomicU64::new(0));
        if config.process_ceiling == 0 {
            return Self {
                peak,
                exceeded: None,
                task: None,
            };
        }

        let (tx, rx) = oneshot::channel();
        let ceiling = config.process_ceiling;
        let period = Duration::from_millis(config.sample_interval_ms.max(1));
        let task = tokio::spawn({
            let peak = peak.clone();
            async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    let Some(used) = resident_set_size().await else {
                        warn_unavailable();
                        return;
                    };
                    peak.fetch_max(used, Ordering::Relaxed);
                    if used > ceiling {
                        warn!(used, limit = ceiling, "process memory ceiling crossed");
                        let _ = tx.send(ResourceLimit::ProcessMemoryExceeded {
                            used,
                            limit: ceiling,
                        });
                        return;
                    }
                }
            }
        });

        Self {
            peak,
            exceeded: Some(rx),
            task: Some(task),
        }
    }

    /// Resolves once a sample crosses the ceiling; pending otherwise.
    pub async fn exceeded(&mut self) -> ResourceLimit {
        if let Some(rx) = self.exceeded.as_mut() {
            let received = rx.await;
            self.exceeded = None;
            if let Ok(limit) = received {
                return limit;
            }
        }
        std::future::pending().await
    }

    /// Highest sample so far, 0 when none was taken.
    pub fn peak(&self) -> u64 {
        self.peak.load(Ordering::Relaxed)
    }
}

impl Drop for MemorySampler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

static UNAVAILABLE_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_unavailable() {
    if !UNAVAILABLE_WARNED.swap(true, Ordering::Relaxed) {
        warn!("resident set size is unavailable on this platform; memory sampling disabled");
    }
}

/// Current resident set size of this process in bytes.
///
/// Read from `/proc/self/status` on Linux and from the task info on
/// macOS; `None` elsewhere.
pub async fn resident_set_size() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = tokio::fs::read_to_string("/proc/self/status").await.ok()?;
        parse_vm_rss(&status)
    }
    #[cfg(target_os = "macos")]
    {
        mach::resident_size()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kib: u64 = line
        .trim_start_matches("VmRSS:")
        .split_whitespace()
        .next()?
        .parse()
        .ok()?;
    Some(kib * 1024)
}

#[cfg(target_os = "macos")]
mod mach {
    use std::mem::MaybeUninit;

    #[allow(dead_code)]
    #[repr(C)]
    struct TaskBasicInfo {
        virtual_size: u64,
        resident_size: u64,
        resident_size_max: u64,
        user_time: u64,
        system_time: u64,
        policy: i32,
        suspend_count: i32,
    }

    unsafe extern "C" {
        fn mach_task_self() -> u32;
        fn task_info(task: u32, flavor: i32, info: *mut TaskBasicInfo, count: *mut u32) -> i32;
    }

    const MACH_TASK_BASIC_INFO: i32 = 20;
    const MACH_TASK_BASIC_INFO_COUNT: u32 =
        (std::mem::size_of::<TaskBasicInfo>() / std::mem::size_of::<u32>()) as u32;

    pub(super) fn resident_size() -> Option<u64> {
        let mut info = MaybeUninit::<TaskBasicInfo>::uninit();
        let mut count = MACH_TASK_BASIC_INFO_COUNT;
        // SAFETY: task_info writes at most `count` words into `info`
        let result = unsafe {
            task_info(mach_task_self(), MACH_TASK_BASIC_INFO, info.as_mut_ptr(), &mut count)
        };
        if result != 0 {
            return None;
        }
        // SAFETY: initialized by the successful call above
        Some(unsafe { info.assume_init() }.resident_size)
    }
}
