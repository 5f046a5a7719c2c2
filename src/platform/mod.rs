//! Operating-system tuning for low-noise measurements
//!
//! `PlatformTuner::apply` pins the sending thread to one core, switches every
//! core's frequency governor to `performance` and adjusts two kernel TCP
//! flags. Every value is captured into a `PriorState` before it is touched,
//! and `restore` writes back exactly those values. Steps that fail for lack
//! of privileges or platform support are logged and skipped.

pub mod affinity;
pub mod linux;

pub use linux::SysfsPlatform;

use crate::{
    error::{AppError, Result},
    logging::Logger,
    models::Config,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Kernel switches touched by the tuner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum KernelFlag {
    TcpTimestamps,
    TcpLowLatency,
}

impl KernelFlag {
    /// Entry name under `/proc/sys/net/ipv4`
    pub fn file_name(&self) -> &'static str {
        match self {
            KernelFlag::TcpTimestamps => "tcp_timestamps",
            KernelFlag::TcpLowLatency => "tcp_low_latency",
        }
    }
}

impl fmt::Display for KernelFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// Access to the tunable operating-system settings
///
/// Kernel flags are read and written as their raw integer values so that a
/// restore reproduces settings such as `tcp_timestamps = 2` exactly.
pub trait PlatformHooks: Send + Sync {
    fn cpu_count(&self) -> Result<usize>;

    /// CPUs the current thread may run on
    fn current_affinity(&self) -> Result<Vec<usize>>;

    fn set_affinity(&self, cpus: &[usize]) -> Result<()>;

    fn governor(&self, cpu: usize) -> Result<String>;

    fn set_governor(&self, cpu: usize, governor: &str) -> Result<()>;

    fn kernel_flag(&self, flag: KernelFlag) -> Result<u32>;

    fn set_kernel_flag(&self, flag: KernelFlag, value: u32) -> Result<()>;
}

/// Settings captured before tuning; `None` / absent means untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriorState {
    pub affinity: Option<Vec<usize>>,
    pub governors: BTreeMap<usize, String>,
    pub kernel_flags: BTreeMap<KernelFlag, u32>,
}

impl PriorState {
    /// True when no setting was changed
    pub fn is_empty(&self) -> bool {
        self.affinity.is_none() && self.governors.is_empty() && self.kernel_flags.is_empty()
    }
}

/// Applies and reverts platform tuning
#[derive(Clone)]
pub struct PlatformTuner {
    hooks: Arc<dyn PlatformHooks>,
    pin_cpu: Option<usize>,
    tcp_low_latency: Option<bool>,
    logger: Logger,
}

impl PlatformTuner {
    /// Tuner pinning to the last core and enabling TCP low latency
    pub fn new(hooks: Arc<dyn PlatformHooks>, logger: Logger) -> Self {
        Self {
            hooks,
            pin_cpu: None,
            tcp_low_latency: Some(crate::defaults::DEFAULT_TCP_LOW_LATENCY),
            logger: logger.named("TUNER"),
        }
    }

    /// Tuner for the real system, honoring the configured core and flag
    pub fn from_config(config: &Config, logger: Logger) -> Self {
        Self::new(Arc::new(SysfsPlatform::new()), logger)
            .with_pin_cpu(config.pin_cpu)
            .with_tcp_low_latency(config.tcp_low_latency)
    }

    pub fn with_pin_cpu(mut self, cpu: Option<usize>) -> Self {
        self.pin_cpu = cpu;
        self
    }

    pub fn with_tcp_low_latency(mut self, enabled: Option<bool>) -> Self {
        self.tcp_low_latency = enabled;
        self
    }

    /// Apply every tuning step, returning what was changed
    pub fn apply(&self) -> PriorState {
        let mut prior = PriorState::default();

        if let Err(e) = self.pin(&mut prior) {
            self.skipped("cpu affinity", &e);
        }

        self.set_governors(&mut prior);

        if let Some(enabled) = self.tcp_low_latency {
            if let Err(e) = self.set_flag(&mut prior, KernelFlag::TcpLowLatency, u32::from(enabled)) {
                self.skipped("tcp low latency", &e);
            }
        }

        if let Err(e) = self.set_flag(&mut prior, KernelFlag::TcpTimestamps, 1) {
            self.skipped("tcp timestamps", &e);
        }

        self.logger.info("Platform tuning applied")
            .field("affinity_changed", prior.affinity.is_some())
            .field("governors_changed", prior.governors.len())
            .field("kernel_flags_changed", prior.kernel_flags.len())
            .log();

        prior
    }

    /// Apply and hand back a guard that restores on release or drop
    pub fn acquire(&self) -> TuningGuard {
        let prior = self.apply();
        TuningGuard {
            tuner: self.clone(),
            prior: Some(prior),
        }
    }

    /// Write back every captured value. Never fails; problems are logged.
    pub fn restore(&self, prior: &PriorState) {
        for (flag, value) in &prior.kernel_flags {
            if let Err(e) = self.hooks.set_kernel_flag(*flag, *value) {
                self.restore_failed(&flag.to_string(), &e);
            }
        }

        for (cpu, governor) in &prior.governors {
            if let Err(e) = self.hooks.set_governor(*cpu, governor) {
                self.restore_failed(&format!("cpu{} governor", cpu), &e);
            }
        }

        if let Some(cpus) = &prior.affinity {
            if let Err(e) = self.hooks.set_affinity(cpus) {
                self.restore_failed("cpu affinity", &e);
            }
        }

        self.logger.info("Platform settings restored").log();
    }

    fn pin(&self, prior: &mut PriorState) -> Result<()> {
        let count = self.hooks.cpu_count()?;
        let cpu = match self.pin_cpu {
            Some(cpu) => cpu,
            None => count.checked_sub(1)
                .ok_or_else(|| AppError::unsupported_platform("No CPUs reported"))?,
        };
        if cpu >= count {
            return Err(AppError::invalid_input(format!("CPU {} out of range (0..{})", cpu, count)));
        }

        let current = self.hooks.current_affinity()?;
        self.hooks.set_affinity(&[cpu])?;
        prior.affinity = Some(current);

        self.logger.debug("Pinned to CPU").field("cpu", cpu).log();
        Ok(())
    }

    fn set_governors(&self, prior: &mut PriorState) {
        let count = match self.hooks.cpu_count() {
            Ok(count) => count,
            Err(e) => {
                self.skipped("cpu governors", &e);
                return;
            }
        };

        for cpu in 0..count {
            let result = self.hooks.governor(cpu).and_then(|previous| {
                self.hooks.set_governor(cpu, crate::defaults::PERFORMANCE_GOVERNOR)?;
                Ok(previous)
            });

            match result {
                Ok(previous) => {
                    prior.governors.insert(cpu, previous);
                }
                Err(e) => self.skipped(&format!("cpu{} governor", cpu), &e),
            }
        }
    }

    fn set_flag(&self, prior: &mut PriorState, flag: KernelFlag, value: u32) -> Result<()> {
        let previous = self.hooks.kernel_flag(flag)?;
        self.hooks.set_kernel_flag(flag, value)?;
        prior.kernel_flags.insert(flag, previous);

        self.logger.debug("Kernel flag set")
            .field("flag", flag.file_name())
            .field("previous", previous)
            .field("value", value)
            .log();
        Ok(())
    }

    fn skipped(&self, step: &str, error: &AppError) {
        let message = if error.is_tuning_skip() {
            "Tuning step skipped"
        } else {
            "Tuning step failed"
        };
        self.logger.warn(message)
            .field("step", step)
            .error_info(error)
            .log();
    }

    fn restore_failed(&self, setting: &str, error: &AppError) {
        self.logger.warn("Could not restore setting")
            .field("setting", setting)
            .error_info(error)
            .log();
    }
}

/// Scoped tuning: restores the captured settings exactly once
pub struct TuningGuard {
    tuner: PlatformTuner,
    prior: Option<PriorState>,
}

impl TuningGuard {
    /// Settings captured at acquisition, until released
    pub fn prior(&self) -> Option<&PriorState> {
        self.prior.as_ref()
    }

    /// Restore now
    pub fn release(mut self) {
        self.restore_once();
    }

    fn restore_once(&mut self) {
        if let Some(prior) = self.prior.take() {
            self.tuner.restore(&prior);
        }
    }
}

impl Drop for TuningGuard {
    fn drop(&mut self) {
        self.restore_once();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-memory platform with per-setting failure switches
    #[derive(Default)]
    pub(crate) struct FakePlatform {
        pub(crate) state: Mutex<FakeState>,
        pub(crate) deny_governors: bool,
        pub(crate) unsupported_affinity: bool,
        pub(crate) deny_flags: HashSet<KernelFlag>,
    }

    #[derive(Default, Clone, PartialEq, Debug)]
    pub(crate) struct FakeState {
        pub(crate) affinity: Vec<usize>,
        pub(crate) governors: Vec<String>,
        pub(crate) flags: BTreeMap<KernelFlag, u32>,
        pub(crate) writes: usize,
    }

    impl FakePlatform {
        pub(crate) fn with_cpus(count: usize) -> Self {
            let state = FakeState {
                affinity: (0..count).collect(),
                governors: vec!["powersave".to_string(); count],
                flags: BTreeMap::from([
                    (KernelFlag::TcpTimestamps, 2),
                    (KernelFlag::TcpLowLatency, 0),
                ]),
                writes: 0,
            };
            Self {
                state: Mutex::new(state),
                ..Self::default()
            }
        }

        /// Current settings, without the write counter
        pub(crate) fn snapshot(&self) -> FakeState {
            let mut state = self.state.lock().unwrap().clone();
            state.writes = 0;
            state
        }

        pub(crate) fn writes(&self) -> usize {
            self.state.lock().unwrap().writes
        }
    }

    impl PlatformHooks for FakePlatform {
        fn cpu_count(&self) -> Result<usize> {
            Ok(self.state.lock().unwrap().governors.len())
        }

        fn current_affinity(&self) -> Result<Vec<usize>> {
            if self.unsupported_affinity {
                return Err(AppError::unsupported_platform("no affinity here"));
            }
            Ok(self.state.lock().unwrap().affinity.clone())
        }

        fn set_affinity(&self, cpus: &[usize]) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            state.affinity = cpus.to_vec();
            state.writes += 1;
            Ok(())
        }

        fn governor(&self, cpu: usize) -> Result<String> {
            Ok(self.state.lock().unwrap().governors[cpu].clone())
        }

        fn set_governor(&self, cpu: usize, governor: &str) -> Result<()> {
            if self.deny_governors {
                return Err(AppError::permission_denied("scaling_governor"));
            }
            let mut state = self.state.lock().unwrap();
            state.governors[cpu] = governor.to_string();
            state.writes += 1;
            Ok(())
        }

        fn kernel_flag(&self, flag: KernelFlag) -> Result<u32> {
            Ok(self.state.lock().unwrap().flags[&flag])
        }

        fn set_kernel_flag(&self, flag: KernelFlag, value: u32) -> Result<()> {
            if self.deny_flags.contains(&flag) {
                return Err(AppError::permission_denied(flag.file_name()));
            }
            let mut state = self.state.lock().unwrap();
            state.flags.insert(flag, value);
            state.writes += 1;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakePlatform;
    use super::*;
    use crate::logging::LogLevel;
    use std::collections::HashSet;

    fn tuner(platform: &Arc<FakePlatform>) -> PlatformTuner {
        PlatformTuner::new(platform.clone(), Logger::silent())
    }

    #[test]
    fn test_apply_changes_every_setting() {
        let platform = Arc::new(FakePlatform::with_cpus(4));
        let prior = tuner(&platform).apply();

        let state = platform.snapshot();
        assert_eq!(state.affinity, vec![3]);
        assert!(state.governors.iter().all(|g| g == "performance"));
        assert_eq!(state.flags[&KernelFlag::TcpTimestamps], 1);
        assert_eq!(state.flags[&KernelFlag::TcpLowLatency], 1);

        assert_eq!(prior.affinity, Some(vec![0, 1, 2, 3]));
        assert_eq!(prior.governors.len(), 4);
        assert_eq!(prior.kernel_flags[&KernelFlag::TcpTimestamps], 2);
    }

    #[test]
    fn test_restore_returns_every_setting_to_snapshot() {
        let platform = Arc::new(FakePlatform::with_cpus(4));
        let before = platform.snapshot();

        let tuner = tuner(&platform);
        let prior = tuner.apply();
        assert_ne!(platform.snapshot(), before);

        tuner.restore(&prior);
        assert_eq!(platform.snapshot(), before);

        // Idempotent
        tuner.restore(&prior);
        assert_eq!(platform.snapshot(), before);
    }

    #[test]
    fn test_explicit_cpu_and_untouched_low_latency() {
        let platform = Arc::new(FakePlatform::with_cpus(8));
        let prior = tuner(&platform)
            .with_pin_cpu(Some(2))
            .with_tcp_low_latency(None)
            .apply();

        let state = platform.snapshot();
        assert_eq!(state.affinity, vec![2]);
        assert_eq!(state.flags[&KernelFlag::TcpLowLatency], 0);
        assert!(!prior.kernel_flags.contains_key(&KernelFlag::TcpLowLatency));
    }

    #[test]
    fn test_failed_steps_are_skipped_and_logged() {
        let platform = Arc::new(FakePlatform {
            deny_governors: true,
            unsupported_affinity: true,
            ..FakePlatform::with_cpus(2)
        });
        let (logger, entries) = Logger::capturing("TEST");

        let prior = PlatformTuner::new(platform.clone(), logger).apply();

        assert!(prior.affinity.is_none());
        assert!(prior.governors.is_empty());
        // The kernel flags still went through
        assert_eq!(prior.kernel_flags.len(), 2);

        let entries = entries.lock().unwrap();
        let warnings: Vec<_> = entries.iter().filter(|e| e.level == LogLevel::Warn).collect();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().all(|e| e.message == "Tuning step skipped"));
    }

    #[test]
    fn test_out_of_range_cpu_is_not_pinned() {
        let platform = Arc::new(FakePlatform::with_cpus(2));
        let prior = tuner(&platform).with_pin_cpu(Some(5)).apply();

        assert!(prior.affinity.is_none());
        assert_eq!(platform.snapshot().affinity, vec![0, 1]);
    }

    #[test]
    fn test_restore_never_fails_on_denied_writes() {
        let platform = Arc::new(FakePlatform {
            deny_flags: HashSet::from([KernelFlag::TcpTimestamps]),
            ..FakePlatform::with_cpus(1)
        });
        let (logger, entries) = Logger::capturing("TEST");
        let tuner = PlatformTuner::new(platform.clone(), logger);

        let prior = PriorState {
            kernel_flags: BTreeMap::from([(KernelFlag::TcpTimestamps, 0)]),
            ..PriorState::default()
        };
        tuner.restore(&prior);

        let entries = entries.lock().unwrap();
        assert!(entries.iter().any(|e| e.message == "Could not restore setting"));
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let platform = Arc::new(FakePlatform::with_cpus(3));
        let before = platform.snapshot();

        {
            let guard = tuner(&platform).acquire();
            assert!(guard.prior().is_some_and(|p| !p.is_empty()));
            assert_ne!(platform.snapshot(), before);
        }

        assert_eq!(platform.snapshot(), before);
    }

    #[test]
    fn test_guard_release_restores_once() {
        let platform = Arc::new(FakePlatform::with_cpus(2));
        let guard = tuner(&platform).acquire();
        let writes_after_apply = platform.writes();

        guard.release();

        let writes = platform.writes();
        // affinity + 2 governors + 2 flags, once each
        assert_eq!(writes - writes_after_apply, 5);
        assert_eq!(platform.snapshot().governors, vec!["powersave", "powersave"]);
    }

    #[test]
    fn test_kernel_flag_names() {
        assert_eq!(KernelFlag::TcpTimestamps.file_name(), "tcp_timestamps");
        assert_eq!(KernelFlag::TcpLowLatency.to_string(), "tcp_low_latency");
    }
}
