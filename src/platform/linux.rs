//! sysfs / procfs backed platform hooks

use super::{affinity, KernelFlag, PlatformHooks};
use crate::error::{AppError, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const CPU_ROOT: &str = "/sys/devices/system/cpu";
const NET_ROOT: &str = "/proc/sys/net/ipv4";

/// `EROFS`: sysfs and procfs mounted read-only inside containers
const READ_ONLY_FS: i32 = 30;

/// Reads and writes tunables through the kernel's pseudo filesystems
#[derive(Debug, Clone)]
pub struct SysfsPlatform {
    cpu_root: PathBuf,
    net_root: PathBuf,
}

impl Default for SysfsPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SysfsPlatform {
    pub fn new() -> Self {
        Self::with_roots(CPU_ROOT, NET_ROOT)
    }

    /// Alternate roots, e.g. a fake tree in a temp directory
    pub fn with_roots(cpu_root: impl Into<PathBuf>, net_root: impl Into<PathBuf>) -> Self {
        Self {
            cpu_root: cpu_root.into(),
            net_root: net_root.into(),
        }
    }

    fn governor_path(&self, cpu: usize) -> PathBuf {
        self.cpu_root
            .join(format!("cpu{}", cpu))
            .join("cpufreq")
            .join("scaling_governor")
    }

    fn flag_path(&self, flag: KernelFlag) -> PathBuf {
        self.net_root.join(flag.file_name())
    }

    /// `cpuN` directories under the cpu root
    fn count_cpu_dirs(&self) -> Option<usize> {
        let entries = fs::read_dir(&self.cpu_root).ok()?;
        let count = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix("cpu"))
                    .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
            })
            .count();

        (count > 0).then_some(count)
    }
}

impl PlatformHooks for SysfsPlatform {
    fn cpu_count(&self) -> Result<usize> {
        Ok(self.count_cpu_dirs().unwrap_or_else(num_cpus::get))
    }

    fn current_affinity(&self) -> Result<Vec<usize>> {
        affinity::current()
    }

    fn set_affinity(&self, cpus: &[usize]) -> Result<()> {
        affinity::set(cpus)
    }

    fn governor(&self, cpu: usize) -> Result<String> {
        read_value(&self.governor_path(cpu))
    }

    fn set_governor(&self, cpu: usize, governor: &str) -> Result<()> {
        write_value(&self.governor_path(cpu), governor)
    }

    fn kernel_flag(&self, flag: KernelFlag) -> Result<u32> {
        let path = self.flag_path(flag);
        let raw = read_value(&path)?;
        raw.parse().map_err(|_| {
            AppError::parse(format!("Unexpected value '{}' in {}", raw, path.display()))
        })
    }

    fn set_kernel_flag(&self, flag: KernelFlag, value: u32) -> Result<()> {
        write_value(&self.flag_path(flag), &value.to_string())
    }
}

fn read_value(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map(|value| value.trim().to_string())
        .map_err(|e| tunable_error("read", path, e))
}

fn write_value(path: &Path, value: &str) -> Result<()> {
    if !path.exists() {
        return Err(AppError::unsupported_platform(format!("{} does not exist", path.display())));
    }
    fs::write(path, value).map_err(|e| tunable_error("write", path, e))
}

fn tunable_error(action: &str, path: &Path, error: io::Error) -> AppError {
    let message = format!("Cannot {} {}: {}", action, path.display(), error);
    match error.kind() {
        io::ErrorKind::PermissionDenied => AppError::permission_denied(message),
        io::ErrorKind::NotFound | io::ErrorKind::Unsupported => AppError::unsupported_platform(message),
        _ if error.raw_os_error() == Some(READ_ONLY_FS) => AppError::permission_denied(message),
        _ => AppError::io(message),
    }
}
