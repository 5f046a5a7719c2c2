//! CPU affinity of the calling thread
//!
//! Linux only; elsewhere every call reports `UnsupportedPlatform`.

use crate::error::{AppError, Result};

/// CPUs the calling thread is allowed to run on
#[cfg(target_os = "linux")]
pub fn current() -> Result<Vec<usize>> {
    use std::mem::MaybeUninit;

    let mask = unsafe {
        let mut mask = MaybeUninit::<libc::cpu_set_t>::uninit();
        let result = libc::sched_getaffinity(
            0, // calling thread
            std::mem::size_of::<libc::cpu_set_t>(),
            mask.as_mut_ptr(),
        );
        if result != 0 {
            return Err(os_error("sched_getaffinity"));
        }
        mask.assume_init()
    };

    let cpus = (0..max_cpus())
        .filter(|&cpu| unsafe { libc::CPU_ISSET(cpu, &mask) })
        .collect();
    Ok(cpus)
}

/// Restrict the calling thread to `cpus`
#[cfg(target_os = "linux")]
pub fn set(cpus: &[usize]) -> Result<()> {
    if cpus.is_empty() {
        return Err(AppError::invalid_input("Affinity mask must name at least one CPU"));
    }
    if let Some(cpu) = cpus.iter().find(|&&cpu| cpu >= max_cpus()) {
        return Err(AppError::invalid_input(format!("CPU {} exceeds the affinity mask size", cpu)));
    }

    unsafe {
        let mut mask: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut mask);
        for &cpu in cpus {
            libc::CPU_SET(cpu, &mut mask);
        }

        let result = libc::sched_setaffinity(
            0, // calling thread
            std::mem::size_of::<libc::cpu_set_t>(),
            &mask,
        );
        if result != 0 {
            return Err(os_error("sched_setaffinity"));
        }
    }

    Ok(())
}

#[cfg(target_os = "linux")]
fn max_cpus() -> usize {
    libc::CPU_SETSIZE as usize
}

#[cfg(target_os = "linux")]
fn os_error(call: &str) -> AppError {
    let error = std::io::Error::last_os_error();
    let message = format!("{} failed: {}", call, error);
    match error.kind() {
        std::io::ErrorKind::PermissionDenied => AppError::permission_denied(message),
        _ => AppError::io(message),
    }
}

#[cfg(not(target_os = "linux"))]
pub fn current() -> Result<Vec<usize>> {
    Err(AppError::unsupported_platform("CPU affinity is only supported on Linux"))
}

#[cfg(not(target_os = "linux"))]
pub fn set(_cpus: &[usize]) -> Result<()> {
    Err(AppError::unsupported_platform("CPU affinity is only supported on Linux"))
}
