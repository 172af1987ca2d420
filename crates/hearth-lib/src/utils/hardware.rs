//! Host facts used by memory defaults and `os.version` rules.

use once_cell::sync::Lazy;
use std::sync::Mutex;
use sysinfo::{MemoryRefreshKind, RefreshKind, System};

const MIB: u64 = 1024 * 1024;

// One probe for the whole process; only memory is ever refreshed
static PROBE: Lazy<Mutex<System>> = Lazy::new(|| {
    Mutex::new(System::new_with_specifics(
        RefreshKind::nothing().with_memory(MemoryRefreshKind::nothing().with_ram()),
    ))
});

/// Physical memory snapshot in MiB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub total_mb: u64,
    pub available_mb: u64,
}

pub fn memory() -> MemorySnapshot {
    let mut probe = PROBE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    probe.refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
    MemorySnapshot {
        total_mb: probe.total_memory() / MIB,
        available_mb: probe.available_memory() / MIB,
    }
}

/// Long OS version string, empty when the host does not report one
pub fn os_version() -> String {
    System::long_os_version().unwrap_or_default()
}
