use anyhow::{Context, Result};
use perfcap_common::types::process::ProcessInfo;
use sysinfo::System;
use tracing::debug;

/// Enumerates every process visible to the current user right now. Pure and
/// uncached; runtime is proportional to the process count and OS API cost,
/// so interactive callers go through [`capture_snapshot`] instead.
pub fn list_processes() -> Vec<ProcessInfo> {
    let mut system = System::new();
    system.refresh_processes();

    let mut records = Vec::with_capacity(system.processes().len());
    for (pid, process) in system.processes() {
        let mut name = process.name().to_string();
        if name.is_empty() {
            // kernel threads and processes we may not fully read still have
            // an executable path more often than a comm value
            if let Some(file) = process.exe().and_then(|p| p.file_name()) {
                name = file.to_string_lossy().into_owned();
            }
        }
        if name.is_empty() {
            // unreadable entry, skip it rather than aborting the enumeration
            continue;
        }
        records.push(ProcessInfo::new(pid.as_u32(), name, process.status().into()));
    }

    debug!("enumerated {} processes", records.len());
    records
}

/// Runs [`list_processes`] on the blocking worker pool.
pub async fn capture_snapshot() -> Result<Vec<ProcessInfo>> {
    tokio::task::spawn_blocking(list_processes)
        .await
        .context("process enumeration task failed")
}
