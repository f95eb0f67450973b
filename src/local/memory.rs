//! Process memory accounting

use serde::Serialize;
use sysinfo::{ProcessesToUpdate, System};

/// RAM figures in bytes, or the reason they are unavailable
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RamUsage {
    Measured { free: u64, used: u64, total: u64 },
    Unavailable { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Unavailable {
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryResponse {
    pub ram: RamUsage,
    pub cuda: Unavailable,
}

/// Resident memory of this process against total system memory
pub fn ram_usage() -> RamUsage {
    let pid = match sysinfo::get_current_pid() {
        Ok(pid) => pid,
        Err(e) => {
            return RamUsage::Unavailable {
                error: e.to_string(),
            }
        }
    };

    let mut system = System::new();
    system.refresh_memory();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    let total = system.total_memory();
    match system.process(pid) {
        Some(process) if total > 0 => {
            let used = process.memory();
            RamUsage::Measured {
                free: total.saturating_sub(used),
                used,
                total,
            }
        }
        _ => RamUsage::Unavailable {
            error: "process memory information unavailable".to_string(),
        },
    }
}

/// GPU accounting never applies when generation runs remotely
pub fn memory_report() -> MemoryResponse {
    MemoryResponse {
        ram: ram_usage(),
        cuda: Unavailable {
            error: "Not available in remote API mode".to_string(),
        },
    }
}
