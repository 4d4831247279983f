use serde::{Deserialize, Serialize};

/// One GPU as reported by the vendor CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GpuInfo {
    pub id: String,
    pub name: String,
    /// Utilisation percentage
    pub utilization: f64,
    /// Used VRAM in bytes
    pub memory_used: i64,
    /// Total VRAM in bytes
    pub memory_total: i64,
    /// Temperature in Celsius
    pub temperature: i64,
}

/// Host hardware and resource snapshot produced by the probes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemInfo {
    pub cpu_cores: usize,
    pub cpu_threads: usize,
    pub cpu_usage: f64,
    pub memory_total: i64,
    pub memory_used: i64,
    pub memory_available: i64,
    pub memory_percent: f64,
    pub load_average_1: f64,
    pub load_average_5: f64,
    pub load_average_15: f64,
    pub uptime: i64,
    pub gpus: Vec<GpuInfo>,
}
