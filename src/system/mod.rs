//! Host probes: read-only inspectors of CPU topology, NUMA layout,
//! memory/load/uptime and GPU inventory.
//!
//! All probes are safe to call concurrently and never propagate failures;
//! a field that cannot be read stays at zero and a missing GPU CLI yields
//! an empty GPU list. Snapshots are cached for a short TTL behind a
//! read/write lock with double-checked refresh.

use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{GpuInfo, SystemInfo};

const CACHE_TTL: Duration = Duration::from_secs(5);

/// Cumulative CPU jiffies from the aggregate line of `/proc/stat`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct CpuTimes {
    user: u64,
    nice: u64,
    system: u64,
    idle: u64,
    iowait: u64,
    irq: u64,
    softirq: u64,
    steal: u64,
}

impl CpuTimes {
    fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }
}

pub struct SystemProbe {
    nvidia_smi_command: String,
    numactl_command: String,
    topology: OnceLock<(usize, usize)>,
    cpu_state: Mutex<Option<(CpuTimes, Instant)>>,
    cache: RwLock<Option<(SystemInfo, Instant)>>,
}

impl SystemProbe {
    pub fn new(nvidia_smi_command: impl Into<String>, numactl_command: impl Into<String>) -> Self {
        Self {
            nvidia_smi_command: nvidia_smi_command.into(),
            numactl_command: numactl_command.into(),
            topology: OnceLock::new(),
            cpu_state: Mutex::new(None),
            cache: RwLock::new(None),
        }
    }

    /// (physical cores, logical threads), read once from `/proc/cpuinfo`
    pub fn cpu_topology(&self) -> (usize, usize) {
        *self.topology.get_or_init(|| {
            match std::fs::read_to_string("/proc/cpuinfo") {
                Ok(data) => parse_cpu_topology(&data),
                Err(_) => fallback_topology(),
            }
        })
    }

    pub fn logical_cpus(&self) -> usize {
        self.cpu_topology().1.max(1)
    }

    /// NUMA node count. 0 means both detection paths failed; callers treat
    /// that the same as a single node.
    pub async fn numa_nodes(&self) -> usize {
        if let Ok(entries) = std::fs::read_dir("/sys/devices/system/node") {
            let count = entries
                .filter_map(|e| e.ok())
                .filter(|e| {
                    let name = e.file_name();
                    let name = name.to_string_lossy();
                    name.strip_prefix("node")
                        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
                })
                .count();
            if count > 0 {
                return count;
            }
        }

        // Fallback: parse the "available:" line of `numactl --hardware`
        match Command::new(&self.numactl_command)
            .arg("--hardware")
            .output()
            .await
        {
            Ok(output) if output.status.success() => {
                parse_numactl_hardware(&String::from_utf8_lossy(&output.stdout))
            }
            _ => {
                debug!("could not detect NUMA nodes, assuming single node");
                0
            }
        }
    }

    /// Whether the NUMA binding wrapper can be invoked
    pub async fn numactl_available(&self) -> bool {
        Command::new(&self.numactl_command)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Whether at least one usable accelerator is present
    pub async fn gpu_available(&self) -> bool {
        Command::new(&self.nvidia_smi_command)
            .arg("-L")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Full host snapshot with TTL caching
    pub async fn system_info(&self) -> SystemInfo {
        {
            let cache = self.cache.read().await;
            if let Some((info, at)) = cache.as_ref()
                && at.elapsed() < CACHE_TTL
            {
                return info.clone();
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the write lock
        if let Some((info, at)) = cache.as_ref()
            && at.elapsed() < CACHE_TTL
        {
            return info.clone();
        }

        let info = self.collect_system_info().await;
        *cache = Some((info.clone(), Instant::now()));
        info
    }

    async fn collect_system_info(&self) -> SystemInfo {
        let (cpu_cores, cpu_threads) = self.cpu_topology();
        let mut info = SystemInfo {
            cpu_cores,
            cpu_threads,
            ..Default::default()
        };

        info.cpu_usage = self.cpu_usage();

        if let Ok(data) = std::fs::read_to_string("/proc/meminfo") {
            let (total, available) = parse_meminfo(&data);
            info.memory_total = total;
            info.memory_available = available;
            if total > 0 {
                info.memory_used = total - available;
                info.memory_percent = (info.memory_used as f64 / total as f64) * 100.0;
            }
        }

        if let Ok(data) = std::fs::read_to_string("/proc/loadavg") {
            let loads = parse_loadavg(&data);
            info.load_average_1 = loads[0];
            info.load_average_5 = loads[1];
            info.load_average_15 = loads[2];
        }

        if let Ok(data) = std::fs::read_to_string("/proc/uptime") {
            info.uptime = parse_uptime(&data);
        }

        info.gpus = self.gpu_info().await;

        info
    }

    /// CPU usage percent over the interval since the previous sample.
    /// The very first call records a baseline and returns 0.
    fn cpu_usage(&self) -> f64 {
        let Ok(data) = std::fs::read_to_string("/proc/stat") else {
            return 0.0;
        };
        let Some(current) = parse_cpu_times(&data) else {
            return 0.0;
        };

        let mut state = self.cpu_state.lock().unwrap();
        let usage = match state.as_ref() {
            Some((previous, _)) => {
                let total = current.total().saturating_sub(previous.total());
                let idle = current.idle.saturating_sub(previous.idle);
                if total == 0 {
                    0.0
                } else {
                    ((total - idle) as f64 / total as f64) * 100.0
                }
            }
            None => 0.0,
        };
        *state = Some((current, Instant::now()));
        usage
    }

    async fn gpu_info(&self) -> Vec<GpuInfo> {
        let output = Command::new(&self.nvidia_smi_command)
            .args([
                "--query-gpu=index,name,utilization.gpu,memory.used,memory.total,temperature.gpu",
                "--format=csv,noheader,nounits",
            ])
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => {
                parse_gpu_csv(&String::from_utf8_lossy(&output.stdout))
            }
            _ => Vec::new(),
        }
    }
}

/// Count distinct (physical id, core id) pairs and processor entries.
/// Falls back to the logical count with a divide-by-two heuristic when
/// the topology fields are missing.
fn parse_cpu_topology(data: &str) -> (usize, usize) {
    use std::collections::HashSet;

    #[derive(Default)]
    struct Block {
        has_processor: bool,
        physical_id: Option<String>,
        core_id: Option<String>,
    }

    let mut cores: HashSet<(String, String)> = HashSet::new();
    let mut logical = 0usize;
    let mut block = Block::default();

    let mut flush = |block: Block| {
        if block.has_processor || block.physical_id.is_some() || block.core_id.is_some() {
            logical += 1;
        }
        if let (Some(p), Some(c)) = (block.physical_id, block.core_id) {
            cores.insert((p, c));
        }
    };

    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() {
            flush(std::mem::take(&mut block));
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            match key.trim() {
                "processor" => block.has_processor = true,
                "physical id" => block.physical_id = Some(value.trim().to_string()),
                "core id" => block.core_id = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }
    flush(block);

    if !cores.is_empty() {
        let threads = if logical > 0 {
            logical
        } else {
            fallback_topology().1
        };
        (cores.len(), threads)
    } else if logical > 0 {
        (heuristic_cores(logical), logical)
    } else {
        fallback_topology()
    }
}

fn fallback_topology() -> (usize, usize) {
    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (heuristic_cores(threads), threads)
}

fn heuristic_cores(threads: usize) -> usize {
    if threads >= 2 && threads % 2 == 0 {
        threads / 2
    } else {
        threads
    }
}

fn parse_cpu_times(data: &str) -> Option<CpuTimes> {
    let line = data.lines().next()?;
    let rest = line.strip_prefix("cpu ")?;
    let fields: Vec<u64> = rest
        .split_whitespace()
        .map(|f| f.parse().unwrap_or(0))
        .collect();
    if fields.len() < 8 {
        return None;
    }

    Some(CpuTimes {
        user: fields[0],
        nice: fields[1],
        system: fields[2],
        idle: fields[3],
        iowait: fields[4],
        irq: fields[5],
        softirq: fields[6],
        steal: fields[7],
    })
}

/// (total, available) in bytes. Short-circuits once both values are known;
/// MemFree stands in for MemAvailable on old kernels.
fn parse_meminfo(data: &str) -> (i64, i64) {
    let mut total = 0i64;
    let mut available = 0i64;

    for line in data.lines() {
        if total > 0 && available > 0 {
            break;
        }

        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let value_kb: i64 = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        match key {
            "MemTotal" => total = value_kb * 1024,
            "MemAvailable" => available = value_kb * 1024,
            "MemFree" if available == 0 => available = value_kb * 1024,
            _ => {}
        }
    }

    (total, available)
}

fn parse_loadavg(data: &str) -> [f64; 3] {
    let mut loads = [0.0; 3];
    for (i, field) in data.split_whitespace().take(3).enumerate() {
        loads[i] = field.parse().unwrap_or(0.0);
    }
    loads
}

fn parse_uptime(data: &str) -> i64 {
    data.split_whitespace()
        .next()
        .and_then(|f| f.parse::<f64>().ok())
        .unwrap_or(0.0) as i64
}

/// "available: 2 nodes (0-1)" → 2; anything unparseable → 0
fn parse_numactl_hardware(output: &str) -> usize {
    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("available:") {
            return rest
                .split_whitespace()
                .next()
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
        }
    }
    0
}

/// CSV rows of index, name, utilization %, memory used MiB, memory total
/// MiB, temperature C. Short rows are skipped; MiB values become bytes.
fn parse_gpu_csv(output: &str) -> Vec<GpuInfo> {
    let mut gpus = Vec::new();

    for line in output.lines() {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 6 {
            continue;
        }

        gpus.push(GpuInfo {
            id: fields[0].to_string(),
            name: fields[1].to_string(),
            utilization: fields[2].parse().unwrap_or(0.0),
            memory_used: fields[3].parse::<i64>().unwrap_or(0) * 1024 * 1024,
            memory_total: fields[4].parse::<i64>().unwrap_or(0) * 1024 * 1024,
            temperature: fields[5].parse().unwrap_or(0),
        });
    }

    gpus
}

#[cfg(test)]
mod tests {
    use super::*;

    const CPUINFO: &str = "\
processor\t: 0
physical id\t: 0
core id\t: 0

processor\t: 1
physical id\t: 0
core id\t: 1

processor\t: 2
physical id\t: 0
core id\t: 0

processor\t: 3
physical id\t: 0
core id\t: 1
";

    #[test]
    fn topology_counts_unique_socket_core_pairs() {
        let (cores, threads) = parse_cpu_topology(CPUINFO);
        assert_eq!(cores, 2);
        assert_eq!(threads, 4);
    }

    #[test]
    fn topology_falls_back_to_heuristic_without_core_ids() {
        // Containers often expose processor entries without topology fields
        let data = "processor\t: 0\nbogomips\t: 4800.00\n\nprocessor\t: 1\nbogomips\t: 4800.00\n";
        let (cores, threads) = parse_cpu_topology(data);
        assert_eq!(threads, 2);
        assert_eq!(cores, 1);
    }

    #[test]
    fn cpu_times_parse_aggregate_line() {
        let data = "cpu  100 5 50 800 20 3 2 1 0 0\ncpu0 50 2 25 400 10 1 1 0 0 0\n";
        let times = parse_cpu_times(data).unwrap();
        assert_eq!(times.user, 100);
        assert_eq!(times.idle, 800);
        assert_eq!(times.total(), 981);
    }

    #[test]
    fn meminfo_prefers_memavailable_over_memfree() {
        let data = "MemTotal:       16384000 kB\nMemFree:         1000000 kB\nMemAvailable:    8000000 kB\nBuffers:          500000 kB\n";
        let (total, available) = parse_meminfo(data);
        assert_eq!(total, 16384000 * 1024);
        assert_eq!(available, 8000000 * 1024);
    }

    #[test]
    fn meminfo_uses_memfree_when_memavailable_absent() {
        let data = "MemFree:         1000000 kB\nMemTotal:       16384000 kB\n";
        let (total, available) = parse_meminfo(data);
        assert_eq!(total, 16384000 * 1024);
        assert_eq!(available, 1000000 * 1024);
    }

    #[test]
    fn loadavg_and_uptime_parse() {
        assert_eq!(parse_loadavg("1.50 0.75 0.25 2/345 6789\n"), [1.5, 0.75, 0.25]);
        assert_eq!(parse_uptime("12345.67 54321.00\n"), 12345);
        assert_eq!(parse_uptime(""), 0);
    }

    #[test]
    fn numactl_available_line_parses() {
        let output = "available: 2 nodes (0-1)\nnode 0 cpus: 0 1 2 3\n";
        assert_eq!(parse_numactl_hardware(output), 2);
        assert_eq!(parse_numactl_hardware("no nodes here"), 0);
    }

    #[test]
    fn gpu_csv_converts_mib_to_bytes() {
        let output = "0, NVIDIA GeForce RTX 3060, 45, 2048, 12288, 61\n";
        let gpus = parse_gpu_csv(output);
        assert_eq!(gpus.len(), 1);
        assert_eq!(gpus[0].id, "0");
        assert_eq!(gpus[0].name, "NVIDIA GeForce RTX 3060");
        assert_eq!(gpus[0].utilization, 45.0);
        assert_eq!(gpus[0].memory_used, 2048 * 1024 * 1024);
        assert_eq!(gpus[0].memory_total, 12288 * 1024 * 1024);
        assert_eq!(gpus[0].temperature, 61);
    }

    #[test]
    fn gpu_csv_skips_malformed_rows() {
        assert!(parse_gpu_csv("garbage\n").is_empty());
        assert!(parse_gpu_csv("").is_empty());
    }

    #[tokio::test]
    async fn missing_gpu_cli_yields_empty_list() {
        let probe = SystemProbe::new("/nonexistent/nvidia-smi", "/nonexistent/numactl");
        assert!(!probe.gpu_available().await);
        assert!(probe.gpu_info().await.is_empty());
    }

    #[test]
    fn first_cpu_usage_sample_is_zero() {
        let probe = SystemProbe::new("nvidia-smi", "numactl");
        // Baseline call returns 0 regardless of host state
        assert_eq!(probe.cpu_usage(), 0.0);
    }
}
