//! System metrics receiver (CPU, uptime, memory, swap, network)

use crate::format::bytonize;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use log::warn;
use rg_pipe_core::Receiver;
use rg_pipe_types::ReceiverConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use sysinfo::{Networks, System};

/// Pseudo interface name summing every interface
const ALL_INTERFACES: &str = "all";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    /// `cpu0`, `cpu1`... -> `"12.50%"`
    pub percent: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total: String,
    /// Used memory as reported by the kernel
    #[serde(rename = "usedF")]
    pub used: String,
    /// Total minus available
    #[serde(rename = "usedA")]
    pub used_available: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwapStats {
    pub total: String,
    pub used: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub sent: String,
    pub recv: String,
    pub download: String,
    pub upload: String,
}

/// Everything the sys receiver can report; unrequested parts stay empty
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SysResponse {
    pub cpu: CpuStats,
    /// Seconds since boot
    pub uptime: u64,
    /// Boot time as a unix timestamp
    pub boot_time: u64,
    pub memory: MemoryStats,
    pub swap: SwapStats,
    pub network: BTreeMap<String, NetworkStats>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Metric {
    CpuPercent { per_cpu: bool },
    Uptime,
    Memory,
    Swap,
    Network(Vec<String>),
}

fn parse_metric(raw: &str) -> Result<Metric> {
    let lowered = raw.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    match words.as_slice() {
        ["cpu"] => bail!("`cpu` requires an argument"),
        ["cpu", "percent"] | ["cpu", "percent", "false"] => {
            Ok(Metric::CpuPercent { per_cpu: false })
        }
        ["cpu", "percent", "true"] => Ok(Metric::CpuPercent { per_cpu: true }),
        ["cpu", "percent", other] => bail!("`cpu percent` got wrong argument `{}`", other),
        ["uptime"] => Ok(Metric::Uptime),
        ["memory"] => Ok(Metric::Memory),
        ["swap"] => Ok(Metric::Swap),
        ["network"] => Ok(Metric::Network(vec![ALL_INTERFACES.to_string()])),
        ["network", ..] => {
            // Interface names are case-sensitive, take them from the raw string
            let names = raw.split_whitespace().skip(1).map(str::to_string).collect();
            Ok(Metric::Network(names))
        }
        _ => bail!("unknown metric"),
    }
}

/// Polls system statistics through sysinfo
///
/// Config keys: `metrics` (required list, e.g. `["cpu percent true",
/// "memory", "network eth0"]`) and `shorts` (drop the `B` in unit suffixes).
pub struct SysReceiver {
    metrics: Vec<Metric>,
    shorts: bool,
    system: System,
    networks: Option<Networks>,
    /// Per-interface (received, transmitted) totals from the previous poll
    previous: HashMap<String, (u64, u64)>,
    previous_at: Option<Instant>,
}

impl Default for SysReceiver {
    fn default() -> Self {
        Self {
            metrics: Vec::new(),
            shorts: false,
            system: System::new(),
            networks: None,
            previous: HashMap::new(),
            previous_at: None,
        }
    }
}

impl SysReceiver {
    fn bytes(&self, bytes: u64) -> String {
        bytonize(bytes, false, self.shorts)
    }

    fn cpu_percent(&mut self, per_cpu: bool) -> CpuStats {
        self.system.refresh_cpu_usage();
        let percent = if per_cpu {
            self.system
                .cpus()
                .iter()
                .enumerate()
                .map(|(i, cpu)| (format!("cpu{}", i), format!("{:.2}%", cpu.cpu_usage())))
                .collect()
        } else {
            BTreeMap::from([(
                "cpu0".to_string(),
                format!("{:.2}%", self.system.global_cpu_usage()),
            )])
        };
        CpuStats { percent }
    }

    fn memory(&mut self) -> MemoryStats {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        MemoryStats {
            total: self.bytes(total),
            used: self.bytes(self.system.used_memory()),
            used_available: self.bytes(total.saturating_sub(self.system.available_memory())),
        }
    }

    fn swap(&mut self) -> SwapStats {
        self.system.refresh_memory();
        SwapStats {
            total: self.bytes(self.system.total_swap()),
            used: self.bytes(self.system.used_swap()),
        }
    }

    /// Current (received, transmitted) totals for an interface
    fn interface_totals(networks: &Networks, name: &str) -> Option<(u64, u64)> {
        if name == ALL_INTERFACES {
            return Some(networks.iter().fold((0, 0), |(rx, tx), (_, data)| {
                (rx + data.total_received(), tx + data.total_transmitted())
            }));
        }
        networks
            .iter()
            .find(|(iface, _)| iface.as_str() == name)
            .map(|(_, data)| (data.total_received(), data.total_transmitted()))
    }

    fn network(
        &mut self,
        interfaces: &[String],
        elapsed: Option<f64>,
    ) -> BTreeMap<String, NetworkStats> {
        let networks = self
            .networks
            .get_or_insert_with(Networks::new_with_refreshed_list);
        networks.refresh();

        let mut stats = BTreeMap::new();
        for name in interfaces {
            let Some((received, transmitted)) = Self::interface_totals(networks, name) else {
                warn!("Sys: network interface `{}` not found", name);
                stats.insert(name.clone(), NetworkStats::default());
                continue;
            };

            let speed = |now: u64, before: Option<u64>| -> u64 {
                match (before, elapsed) {
                    (Some(before), Some(secs)) if secs > 0.0 => {
                        (now.saturating_sub(before) as f64 / secs) as u64
                    }
                    _ => 0,
                }
            };
            let previous = self.previous.get(name).copied();
            let download = speed(received, previous.map(|(rx, _)| rx));
            let upload = speed(transmitted, previous.map(|(_, tx)| tx));
            self.previous.insert(name.clone(), (received, transmitted));

            stats.insert(
                name.clone(),
                NetworkStats {
                    sent: bytonize(transmitted, false, self.shorts),
                    recv: bytonize(received, false, self.shorts),
                    download: bytonize(download, true, self.shorts),
                    upload: bytonize(upload, true, self.shorts),
                },
            );
        }
        stats
    }
}

#[async_trait]
impl Receiver for SysReceiver {
    async fn init(&mut self, config: &ReceiverConfig) -> Result<()> {
        let raw = config
            .get_str_list("metrics")
            .ok_or_else(|| anyhow!("Sys: `metrics` list is required"))?;

        let mut metrics = Vec::with_capacity(raw.len());
        for metric in &raw {
            match parse_metric(metric) {
                Ok(parsed) => metrics.push(parsed),
                Err(e) => warn!("Sys: ignoring `{}`: {}", metric, e),
            }
        }
        if metrics.is_empty() {
            bail!("Sys: no usable metrics in {:?}", raw);
        }

        self.metrics = metrics;
        self.shorts = config.get_bool("shorts").unwrap_or(false);
        Ok(())
    }

    async fn get(&mut self) -> Result<Option<Value>> {
        let now = Instant::now();
        let elapsed = self
            .previous_at
            .map(|before| now.duration_since(before).as_secs_f64());

        let mut response = SysResponse::default();
        for metric in self.metrics.clone() {
            match metric {
                Metric::CpuPercent { per_cpu } => response.cpu = self.cpu_percent(per_cpu),
                Metric::Uptime => {
                    response.uptime = System::uptime();
                    response.boot_time = System::boot_time();
                }
                Metric::Memory => response.memory = self.memory(),
                Metric::Swap => response.swap = self.swap(),
                Metric::Network(interfaces) => {
                    let stats = self.network(&interfaces, elapsed);
                    response.network.extend(stats);
                }
            }
        }
        self.previous_at = Some(now);

        Ok(Some(serde_json::to_value(response)?))
    }
}
