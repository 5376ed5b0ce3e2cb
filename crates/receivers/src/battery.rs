//! Battery receiver backed by the Linux power_supply sysfs class

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use rg_pipe_core::Receiver;
use rg_pipe_types::ReceiverConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// Battery charge and state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryResponse {
    /// Charge level in 0.0..=1.0
    pub charge: f64,
    /// Charge level in percent, clamped to 100
    pub percent: f64,
    /// Kernel status string ("Charging", "Discharging", "Full", ...)
    pub state: String,
}

/// Reads `BAT<number>` under the power_supply class
///
/// Config keys: `number` (default 0) and `path` (default
/// `/sys/class/power_supply`).
#[derive(Debug, Clone)]
pub struct BatteryReceiver {
    number: u32,
    root: PathBuf,
}

impl Default for BatteryReceiver {
    fn default() -> Self {
        Self {
            number: 0,
            root: PathBuf::from(POWER_SUPPLY_ROOT),
        }
    }
}

async fn read_trimmed(path: &Path) -> Result<String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Battery: cannot read {}", path.display()))?;
    Ok(content.trim().to_string())
}

async fn read_number(path: &Path) -> Option<f64> {
    read_trimmed(path).await.ok()?.parse().ok()
}

/// Round to single precision, keeping the shortest decimal form
///
/// Ratios of kernel counters carry more digits than anyone wants on a
/// status line: `0.573` rather than `0.5730000138282776`.
fn single_precision(value: f64) -> f64 {
    let narrow = value as f32;
    narrow.to_string().parse().unwrap_or(value)
}

impl BatteryReceiver {
    fn device_dir(&self) -> PathBuf {
        self.root.join(format!("BAT{}", self.number))
    }

    /// Charge ratio from energy or charge counters, falling back to `capacity`
    async fn read_charge(&self, dir: &Path) -> Result<f64> {
        for (now, full) in [("energy_now", "energy_full"), ("charge_now", "charge_full")] {
            if let (Some(now), Some(full)) = (
                read_number(&dir.join(now)).await,
                read_number(&dir.join(full)).await,
            ) {
                if full > 0.0 {
                    return Ok(now / full);
                }
            }
        }

        let capacity = read_trimmed(&dir.join("capacity")).await?;
        let capacity: f64 = capacity
            .parse()
            .map_err(|e| anyhow!("Battery: bad capacity `{}`: {}", capacity, e))?;
        Ok(capacity / 100.0)
    }
}

#[async_trait]
impl Receiver for BatteryReceiver {
    async fn init(&mut self, config: &ReceiverConfig) -> Result<()> {
        if let Some(number) = config.get("number") {
            let number = number
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| anyhow!("Battery: `number` must be a non-negative integer"))?;
            self.number = number;
        }
        if let Some(path) = config.get("path") {
            match path.as_str() {
                Some(path) => self.root = PathBuf::from(path),
                None => bail!("Battery: `path` must be a string"),
            }
        }
        Ok(())
    }

    async fn get(&mut self) -> Result<Option<Value>> {
        let dir = self.device_dir();
        let charge = self.read_charge(&dir).await?;
        let state = read_trimmed(&dir.join("status"))
            .await
            .unwrap_or_else(|_| "Unknown".to_string());

        // Some controllers report more than full
        let percent = (charge * 100.0).min(100.0);
        let response = BatteryResponse {
            charge: single_precision(charge),
            percent: single_precision(percent),
            state,
        };
        Ok(Some(serde_json::to_value(response)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rg_pipe_core::{Delims, Render, Snapshot, Template};
    use std::fs;

    fn fake_battery(files: &[(&str, &str)]) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("BAT1");
        fs::create_dir(&dir).unwrap();
        for (name, content) in files {
            fs::write(dir.join(name), format!("{}\n", content)).unwrap();
        }
        root
    }

    async fn receiver_for(root: &tempfile::TempDir) -> BatteryReceiver {
        let mut receiver = BatteryReceiver::default();
        let config = ReceiverConfig::new()
            .with("number", 1)
            .with("path", root.path().to_str().unwrap());
        receiver.init(&config).await.unwrap();
        receiver
    }

    #[tokio::test]
    async fn test_energy_counters() {
        let root = fake_battery(&[
            ("energy_now", "25000000"),
            ("energy_full", "50000000"),
            ("status", "Discharging"),
        ]);
        let mut receiver = receiver_for(&root).await;

        let value = receiver.get().await.unwrap().unwrap();
        let response: BatteryResponse = serde_json::from_value(value).unwrap();
        assert_eq!(
            response,
            BatteryResponse {
                charge: 0.5,
                percent: 50.0,
                state: "Discharging".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_fractional_charge_renders_short() {
        let root = fake_battery(&[
            ("charge_now", "573"),
            ("charge_full", "1000"),
            ("status", "Charging"),
        ]);
        let mut receiver = receiver_for(&root).await;

        let value = receiver.get().await.unwrap().unwrap();
        assert_eq!(value["percent"], 57.3);
        assert_eq!(value["charge"], 0.573);

        let template =
            Template::parse("<.Bat.Percent>% <.Bat.Charge>", &Delims::default()).unwrap();
        let snapshot = Snapshot::from([("Bat".to_string(), value)]);
        assert_eq!(template.render(&snapshot).unwrap(), "57.3% 0.573\n");
    }

    #[test]
    fn test_single_precision() {
        assert_eq!(single_precision(0.5730000000000001), 0.573);
        assert_eq!(single_precision(57.29999999999999), 57.3);
        assert_eq!(single_precision(100.0), 100.0);
    }

    #[tokio::test]
    async fn test_capacity_fallback_is_clamped() {
        let root = fake_battery(&[("capacity", "104"), ("status", "Full")]);
        let mut receiver = receiver_for(&root).await;

        let value = receiver.get().await.unwrap().unwrap();
        assert_eq!(value["percent"], 100.0);
        assert_eq!(value["state"], "Full");
    }

    #[tokio::test]
    async fn test_missing_battery_is_a_fetch_error() {
        let root = tempfile::tempdir().unwrap();
        let mut receiver = receiver_for(&root).await;
        assert!(receiver.get().await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_bad_number() {
        let mut receiver = BatteryReceiver::default();
        let config = ReceiverConfig::new().with("number", "first");
        assert!(receiver.init(&config).await.is_err());
    }
}
