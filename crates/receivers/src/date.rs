//! Date/time receiver

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::{Local, Utc};
use chrono_tz::Tz;
use rg_pipe_core::Receiver;
use rg_pipe_types::ReceiverConfig;
use serde_json::Value;

const DEFAULT_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Current date and time, formatted with a strftime pattern
///
/// Config keys: `format` (default `%d/%m/%Y %H:%M:%S`) and `timezone`
/// (`Local` or an IANA name such as `Europe/Warsaw`).
#[derive(Debug, Clone)]
pub struct DateReceiver {
    format: String,
    timezone: Option<Tz>,
}

impl Default for DateReceiver {
    fn default() -> Self {
        Self {
            format: DEFAULT_FORMAT.to_string(),
            timezone: None,
        }
    }
}

impl DateReceiver {
    fn now(&self) -> String {
        match self.timezone {
            Some(tz) => Utc::now().with_timezone(&tz).format(&self.format).to_string(),
            None => Local::now().format(&self.format).to_string(),
        }
    }
}

#[async_trait]
impl Receiver for DateReceiver {
    async fn init(&mut self, config: &ReceiverConfig) -> Result<()> {
        let format = config.get_str("format").unwrap_or(DEFAULT_FORMAT);
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            bail!("Date: invalid format `{}`", format);
        }

        self.timezone = match config.get_str("timezone") {
            None | Some("Local") | Some("local") => None,
            Some(name) => Some(
                name.parse::<Tz>()
                    .map_err(|e| anyhow!("Date: unknown timezone `{}`: {}", name, e))?,
            ),
        };
        self.format = format.to_string();
        Ok(())
    }

    async fn get(&mut self) -> Result<Option<Value>> {
        Ok(Some(Value::from(self.now())))
    }
}
