//! Application wiring: seed the snapshot, construct workers, run the loop

use crate::config::AppConfig;
use anyhow::{Context, Result};
use log::{info, warn};
use rg_pipe_core::{spawn_construction, Aggregator, Registry, Template, WORKER_CHANNEL_CAPACITY};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One configured pipe: entries, template and the receivers they use
pub struct App {
    config: AppConfig,
    registry: Arc<Registry>,
    once: bool,
}

impl App {
    pub fn new(config: AppConfig, registry: Registry) -> Self {
        Self {
            config,
            registry: Arc::new(registry),
            once: false,
        }
    }

    /// Single-shot mode: every worker stops after one cycle
    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Render into `sink` until cancelled (or, when running once, until
    /// every worker is done) and hand the sink back
    ///
    /// An invalid template is a startup error. Entries without a known
    /// receiver are logged and skipped. If that leaves nothing to run, the
    /// pipe stays open and silent until cancelled.
    pub async fn run<W: Write>(self, sink: W, cancel: CancellationToken) -> Result<W> {
        let template = Template::parse(&self.config.template, &self.config.delims)
            .context("invalid template")?;
        let mut aggregator = Aggregator::new(template, sink);

        let (ready, workers) = mpsc::channel(WORKER_CHANNEL_CAPACITY);
        let mut spawned = 0;
        for (name, entry) in &self.config.entries {
            let Some(receiver) = entry.receiver_type() else {
                warn!("{}: no `receiver` key, not spawning worker", name);
                continue;
            };
            let zero = match self.registry.get_zero(receiver) {
                Ok(zero) => zero,
                Err(e) => {
                    warn!("{}: {}, not spawning worker", name, e);
                    continue;
                }
            };

            aggregator.seed(name.clone(), zero);
            spawn_construction(
                name.clone(),
                entry.clone(),
                self.registry.clone(),
                self.once,
                ready.clone(),
                cancel.clone(),
            );
            spawned += 1;
        }
        // Construction tasks hold the remaining senders
        drop(ready);
        info!("Constructing {} worker(s)", spawned);

        if spawned == 0 && !self.once {
            warn!("No entry has a usable receiver, idling until cancelled");
            cancel.cancelled().await;
        }

        aggregator
            .run(workers, cancel)
            .await
            .context("cannot write output")?;
        Ok(aggregator.into_sink())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;
    use async_trait::async_trait;
    use rg_pipe_core::{Receiver, ReceiverConfig, ReceiverFactory, ReceiverHandle, Value};
    use serde_json::json;
    use std::time::Duration;

    struct FakeBattery;

    #[async_trait]
    impl Receiver for FakeBattery {
        async fn init(&mut self, _config: &ReceiverConfig) -> anyhow::Result<()> {
            Ok(())
        }

        async fn get(&mut self) -> anyhow::Result<Option<Value>> {
            Ok(Some(json!({"charge": 0.5, "percent": 50.0, "state": "Discharging"})))
        }
    }

    #[derive(Default)]
    struct Clock {
        ticks: u64,
    }

    #[async_trait]
    impl Receiver for Clock {
        async fn init(&mut self, _config: &ReceiverConfig) -> anyhow::Result<()> {
            Ok(())
        }

        async fn get(&mut self) -> anyhow::Result<Option<Value>> {
            self.ticks += 1;
            Ok(Some(Value::from(self.ticks)))
        }
    }

    fn battery() -> ReceiverHandle {
        ReceiverHandle::polling(FakeBattery)
    }

    fn clock() -> ReceiverHandle {
        ReceiverHandle::polling(Clock::default())
    }

    fn registry() -> Registry {
        Registry::from_table([
            (
                "battery",
                battery as ReceiverFactory,
                json!({"charge": 0.0, "percent": 0.0, "state": ""}),
            ),
            ("clock", clock as ReceiverFactory, Value::from(0)),
        ])
    }

    fn config() -> AppConfig {
        let source = r#"
            [Bat]
            receiver = "battery"
            pollInterval = "10s"

            [Clock]
            receiver = "clock"

            [Pipe]
            template = "<.Bat.percent>% <.Clock>"
        "#;
        AppConfig::parse(source, ConfigFormat::Toml).unwrap()
    }

    fn lines(output: Vec<u8>) -> Vec<String> {
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_renders_updates_until_cancelled() {
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(3500)).await;
            stopper.cancel();
        });

        let output = App::new(config(), registry())
            .run(Vec::new(), cancel)
            .await
            .unwrap();
        let lines = lines(output);

        // Clock: initial value plus ticks at 1s, 2s and 3s
        assert!(lines.len() >= 4, "{:?}", lines);
        assert_eq!(lines.last().unwrap(), "50% 4");
        assert!(lines.windows(2).all(|pair| pair[0] != pair[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_terminates_and_skips_unknown_entries() {
        let mut config = config();
        config.entries.insert(
            "Ghost".to_string(),
            ReceiverConfig::new().with("receiver", "ghost"),
        );
        config
            .entries
            .insert("Nameless".to_string(), ReceiverConfig::new());

        let output = App::new(config, registry())
            .once(true)
            .run(Vec::new(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(lines(output).last().unwrap(), "50% 2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_usable_entries_waits_for_cancel() {
        let mut config = config();
        config.entries.clear();
        config.entries.insert(
            "Ghost".to_string(),
            ReceiverConfig::new().with("receiver", "ghost"),
        );
        config.template = "idle".to_string();

        let cancel = CancellationToken::new();
        let app = App::new(config, registry());
        let run = tokio::spawn(app.run(Vec::new(), cancel.clone()));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!run.is_finished());

        cancel.cancel();
        let output = run.await.unwrap().unwrap();
        assert!(output.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_usable_entries_once_returns() {
        let mut config = config();
        config.entries.clear();
        config.template = "idle".to_string();

        let output = App::new(config, registry())
            .once(true)
            .run(Vec::new(), CancellationToken::new())
            .await
            .unwrap();
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_template_is_an_error() {
        let mut config = config();
        config.template = "<.Clock".to_string();

        let result = App::new(config, registry())
            .run(Vec::new(), CancellationToken::new())
            .await;
        assert!(result.is_err());
    }
}
