//! Pipe configuration: the output template plus one section per entry

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use rg_pipe_core::{Delims, ReceiverConfig};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Reserved section holding the template settings
pub const PIPE_SECTION: &str = "Pipe";

/// File looked up in the config directory when no path is given
pub const CONFIG_FILE: &str = "config.toml";

const DEFAULT_CONFIG: &str = r#"# Every table except [Pipe] is a named entry driven by one receiver.
[Now]
receiver = "date"
pollInterval = "1s"

[Pipe]
template = "<.Now>"
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// `.json` files are JSON, everything else is TOML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PipeSection {
    template: String,
    #[serde(default)]
    delims: Option<Vec<String>>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Template source rendered on every change
    pub template: String,
    pub delims: Delims,
    /// Entry name -> receiver configuration, passed through verbatim
    pub entries: BTreeMap<String, ReceiverConfig>,
}

impl AppConfig {
    /// Parse configuration text
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let sections: BTreeMap<String, Value> = match format {
            ConfigFormat::Toml => toml::from_str(content).context("invalid TOML")?,
            ConfigFormat::Json => serde_json::from_str(content).context("invalid JSON")?,
        };

        let mut pipe = None;
        let mut entries = BTreeMap::new();
        for (name, section) in sections {
            if name == PIPE_SECTION {
                pipe = Some(section);
                continue;
            }
            let entry: ReceiverConfig = serde_json::from_value(section)
                .with_context(|| format!("section `{}` must be a table", name))?;
            entries.insert(name, entry);
        }

        let pipe = pipe.ok_or_else(|| anyhow!("missing `{}` section", PIPE_SECTION))?;
        let pipe: PipeSection = serde_json::from_value(pipe)
            .with_context(|| format!("invalid `{}` section", PIPE_SECTION))?;

        let delims = match pipe.delims.as_deref() {
            None => Delims::default(),
            Some([left, right]) => Delims::new(left.as_str(), right.as_str()),
            Some(other) => bail!("`delims` must hold two strings, got {}", other.len()),
        };

        Ok(Self {
            template: pipe.template,
            delims,
            entries,
        })
    }

    /// Load configuration from a specific file path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Self::parse(&content, ConfigFormat::from_path(path))
            .with_context(|| format!("in {}", path.display()))
    }

    /// Load from `path`, or from the per-user config directory
    ///
    /// Returns the configuration and the file it came from.
    pub fn load(path: Option<&Path>) -> Result<(Self, PathBuf)> {
        Self::load_in(path, &Self::config_dir()?)
    }

    /// Same as [`AppConfig::load`] with an explicit config directory
    ///
    /// A relative path that does not exist is taken relative to `dir`.
    /// Without a path, `dir/config.toml` is used and written with a
    /// default configuration if missing.
    pub fn load_in(path: Option<&Path>, dir: &Path) -> Result<(Self, PathBuf)> {
        let path = match path {
            Some(path) if path.exists() || path.is_absolute() => path.to_path_buf(),
            Some(path) => dir.join(path),
            None => {
                let path = dir.join(CONFIG_FILE);
                if !path.exists() {
                    Self::write_default(&path)?;
                }
                path
            }
        };
        let config = Self::load_from_path(&path)?;
        Ok((config, path))
    }

    /// Write the default configuration to `path`
    pub fn write_default(path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        std::fs::write(path, DEFAULT_CONFIG)
            .with_context(|| format!("cannot write {}", path.display()))?;
        info!("Wrote default configuration to {}", path.display());
        Ok(())
    }

    /// Get the per-user configuration directory
    pub fn config_dir() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "github.hilgardt_collab", "rg-pipe")
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(dirs.config_dir().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let config = AppConfig::parse(
            r#"
            [Battery]
            receiver = "battery"
            pollInterval = "10s"
            number = 1

            [Pipe]
            template = "{{.Battery.percent}}%"
            delims = ["{{", "}}"]
            "#,
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(config.template, "{{.Battery.percent}}%");
        assert_eq!(config.delims, Delims::new("{{", "}}"));
        assert_eq!(config.entries.len(), 1);
        let battery = &config.entries["Battery"];
        assert_eq!(battery.receiver_type(), Some("battery"));
        assert_eq!(battery.get_i64("number"), Some(1));
    }

    #[test]
    fn test_parse_json_with_default_delims() {
        let config = AppConfig::parse(
            r#"{"Now": {"receiver": "date"}, "Pipe": {"template": "<.Now>"}}"#,
            ConfigFormat::Json,
        )
        .unwrap();
        assert_eq!(config.delims, Delims::default());
        assert!(config.entries.contains_key("Now"));
    }

    #[test]
    fn test_parse_errors() {
        let no_pipe = AppConfig::parse("[Now]\nreceiver = \"date\"\n", ConfigFormat::Toml);
        assert!(no_pipe.unwrap_err().to_string().contains("missing `Pipe`"));

        let no_template = AppConfig::parse("[Pipe]\ndelims = [\"<\", \">\"]\n", ConfigFormat::Toml);
        assert!(no_template.is_err());

        let bad_delims =
            AppConfig::parse("[Pipe]\ntemplate = \"x\"\ndelims = [\"<\"]\n", ConfigFormat::Toml);
        assert!(bad_delims.is_err());

        let not_a_table = AppConfig::parse("Now = 3\n[Pipe]\ntemplate = \"x\"\n", ConfigFormat::Toml);
        assert!(not_a_table.is_err());

        assert!(AppConfig::parse("[Pipe", ConfigFormat::Toml).is_err());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("a.JSON")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("config")), ConfigFormat::Toml);
    }

    #[test]
    fn test_load_writes_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("rg-pipe");

        let (config, path) = AppConfig::load_in(None, &config_dir).unwrap();
        assert_eq!(path, config_dir.join(CONFIG_FILE));
        assert!(path.exists());
        assert_eq!(config.template, "<.Now>");
        assert_eq!(config.entries["Now"].receiver_type(), Some("date"));
    }

    #[test]
    fn test_load_resolves_relative_to_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bar.json"),
            r#"{"Pipe": {"template": "static"}}"#,
        )
        .unwrap();

        let (config, path) = AppConfig::load_in(Some(Path::new("bar.json")), dir.path()).unwrap();
        assert_eq!(path, dir.path().join("bar.json"));
        assert_eq!(config.template, "static");
        assert!(config.entries.is_empty());

        assert!(AppConfig::load_in(Some(Path::new("missing.toml")), dir.path()).is_err());
    }
}
