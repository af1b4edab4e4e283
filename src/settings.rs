use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::Config;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "insights.toml";
const ENV_PREFIX: &str = "INSIGHTS";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub input: InputSettings,
    pub output: OutputSettings,
    pub render: RenderSettings,
    pub timings: Timings,
    pub selectors: Selectors,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InputSettings {
    pub name_column: String,
    pub url_column: String,
}

impl Default for InputSettings {
    fn default() -> Self {
        InputSettings {
            name_column: "name".into(),
            url_column: "url_tarjeta".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Characters of the entity name kept in sheet names.
    pub sheet_prefix_len: usize,
    /// Row cap for the geography and ranked-item blocks.
    pub max_rows: usize,
}

impl Default for OutputSettings {
    fn default() -> Self {
        OutputSettings {
            sheet_prefix_len: 14,
            max_rows: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Http,
    Spider,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub backend: Backend,
    pub accept_language: String,
    pub user_agent: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            backend: Backend::Http,
            accept_language: "es-ES,es;q=0.9".into(),
            user_agent: concat!("artist_insights/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// All waits in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub navigation_ms: u64,
    pub network_idle_ms: u64,
    pub settle_ms: u64,
    pub series_wait_ms: u64,
    pub list_wait_ms: u64,
    pub politeness_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Timings {
            navigation_ms: 120_000,
            network_idle_ms: 15_000,
            settle_ms: 5_000,
            series_wait_ms: 10_000,
            list_wait_ms: 8_000,
            politeness_ms: 2_000,
        }
    }
}

impl Timings {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }
    pub fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
    pub fn series_wait(&self) -> Duration {
        Duration::from_millis(self.series_wait_ms)
    }
    pub fn list_wait(&self) -> Duration {
        Duration::from_millis(self.list_wait_ms)
    }
    pub fn politeness(&self) -> Duration {
        Duration::from_millis(self.politeness_ms)
    }

    /// No pauses at all; waits still bounded by zero.
    #[cfg(test)]
    pub fn immediate() -> Self {
        Timings {
            navigation_ms: 0,
            network_idle_ms: 0,
            settle_ms: 0,
            series_wait_ms: 0,
            list_wait_ms: 0,
            politeness_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub series_widget: String,
    pub location_title: String,
    pub location_subtitle: String,
    pub item_thumb: String,
    pub item_count: String,
    pub item_label_attr: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Selectors {
            series_widget: "ytmc-views-card-v2".into(),
            location_title: ".entityTitleForInsightsPageLocationEntity".into(),
            location_subtitle: ".subtitleForInsightsPageLocationEntity".into(),
            item_thumb: "img.thumbForInsightsPageSongEntity".into(),
            item_count: ".viewscount".into(),
            item_label_attr: "aria-label".into(),
        }
    }
}

/// Defaults, then the TOML file (explicit path must exist, default one may not),
/// then `INSIGHTS_*` environment variables.
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let file = match path {
        Some(p) => config::File::from(p).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let settings = Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read settings")?
        .try_deserialize::<Settings>()
        .context("Invalid settings")?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_insights_page() {
        let s = Settings::default();
        assert_eq!(s.timings.navigation(), Duration::from_secs(120));
        assert_eq!(s.timings.list_wait(), Duration::from_secs(8));
        assert_eq!(s.output.max_rows, 10);
        assert_eq!(s.output.sheet_prefix_len, 14);
        assert_eq!(s.render.backend, Backend::Http);
        assert_eq!(s.selectors.item_label_attr, "aria-label");
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[timings]\nsettle_ms = 250\n\n[render]\nbackend = \"spider\"\n\n[input]\nurl_column = \"url\"\n",
        )
        .unwrap();

        let s = load(Some(path.as_path())).unwrap();
        assert_eq!(s.timings.settle(), Duration::from_millis(250));
        assert_eq!(s.timings.navigation_ms, 120_000);
        assert_eq!(s.render.backend, Backend::Spider);
        assert_eq!(s.input.url_column, "url");
        assert_eq!(s.input.name_column, "name");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load(Some(missing.as_path())).is_err());
    }
}
