use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::dom::Selector;
use crate::error::{FxError, Result};
use crate::floating::FieldConfig;
use crate::hover::HoverConfig;
use crate::typing::TypingConfig;

/// Where each effect finds its elements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Selectors {
    pub hero: String,
    pub bio: String,
    pub social_links: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            hero: ".hero".to_string(),
            bio: ".bio".to_string(),
            social_links: ".social-links a".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub field: FieldConfig,
    pub typing: TypingConfig,
    pub hover: HoverConfig,
    pub selectors: Selectors,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let f = &self.field;
        if f.size_px.min > f.size_px.max {
            return Err(FxError::Config(format!(
                "size_px min {} exceeds max {}",
                f.size_px.min, f.size_px.max
            )));
        }
        for (name, span) in [
            ("position_percent", f.position_percent),
            ("duration_sec", f.duration_sec),
            ("delay_sec", f.delay_sec),
        ] {
            if !span.width().is_finite() || span.min > span.max {
                return Err(FxError::Config(format!(
                    "{name} must be a finite range with min <= max"
                )));
            }
        }
        if self.typing.tick_interval_ms == 0 {
            return Err(FxError::Config("tick_interval_ms must be positive".into()));
        }
        if self.typing.chars_per_tick == 0 {
            return Err(FxError::Config("chars_per_tick must be positive".into()));
        }
        for sel in [
            &self.selectors.hero,
            &self.selectors.bio,
            &self.selectors.social_links,
        ] {
            Selector::parse(sel)?;
        }
        Ok(())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "hero-fx") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("hero_fx_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Like [`ConfigStore::load`] but reports why the file was unusable
    pub fn try_load(&self) -> Result<Config> {
        let bytes = fs::read(&self.path)?;
        let cfg = serde_json::from_slice::<Config>(&bytes)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match self.try_load() {
            Ok(cfg) => cfg,
            Err(FxError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                Config::default()
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "using default config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
