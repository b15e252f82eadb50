use std::path::{Path, PathBuf};

use evaluator::Settings;
use thiserror::Error;

/// Settings file looked up at the vault root when no `--config` is given.
pub const CONFIG_FILE: &str = "quill.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Load settings from `explicit`, or from `quill.toml` in `vault_root` when
/// present. Missing keys keep their defaults.
pub fn load_settings(vault_root: &Path, explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = vault_root.join(CONFIG_FILE);
            if !path.is_file() {
                log::debug!("no {} in {}, using defaults", CONFIG_FILE, vault_root.display());
                return Ok(Settings::default());
            }
            path
        }
    };

    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let settings = parse_settings(&text).map_err(|source| ConfigError::Parse { path: path.clone(), source })?;
    log::debug!("loaded settings from {}: {:?}", path.display(), settings);
    Ok(settings)
}

pub fn parse_settings(text: &str) -> Result<Settings, toml::de::Error> {
    toml::from_str(text)
}

/// Settings given on the command line. They win over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub lang: Option<String>,
    pub full_errors: bool,
    pub no_unsafe_html: bool,
}

impl Overrides {
    pub fn apply(&self, mut settings: Settings) -> Settings {
        if let Some(lang) = &self.lang {
            settings.block_language = lang.clone();
        }
        if self.full_errors {
            settings.full_errors = true;
        }
        if self.no_unsafe_html {
            settings.allow_unsafe_html = false;
        }
        settings
    }
}
