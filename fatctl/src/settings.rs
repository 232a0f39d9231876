use std::path::{Path, PathBuf};

use fat83fs::config::DEFAULT_IMAGE_SIZE;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::utils::CtlResult;

pub const CONFIG_FILE: &str = "fat83.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Backing image file.
    pub image: PathBuf,
    /// env_logger filter.
    pub log: String,
    /// Size in bytes used by `format`.
    pub image_size: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image: PathBuf::from(".disk"),
            log: String::from("info"),
            image_size: DEFAULT_IMAGE_SIZE,
        }
    }
}

impl Settings {
    /// Defaults, then the config file (if present), then `FAT83_*` variables.
    pub fn load(config: &Path) -> CtlResult<Self> {
        let settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config))
            .merge(Env::prefixed("FAT83_"))
            .extract()?;
        Ok(settings)
    }
}
