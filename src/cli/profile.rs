//! Per-profile CLI settings in ~/.formgate

use formgate_client::{ClientConfig, FormError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Profile {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub log_level: Option<String>,
}

impl Profile {
    pub fn load(profile: Option<&str>) -> Result<Self> {
        let path = Self::path(profile)?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| FormError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save(&self, profile: Option<&str>) -> Result<PathBuf> {
        let path = Self::path(profile)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| FormError::Config(e.to_string()))?;
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Defaults overlaid with this profile
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config
    }

    fn path(profile: Option<&str>) -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| FormError::Config("Cannot find home directory".into()))?;
        let filename = match profile {
            Some(p) => format!("config.{}.toml", p),
            None => "config.toml".to_string(),
        };
        Ok(home.join(".formgate").join(filename))
    }
}

/// `formgate config init`
pub fn init(profile: Option<&str>, base_url: Option<String>) -> Result<()> {
    let mut settings = Profile::load(profile)?;
    if base_url.is_some() {
        settings.base_url = base_url;
    }
    settings.client_config().validate()?;
    let path = settings.save(profile)?;
    println!("Wrote {}", path.display());
    Ok(())
}
