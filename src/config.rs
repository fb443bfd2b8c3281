use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use super::Result;

/// Name of the config file looked for in the working directory
pub const CONFIG_FILE: &str = "rbaccat.yml";

fn default_workers() -> usize {
    4
}

/// Main config, serializable from rbaccat.yml
///
/// Every field is optional; a missing file is the default config.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Policy files or directories to load when none are given
    #[serde(default)]
    pub policies: Vec<PathBuf>,
    /// Treat dangling role references as validation errors
    #[serde(default)]
    pub strict: bool,
    /// Print json audit records for can-i decisions
    #[serde(default)]
    pub audit: bool,
    /// Worker threads for batch evaluation
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            policies: vec![],
            strict: false,
            audit: false,
            workers: default_workers(),
        }
    }
}

impl Config {
    pub fn verify(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        for p in &self.policies {
            if p.as_os_str().is_empty() {
                bail!("policy paths cannot be empty");
            }
        }
        Ok(())
    }

    /// Read a config file in an arbitrary path
    pub fn read_from(pth: &Path) -> Result<Config> {
        trace!("Using config in {}", pth.display());
        if !pth.exists() {
            bail!("Config file {} does not exist", pth.display())
        }
        let mut f = File::open(&pth)?;
        let mut data = String::new();
        f.read_to_string(&mut data)?;
        if data.trim().is_empty() {
            return Ok(Config::default());
        }
        let conf: Config = serde_yaml::from_str(&data)?;
        conf.verify()?;
        Ok(conf)
    }

    /// Read the config in pwd, or the defaults if there is none
    pub fn read() -> Result<Config> {
        let pth = Path::new(".").join(CONFIG_FILE);
        if !pth.is_file() {
            debug!("No {} found, using defaults", CONFIG_FILE);
            return Ok(Config::default());
        }
        Config::read_from(&pth)
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn defaults_fill_missing_fields() {
        let conf: Config = serde_yaml::from_str("strict: true\n").unwrap();
        assert!(conf.strict);
        assert_eq!(conf.workers, 4);
        assert!(conf.policies.is_empty());
        assert!(conf.verify().is_ok());
    }

    #[test]
    fn rejects_nonsense() {
        assert!(serde_yaml::from_str::<Config>("strcit: true\n").is_err());
        let conf: Config = serde_yaml::from_str("workers: 0\n").unwrap();
        assert!(conf.verify().is_err());
    }
}
