use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{new_iscsi, InducedErrors, Iscsi, MockIscsi, Options};

/// Client configuration, usually kept as yaml:
///
/// ```yaml
/// mock: false
/// options:
///   chrootDirectory: /noderoot
/// ```
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    mock: bool,
    #[serde(default)]
    options: BTreeMap<String, String>,
    /// only honored by the mock backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    induced_errors: Option<InducedErrors>,
}

impl Config {
    pub fn new(mock: bool, options: &Options) -> Self {
        Config {
            mock,
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            induced_errors: None,
        }
    }

    /// create `Config` from yaml string
    pub fn from(s: &str) -> Result<Config> {
        let config = serde_yml::from_str::<Config>(s)?;
        Ok(config)
    }

    /// create `Config` from yaml file
    pub fn read<S: AsRef<Path>>(filename: S) -> Result<Config> {
        let s = fs::read_to_string(filename)?;
        Config::from(&s)
    }

    /// encodes `Config` to yaml string
    pub fn to_yml(&self) -> Result<String> {
        let s = serde_yml::to_string(self)?;
        Ok(s)
    }

    /// echo `Config` yaml string to the file
    pub fn write_to<S: AsRef<Path>>(&self, filename: S) -> Result<()> {
        let yml = self.to_yml()?;
        fs::write(filename, yml)?;

        Ok(())
    }

    pub fn mock(&self) -> bool {
        self.mock
    }

    pub fn options(&self) -> Options {
        self.options
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    pub fn induced_errors(&self) -> Option<InducedErrors> {
        self.induced_errors
    }

    /// builds the configured backend
    pub fn build(&self) -> Box<dyn Iscsi> {
        match (self.mock, self.induced_errors) {
            (true, Some(errs)) => Box::new(MockIscsi::with_faults(self.options(), errs)),
            _ => new_iscsi(self.mock, self.options()),
        }
    }
}

#[cfg(test)]
mod test {
    use anyhow::Result;

    use super::Config;
    use crate::{Iscsi, Operation, Options, CHROOT_DIRECTORY, MOCK_NUMBER_OF_TARGETS};

    #[test]
    fn test_config_from_yaml() -> Result<()> {
        let s = r#"
mock: true
options:
  chrootDirectory: /noderoot
  numberOfTargets: '3'
induced_errors:
  login: true
"#;

        let cfg = Config::from(s)?;
        assert!(cfg.mock());
        assert_eq!(cfg.options().get(CHROOT_DIRECTORY), Some("/noderoot"));

        let iscsi = cfg.build();
        assert!(iscsi.is_mock());
        assert_eq!(iscsi.discover_targets("10.0.0.1", false)?.len(), 3);
        assert!(cfg
            .induced_errors()
            .map(|e| e.get(Operation::Login))
            .unwrap_or(false));
        Ok(())
    }

    #[test]
    fn test_config_defaults() -> Result<()> {
        let cfg = Config::from("{}")?;
        assert!(!cfg.mock());
        assert!(cfg.options().is_empty());
        assert!(!cfg.build().is_mock());
        Ok(())
    }

    #[test]
    fn test_config_write_read() -> Result<()> {
        let mut opts = Options::new();
        opts.insert(MOCK_NUMBER_OF_TARGETS, "2");
        let cfg = Config::new(true, &opts);

        let path = std::env::temp_dir().join("iscsictl.yml");
        cfg.write_to(&path)?;
        let read = Config::read(&path)?;

        assert_eq!(read, cfg);
        assert_eq!(read.build().options(), &opts);
        Ok(())
    }
}
