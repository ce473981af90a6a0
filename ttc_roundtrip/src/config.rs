//! Settings for a round trip, loadable from YAML

use std::{fmt::Display, path::Path, str::FromStr};

use fontcoll::{verify::Expectations, ChecksumPolicy};
use serde::{Deserialize, Serialize};

use crate::{
    runner::{Builtin, External, StageRunner},
    Error,
};

/// Where the stages run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Builtin,
    External,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub backend: Backend,
    /// argv prefix of the extract/convert tool, for the external backend
    pub tool: Vec<String>,
    /// argv prefix of the verifier, for the external backend
    pub verifier: Vec<String>,
    /// Members to extract; read from the archive header when unset
    pub member_count: Option<usize>,
    pub expectations: Expectations,
    pub checksums: ChecksumPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: Backend::default(),
            tool: vec!["ttcx".to_string()],
            verifier: vec!["ttc-verify".to_string()],
            member_count: None,
            expectations: Expectations::default(),
            checksums: ChecksumPolicy::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, Error> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::FileIo {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&contents).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The runner for the configured backend.
    pub fn runner(&self) -> Result<Box<dyn StageRunner>, Error> {
        Ok(match self.backend {
            Backend::Builtin => Box::new(Builtin {
                checksums: self.checksums,
                expectations: self.expectations.clone(),
            }),
            Backend::External => Box::new(External::new(
                self.tool.clone(),
                self.verifier.clone(),
            )?),
        })
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Backend::Builtin => f.write_str("builtin"),
            Backend::External => f.write_str("external"),
        }
    }
}

impl FromStr for Backend {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        static ERR_MSG: &str = "expected one of 'builtin', 'external'";
        match s.to_ascii_lowercase().trim() {
            "builtin" => Ok(Self::Builtin),
            "external" => Ok(Self::External),
            _ => Err(ERR_MSG),
        }
    }
}

#[cfg(test)]
mod tests {
    use fontcoll::test_helpers::{HEAD, OS2};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn full_config() {
        let yaml = r#"
backend: external
tool: [python3, -m, fontTools.ttx]
verifier: [python3, verifylobsttc.py]
member_count: 2
expectations:
  os2_version: 4
  member_count: 2
  required_tables: [head, OS/2]
checksums: error
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            config,
            Config {
                backend: Backend::External,
                tool: vec!["python3".into(), "-m".into(), "fontTools.ttx".into()],
                verifier: vec!["python3".into(), "verifylobsttc.py".into()],
                member_count: Some(2),
                expectations: Expectations {
                    os2_version: Some(4),
                    member_count: Some(2),
                    required_tables: vec![HEAD, OS2],
                    ..Default::default()
                },
                checksums: ChecksumPolicy::Error,
            }
        );
    }

    #[test]
    fn empty_config_is_default() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("roundtrip.yaml");
        std::fs::write(&path, "backend: builtin\nverbose: true\n").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config { .. })));
    }

    #[test]
    fn backend_from_str() {
        assert_eq!("External".parse::<Backend>(), Ok(Backend::External));
        assert!("python".parse::<Backend>().is_err());
        assert_eq!(Backend::default().to_string(), "builtin");
    }

    #[test]
    fn external_runner_needs_a_tool() {
        let config = Config {
            backend: Backend::External,
            tool: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(config.runner(), Err(Error::EmptyCommand("tool"))));
    }
}
