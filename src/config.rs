use std::path;

use serde_derive::Deserialize;
use thiserror::Error;
use tracing::{event, Level};

use crate::format::Style;
use crate::model::display::layout::DropZones;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Element names that can never be dragged.
    pub protected: Vec<String>,

    /// Element names that accept dropped nodes as children.
    pub containers: Vec<String>,

    /// Prefix given to new element names typed without one.
    pub default_namespace: String,

    pub drop_zones: DropZones,
    pub row_height: f64, /* pixels */

    pub style: Style,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to locate config directory: {0}")]
    Xdg(#[from] xdg::BaseDirectoriesError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            protected: vec![
                "sodipodi:namedview".to_string(),
                "svg:defs".to_string(),
            ],
            containers: [
                "svg:svg", "svg:g", "svg:defs", "svg:glyph", "svg:marker", "svg:switch",
                "svg:a", "svg:symbol", "svg:mask", "svg:pattern", "svg:tspan", "svg:text",
            ].iter().map(|s| s.to_string()).collect(),
            default_namespace: "svg".to_string(),
            drop_zones: DropZones::default(),
            row_height: 24.0,
            style: Style::default(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_file(path: impl AsRef<path::Path>) -> Result<Config, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    /// Loads `treesync/config.toml` from the XDG config directories, or the
    /// defaults if there isn't one.
    pub fn load() -> Result<Config, ConfigError> {
        let dirs = xdg::BaseDirectories::with_prefix("treesync")?;

        match dirs.find_config_file("config.toml") {
            Some(path) => {
                event!(Level::DEBUG, ?path, "loading config");
                Self::load_file(path)
            },
            None => Ok(Config::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let zones = &self.drop_zones;
        if !(0.0..=1.0).contains(&zones.before) || !(0.0..=1.0).contains(&zones.after) || zones.before > zones.after {
            return Err(ConfigError::Invalid(format!("drop zones must satisfy 0 <= before <= after <= 1 (got {} and {})", zones.before, zones.after)));
        }

        if self.row_height <= 0.0 {
            return Err(ConfigError::Invalid(format!("row height must be positive (got {})", self.row_height)));
        }

        Ok(())
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.iter().any(|p| p == name)
    }

    pub fn is_container(&self, name: &str) -> bool {
        self.containers.iter().any(|c| c == name)
    }

    /// Gives an unprefixed element name the default namespace.
    pub fn qualify(&self, name: &str) -> String {
        if name.contains(':') || self.default_namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}:{}", self.default_namespace, name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_partial() {
        let config = Config::from_toml(r##"
            protected = ["svg:metadata"]
            row_height = 18.0

            [drop_zones]
            before = 0.3

            [style]
            tag = "#ff0000"
        "##).unwrap();

        assert!(config.is_protected("svg:metadata"));
        assert!(!config.is_protected("svg:defs"));
        assert!(config.is_container("svg:g"));
        assert_eq!(config.row_height, 18.0);
        assert_eq!(config.drop_zones, DropZones { before: 0.3, after: 0.75 });
        assert_eq!(config.style.tag, "#ff0000");
        assert_eq!(config.style.comment, Style::default().comment);
    }

    #[test]
    fn test_invalid() {
        assert_matches!(Config::from_toml("row_height = 'tall'"), Err(ConfigError::Parse(_)));
        assert_matches!(Config::from_toml("row_height = 0.0"), Err(ConfigError::Invalid(_)));
        assert_matches!(Config::from_toml("[drop_zones]\nbefore = 0.8\nafter = 0.2"), Err(ConfigError::Invalid(_)));
        assert_matches!(Config::load_file("/nonexistent/config.toml"), Err(ConfigError::Io(_)));
    }

    #[test]
    fn test_qualify() {
        let config = Config::default();
        assert_eq!(config.qualify("rect"), "svg:rect");
        assert_eq!(config.qualify("inkscape:path-effect"), "inkscape:path-effect");

        let bare = Config { default_namespace: String::new(), ..Config::default() };
        assert_eq!(bare.qualify("rect"), "rect");
    }
}
