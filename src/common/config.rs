//! User configuration, read from a TOML file.
//!
//! Every table is optional; missing keys fall back to the defaults below.
//!
//! ```toml
//! [settings.grid]
//! icon_size = 64
//! max_icons = 32
//!
//! [settings.clip]
//! auto_collapse = true
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actor::timer::TimerKind;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: &'static str },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub settings: Settings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub grid: GridSettings,
    pub dock: MainDockSettings,
    pub clip: ClipSettings,
    pub drawer: DrawerSettings,
    pub timing: TimingSettings,
}

/// Geometry shared by every dock on a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Edge length of one slot, in pixels.
    pub icon_size: i32,
    /// Slot capacity of every dock, anchor included.
    pub max_icons: usize,
    /// How many slots an icon may be dragged away from the main dock column
    /// (or past the end of a drawer) and still snap back.
    pub detach_threshold: i32,
    /// Chebyshev distance within which a clip icon needs a neighbour.
    pub clip_attach_vicinity: i32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            icon_size: 64,
            max_icons: 32,
            detach_threshold: 3,
            clip_attach_vicinity: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainDockSettings {
    pub on_right_side: bool,
    pub auto_raise_lower: bool,
    pub lowered: bool,
}

impl Default for MainDockSettings {
    fn default() -> Self {
        Self {
            on_right_side: true,
            auto_raise_lower: false,
            lowered: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipSettings {
    pub auto_collapse: bool,
    pub auto_raise_lower: bool,
    pub attract_icons: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawerSettings {
    pub auto_collapse: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub raise_delay_ms: u64,
    pub lower_delay_ms: u64,
    pub expand_delay_ms: u64,
    pub collapse_delay_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            raise_delay_ms: 600,
            lower_delay_ms: 1000,
            expand_delay_ms: 600,
            collapse_delay_ms: 1000,
        }
    }
}

impl TimingSettings {
    pub fn delay(&self, kind: TimerKind) -> Duration {
        let ms = match kind {
            TimerKind::Raise => self.raise_delay_ms,
            TimerKind::Lower => self.lower_delay_ms,
            TimerKind::Expand => self.expand_delay_ms,
            TimerKind::Collapse => self.collapse_delay_ms,
        };
        Duration::from_millis(ms)
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rift-dock").join("config.toml"))
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let buf = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
        Self::parse(&buf)
    }

    pub fn parse(buf: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(buf)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> String {
        // Every field is a plain scalar, so serialization cannot fail.
        toml::to_string(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let grid = &self.settings.grid;
        if grid.icon_size <= 0 {
            return Err(ConfigError::Invalid {
                key: "grid.icon_size",
                reason: "must be positive",
            });
        }
        if grid.max_icons < 2 {
            return Err(ConfigError::Invalid {
                key: "grid.max_icons",
                reason: "must leave room for the anchor and one icon",
            });
        }
        if grid.detach_threshold < 0 {
            return Err(ConfigError::Invalid {
                key: "grid.detach_threshold",
                reason: "must not be negative",
            });
        }
        if grid.clip_attach_vicinity < 0 {
            return Err(ConfigError::Invalid {
                key: "grid.clip_attach_vicinity",
                reason: "must not be negative",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::parse("").expect("parse empty config");
        assert_eq!(config, Config::default());
        assert_eq!(config.settings.grid.icon_size, 64);
        assert_eq!(config.settings.timing.delay(TimerKind::Lower), Duration::from_millis(1000));
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [settings.clip]
            auto_collapse = true

            [settings.grid]
            max_icons = 8
            "#,
        )
        .expect("parse partial config");

        assert!(config.settings.clip.auto_collapse);
        assert!(!config.settings.clip.attract_icons);
        assert_eq!(config.settings.grid.max_icons, 8);
        assert_eq!(config.settings.grid.icon_size, 64);
    }

    #[test]
    fn rejects_tiny_capacity() {
        let err = Config::parse("[settings.grid]\nmax_icons = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "grid.max_icons", .. }));
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let text = Config::default().to_toml();
        assert_eq!(Config::parse(&text).expect("reparse"), Config::default());
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[settings.dock]\non_right_side = false\n").expect("write config");

        let config = Config::read(&path).expect("read config");
        assert!(!config.settings.dock.on_right_side);

        let missing = Config::read(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
        assert!(missing.to_string().contains("missing.toml"), "{missing}");
    }
}
