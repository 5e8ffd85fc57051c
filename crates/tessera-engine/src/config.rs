//! Engine configuration.
//!
//! Every field has a default, so a config file only needs the keys it
//! changes:
//!
//! ```json
//! {
//!   "fixed_dt": 0.016666666666666666,
//!   "log_filter": "info,tessera_ecs=debug",
//!   "world": {
//!     "spatial": {
//!       "bounds": { "min_x": 0.0, "min_y": 0.0, "max_x": 2000.0, "max_y": 2000.0 },
//!       "capacity": 8,
//!       "rebuild": { "check_interval": 30, "min_cooldown": 5 }
//!     }
//!   }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tessera_ecs::world::WorldConfig;

use crate::EngineError;

/// Top-level settings for a [`FrameLoop`](crate::frame::FrameLoop).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds per frame. Must be positive and finite.
    pub fixed_dt: f64,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub world: WorldConfig,
}

impl Default for EngineConfig {
    /// 60 Hz, `info` logging, default world.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            log_filter: "info".to_owned(),
            world: WorldConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(text: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Pretty-printed JSON, readable back with [`from_json_str`](Self::from_json_str).
    pub fn to_json_string(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check `fixed_dt` is positive and finite, then validate the world
    /// section.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(EngineError::InvalidConfig(format!(
                "fixed_dt must be positive and finite, got {}",
                self.fixed_dt
            )));
        }
        self.world.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_ecs::prelude::*;

    #[test]
    fn default_config_is_60hz_and_valid() {
        let config = EngineConfig::default();
        assert!((config.fixed_dt - 1.0 / 60.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_object_gives_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn nested_overrides_keep_sibling_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "world": { "spatial": { "rebuild": { "check_interval": 30 } } } }"#,
        )
        .unwrap();
        assert_eq!(config.world.spatial.rebuild.check_interval, 30);
        assert_eq!(config.world.spatial.rebuild.min_cooldown, 10);
        assert_eq!(config.world.spatial.capacity, 4);
    }

    #[test]
    fn zero_dt_is_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "fixed_dt": 0.0 }"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[test]
    fn negative_dt_is_rejected() {
        let config = EngineConfig {
            fixed_dt: -1.0 / 60.0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn world_errors_are_wrapped() {
        let err = EngineConfig::from_json_str(r#"{ "world": { "spatial": { "capacity": 0 } } }"#)
            .unwrap_err();
        assert!(matches!(err, EngineError::Ecs(EcsError::InvalidConfig(_))));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = EngineConfig::from_json_str("{ fixed_dt: ").unwrap_err();
        assert!(matches!(err, EngineError::ConfigParse(_)));
    }

    #[test]
    fn json_round_trip() {
        let mut config = EngineConfig::default();
        config.world.spatial.bounds = Bounds::new(-500.0, -500.0, 500.0, 500.0);
        config.log_filter = "debug".to_owned();
        let text = config.to_json_string().unwrap();
        assert_eq!(EngineConfig::from_json_str(&text).unwrap(), config);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = EngineConfig::from_path("/definitely/not/here.json").unwrap_err();
        match err {
            EngineError::ConfigIo { path, .. } => {
                assert!(path.ends_with("here.json"));
            }
            other => panic!("expected ConfigIo, got {other:?}"),
        }
    }
}
