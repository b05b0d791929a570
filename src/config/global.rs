use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::section::FieldValue;
use crate::config::store::ConfigStore;
use crate::utils::error::AppResult;

/// Section kind of the singleton global settings record
pub const GLOBAL_KIND: &str = "global";

/// How the enforcement backend applies filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalMode {
    Dynamic,
    Static,
    Monitor,
}

impl OperationalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationalMode::Dynamic => "dynamic",
            OperationalMode::Static => "static",
            OperationalMode::Monitor => "monitor",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "dynamic" => Some(OperationalMode::Dynamic),
            "static" => Some(OperationalMode::Static),
            "monitor" => Some(OperationalMode::Monitor),
            _ => None,
        }
    }
}

impl Default for OperationalMode {
    fn default() -> Self {
        OperationalMode::Dynamic
    }
}

/// How often geolocation refresh cycles run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeolocationMode {
    Frequent,
    Daily,
}

impl GeolocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeolocationMode::Frequent => "frequent",
            GeolocationMode::Daily => "daily",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "frequent" => Some(GeolocationMode::Frequent),
            "daily" => Some(GeolocationMode::Daily),
            _ => None,
        }
    }
}

impl Default for GeolocationMode {
    fn default() -> Self {
        GeolocationMode::Frequent
    }
}

/// Typed view of the singleton `global` section
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Main switch for the whole service
    pub enabled: bool,

    /// When set, untracked connections are blocked instead of allowed
    pub strict_mode: bool,

    /// Logging verbosity of the enforcement backend (0, 1, 2)
    pub debug_level: u8,

    pub operational_mode: OperationalMode,

    pub geolocation_mode: GeolocationMode,
}

/// Read the global settings; missing section or fields fall back to defaults
pub fn read_global(store: &ConfigStore) -> GlobalSettings {
    let Some(section) = store.sections(GLOBAL_KIND).into_iter().next() else {
        return GlobalSettings::default();
    };

    let parse_mode = |field: &str| {
        section.get_str(field).and_then(|v| {
            let parsed = OperationalMode::parse(v);
            if parsed.is_none() {
                warn!("Unrecognized {} value '{}', using default", field, v);
            }
            parsed
        })
    };

    GlobalSettings {
        enabled: section.flag("enabled"),
        strict_mode: section.flag("strict_mode"),
        debug_level: section
            .get_str("debug_level")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        operational_mode: parse_mode("operational_mode").unwrap_or_default(),
        geolocation_mode: section
            .get_str("geolocation_mode")
            .and_then(GeolocationMode::parse)
            .unwrap_or_default(),
    }
}

/// Stage the global settings into the store, creating the section if needed.
/// The caller saves.
pub fn write_global(store: &mut ConfigStore, settings: &GlobalSettings) -> AppResult<()> {
    let id = match store.sections(GLOBAL_KIND).into_iter().next() {
        Some(section) => section.id.clone(),
        None => store.add(GLOBAL_KIND),
    };

    let flag = |on: bool| FieldValue::single(if on { "1" } else { "0" });
    store.set(&id, "enabled", flag(settings.enabled))?;
    store.set(&id, "strict_mode", flag(settings.strict_mode))?;
    store.set(&id, "debug_level", FieldValue::single(settings.debug_level.to_string()))?;
    store.set(&id, "operational_mode", FieldValue::single(settings.operational_mode.as_str()))?;
    store.set(&id, "geolocation_mode", FieldValue::single(settings.geolocation_mode.as_str()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn defaults_when_section_is_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = ConfigStore::new(dir.path().join("geomate.json"));
        store.load().await.expect("load");
        assert_eq!(read_global(&store), GlobalSettings::default());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = ConfigStore::new(dir.path().join("geomate.json"));
        store.load().await.expect("load");

        let settings = GlobalSettings {
            enabled: true,
            strict_mode: true,
            debug_level: 2,
            operational_mode: OperationalMode::Monitor,
            geolocation_mode: GeolocationMode::Daily,
        };
        write_global(&mut store, &settings).expect("write");
        assert_eq!(read_global(&store), settings);

        // second write reuses the singleton section
        write_global(&mut store, &settings).expect("rewrite");
        assert_eq!(store.sections(GLOBAL_KIND).len(), 1);
    }

    #[tokio::test]
    async fn garbage_mode_falls_back_to_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = ConfigStore::new(dir.path().join("geomate.json"));
        store.load().await.expect("load");
        let id = store.add(GLOBAL_KIND);
        store
            .set(&id, "operational_mode", FieldValue::single("turbo"))
            .expect("set");
        assert_eq!(read_global(&store).operational_mode, OperationalMode::Dynamic);
    }
}
