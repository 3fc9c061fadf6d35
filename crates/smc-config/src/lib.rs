//! Configuration surface.
//!
//! YAML files are loaded in layer order (base -> environment -> overrides),
//! deep-merged, canonicalized to sorted-key JSON and hashed, then
//! deserialized into the typed [`Settings`] tree. The engine reads only
//! `Settings`; raw YAML never leaves this crate. Startup safety checks
//! (account whitelist, algo-trading flags, risk hard cap, live
//! confirmation) live in [`safety`].

mod safety;
mod settings;

use anyhow::{Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

pub use safety::{SafetyGuard, SafetyViolation};
pub use settings::{
    AdvancedFilterSettings, AssetProfile, BlackoutSettings, FilterSettings, GeneralSettings,
    JournalSettings, ManagementSettings, Mode, NewsSettings, RiskSettings, Settings, SmcSettings,
    StrategyFlags, SymbolSettings, TimeframeSettings,
};

/// Layered config after merge: the typed tree plus the canonical JSON and
/// its hash for run attribution.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub settings: Settings,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Load + merge YAML files in order; later files override earlier ones via
/// deep-merge (objects merge recursively, arrays and scalars replace).
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());

    for p in paths {
        let raw = fs::read_to_string(p).with_context(|| format!("read config: {p}"))?;
        let yaml: serde_yaml::Value =
            serde_yaml::from_str(&raw).with_context(|| format!("parse yaml: {p}"))?;
        let json = serde_json::to_value(yaml).context("yaml->json conversion failed")?;
        deep_merge(&mut merged, json);
    }

    let canonical = canonicalize_json(&merged);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let config_hash = hex::encode(hasher.finalize());

    let settings: Settings =
        serde_json::from_value(merged).context("config does not match the settings schema")?;
    settings.validate()?;

    Ok(LoadedConfig {
        settings,
        canonical_json: canonical,
        config_hash,
    })
}

/// Deep-merge: objects merge recursively; arrays replaced; scalars
/// overwritten.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}
