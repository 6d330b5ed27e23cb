// User configuration store for FreeDATA Shell
//
// The config file is a flat JSON object shared with the UI surfaces. The shell
// only back-fills missing keys and relays updates; it never interprets most
// of the values.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Application folder below the platform config directory
pub const APP_FOLDER: &str = "FreeDATA";

/// Config file name inside [`APP_FOLDER`]
pub const CONFIG_FILE: &str = "config.json";

/// Platform application-data directory (`%APPDATA%`, `~/Library/Application Support`, `~/.config`)
pub fn app_data_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
    Ok(base.join(APP_FOLDER))
}

/// Default location of the user config file
pub fn config_path() -> Result<PathBuf> {
    Ok(app_data_dir()?.join(CONFIG_FILE))
}

/// Canonical default settings.
///
/// Values keep the types the surfaces expect: most flags are the strings
/// `"True"`/`"False"`, a handful of sizes are numbers.
pub fn default_settings() -> Map<String, Value> {
    let defaults = json!({
        "tnc_host": "127.0.0.1",
        "tnc_port": "3000",
        "daemon_host": "127.0.0.1",
        "daemon_port": "3001",
        "mycall": "AA0AA-0",
        "mygrid": "JN40aa",
        "radiocontrol": "disabled",
        "hamlib_deviceid": "RIG_MODEL_DUMMY_NOVFO",
        "hamlib_deviceport": "ignore",
        "hamlib_stop_bits": "ignore",
        "hamlib_data_bits": "ignore",
        "hamlib_handshake": "ignore",
        "hamlib_serialspeed": "ignore",
        "hamlib_dtrstate": "ignore",
        "hamlib_pttprotocol": "ignore",
        "hamlib_ptt_port": "ignore",
        "hamlib_dcd": "ignore",
        "hamlbib_serialspeed_ptt": "9600",
        "hamlib_rigctld_port": "4532",
        "hamlib_rigctld_ip": "127.0.0.1",
        "hamlib_rigctld_path": "",
        "hamlib_rigctld_server_port": "4532",
        "hamlib_rigctld_custom_args": "",
        "tci_port": "50001",
        "tci_ip": "127.0.0.1",
        "spectrum": "waterfall",
        "tnclocation": "localhost",
        "enable_scatter": "False",
        "enable_fft": "False",
        "enable_fsk": "False",
        "low_bandwidth_mode": "False",
        "theme": "default",
        "screen_height": 430,
        "screen_width": 1050,
        "update_channel": "latest",
        "beacon_interval": 300,
        "received_files_folder": "None",
        "tuning_range_fmin": "-50.0",
        "tuning_range_fmax": "50.0",
        "respond_to_cq": "True",
        "rx_buffer_size": "16",
        "enable_explorer": "False",
        "wftheme": 2,
        "high_graphics": "True",
        "explorer_stats": "False",
        "auto_tune": "False",
        "enable_is_writing": "True",
        "shared_folder_path": ".",
        "enable_request_profile": "True",
        "enable_request_shared_folder": "False",
        "max_retry_attempts": 5,
        "enable_auto_retry": "False",
        "tx_delay": 0,
        "auto_start": 0,
        "enable_sys_notification": 1,
        "enable_mesh_features": "False"
    });

    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Immutable view of the user settings.
///
/// Held behind an `Arc` by the shell; an update replaces the whole snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigSnapshot(Map<String, Value>);

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self(default_settings())
    }
}

impl ConfigSnapshot {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Build a snapshot from an arbitrary JSON value; only objects are accepted
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::Config(format!(
                "Expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// String form of a value; numbers and booleans are rendered
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Numeric value, accepting numbers stored as strings (`"4532"`)
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean flag; accepts `"True"`/`"False"` strings, booleans and 0/1
    pub fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(Value::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Outcome of [`load_or_init`]
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub snapshot: ConfigSnapshot,
    /// Keys that were missing and got their default value
    pub backfilled: Vec<String>,
    /// Whether the file did not exist and was written from defaults
    pub created: bool,
}

/// Load the config file, creating it from defaults when absent.
///
/// Every default key missing from the file is added with its default value
/// and the file is rewritten once. Keys unknown to the defaults are kept.
pub fn load_or_init(path: &Path) -> Result<LoadReport> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut created = false;
    if !path.exists() {
        info!("No config found, writing defaults to {}", path.display());
        save_config(path, &ConfigSnapshot::default())?;
        created = true;
    }

    let contents = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&contents)?;
    let mut map = match value {
        Value::Object(map) => map,
        other => {
            return Err(Error::Config(format!(
                "{} must contain a JSON object, found {}",
                path.display(),
                json_kind(&other)
            )))
        }
    };

    let mut backfilled = Vec::new();
    for (key, default) in default_settings() {
        match map.get(&key) {
            Some(value) => info!("FOUND SETTING [{}]: {}", key, value),
            None => {
                warn!("MISSING SETTING [{}]: {}", key, default);
                map.insert(key.clone(), default);
                backfilled.push(key);
            }
        }
    }

    let snapshot = ConfigSnapshot::from_map(map);
    if !backfilled.is_empty() {
        save_config(path, &snapshot)?;
        info!(
            "Back-filled {} missing setting(s) in {}",
            backfilled.len(),
            path.display()
        );
    }

    Ok(LoadReport {
        snapshot,
        backfilled,
        created,
    })
}

/// Write a snapshot as pretty JSON
pub fn save_config(path: &Path, snapshot: &ConfigSnapshot) -> Result<()> {
    let contents = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, contents)?;
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
