use crate::infrastructure::error::InfraError;
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const SCHEDULING_JSON: &str = "scheduling.json";
const SUPPORTED_SCHEMA: u64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub app_name: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingSettings {
    pub grid_interval_minutes: u32,
    pub default_block_minutes: u32,
    pub latest_start: String,
    pub hour_height: f64,
    pub persistence_notice_threshold: u32,
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            grid_interval_minutes: 15,
            default_block_minutes: 60,
            latest_start: "23:45".to_string(),
            hour_height: 60.0,
            persistence_notice_threshold: 3,
        }
    }
}

impl SchedulingSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.grid_interval_minutes == 0 || 60 % self.grid_interval_minutes != 0 {
            return Err("scheduling.gridIntervalMinutes must divide 60".to_string());
        }
        if self.default_block_minutes < self.grid_interval_minutes {
            return Err(
                "scheduling.defaultBlockMinutes must be >= scheduling.gridIntervalMinutes".to_string(),
            );
        }
        self.latest_start_time()?;
        if !(self.hour_height > 0.0) {
            return Err("scheduling.hourHeight must be > 0".to_string());
        }
        if self.persistence_notice_threshold == 0 {
            return Err("scheduling.persistenceNoticeThreshold must be >= 1".to_string());
        }
        Ok(())
    }

    pub fn latest_start_time(&self) -> Result<NaiveTime, String> {
        NaiveTime::parse_from_str(self.latest_start.trim(), "%H:%M")
            .map_err(|_| "scheduling.latestStart must be HH:MM".to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerSettings {
    pub app_name: String,
    pub timezone: Tz,
    pub scheduling: SchedulingSettings,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            app_name: "Timeblock".to_string(),
            timezone: Tz::UTC,
            scheduling: SchedulingSettings::default(),
        }
    }
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "Timeblock",
                "timezone": "UTC"
            }),
        ),
        (
            SCHEDULING_JSON,
            serde_json::json!({
                "schema": 1,
                "gridIntervalMinutes": 15,
                "defaultBlockMinutes": 60,
                "latestStart": "23:45",
                "hourHeight": 60.0,
                "persistenceNoticeThreshold": 3
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn read_typed<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, InfraError> {
    let value = read_config(path)?;
    serde_json::from_value(value)
        .map_err(|error| InfraError::InvalidConfig(format!("{}: {error}", path.display())))
}

pub fn load_settings(config_dir: &Path) -> Result<PlannerSettings, InfraError> {
    let app: AppConfig = read_typed(&config_dir.join(APP_JSON))?;
    let scheduling: SchedulingSettings = read_typed(&config_dir.join(SCHEDULING_JSON))?;
    scheduling.validate().map_err(InfraError::InvalidConfig)?;

    let timezone_name = app.timezone.trim();
    let timezone = timezone_name.parse::<Tz>().map_err(|error| {
        InfraError::InvalidConfig(format!("unknown timezone '{timezone_name}': {error}"))
    })?;

    Ok(PlannerSettings {
        app_name: app.app_name,
        timezone,
        scheduling,
    })
}

pub fn save_timezone(config_dir: &Path, timezone: &str) -> Result<(), InfraError> {
    let timezone = timezone.trim();
    timezone
        .parse::<Tz>()
        .map_err(|error| InfraError::InvalidConfig(format!("unknown timezone '{timezone}': {error}")))?;

    let path = config_dir.join(APP_JSON);
    let mut app = read_config(&path)?;
    let object = app.as_object_mut().ok_or_else(|| {
        InfraError::InvalidConfig(format!("invalid object structure in {}", path.display()))
    })?;
    object.insert(
        "timezone".to_string(),
        serde_json::Value::String(timezone.to_string()),
    );

    let formatted = serde_json::to_string_pretty(&app)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}
