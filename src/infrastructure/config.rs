use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const DEFAULT_APP_NAME: &str = "TaskFlow";

const BASE_URL_KEYS: &[&str] = &["TASKFLOW_API_BASE_URL"];
const PROJECT_ID_KEYS: &[&str] = &["TASKFLOW_PROJECT_ID"];
const PUBLIC_KEY_KEYS: &[&str] = &["TASKFLOW_PUBLIC_KEY"];

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub app_name: String,
    pub timezone: Tz,
    pub backend_base_url: Option<String>,
    pub backend_project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: String,
    pub project_id: String,
    pub public_key: String,
}

fn default_app_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "appName": DEFAULT_APP_NAME,
        "timezone": "UTC",
        "backend": {
            "baseUrl": null,
            "projectId": null
        }
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_config())?;
        fs::write(path, format!("{formatted}\n"))?;
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
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn string_at<'a>(value: &'a serde_json::Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn parse_timezone(raw: &str) -> Result<Tz, InfraError> {
    raw.trim()
        .parse::<Tz>()
        .map_err(|error| InfraError::InvalidConfig(format!("invalid timezone '{raw}': {error}")))
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    let timezone = match string_at(&app, "/timezone") {
        Some(raw) => parse_timezone(raw)?,
        None => Tz::UTC,
    };

    Ok(AppConfig {
        app_name: string_at(&app, "/appName")
            .unwrap_or(DEFAULT_APP_NAME)
            .to_string(),
        timezone,
        backend_base_url: string_at(&app, "/backend/baseUrl").map(ToOwned::to_owned),
        backend_project_id: string_at(&app, "/backend/projectId").map(ToOwned::to_owned),
    })
}

pub fn save_backend_settings(config_dir: &Path, base_url: &str, project_id: &str) -> Result<(), InfraError> {
    let base_url = base_url.trim();
    let project_id = project_id.trim();
    if base_url.is_empty() || project_id.is_empty() {
        return Err(InfraError::InvalidConfig(
            "backend baseUrl and projectId must not be empty".to_string(),
        ));
    }

    let path = config_dir.join(APP_JSON);
    let mut app = read_config(&path)?;
    let object = app.as_object_mut().ok_or_else(|| {
        InfraError::InvalidConfig(format!("invalid object structure in {}", path.display()))
    })?;
    object.insert(
        "backend".to_string(),
        serde_json::json!({ "baseUrl": base_url, "projectId": project_id }),
    );

    let formatted = serde_json::to_string_pretty(&app)?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}

pub fn load_backend_config_from_env<S>(app: &AppConfig, credentials: &S) -> Result<BackendConfig, InfraError>
where
    S: CredentialStore + ?Sized,
{
    load_backend_config_from_lookup(app, credentials, |key| std::env::var(key).ok())
}

pub fn load_backend_config_from_lookup<S, F>(
    app: &AppConfig,
    credentials: &S,
    lookup: F,
) -> Result<BackendConfig, InfraError>
where
    S: CredentialStore + ?Sized,
    F: Fn(&str) -> Option<String>,
{
    let base_url = optional_lookup_value(&lookup, BASE_URL_KEYS)
        .or_else(|| app.backend_base_url.clone())
        .ok_or_else(|| missing_setting("backend base url", BASE_URL_KEYS, Some("backend.baseUrl")))?;
    let project_id = optional_lookup_value(&lookup, PROJECT_ID_KEYS)
        .or_else(|| app.backend_project_id.clone())
        .ok_or_else(|| missing_setting("project id", PROJECT_ID_KEYS, Some("backend.projectId")))?;
    let public_key = match optional_lookup_value(&lookup, PUBLIC_KEY_KEYS) {
        Some(value) => value,
        None => credentials
            .load_public_key()?
            .ok_or_else(|| missing_setting("public key", PUBLIC_KEY_KEYS, None))?,
    };

    Ok(BackendConfig {
        base_url,
        project_id,
        public_key,
    })
}

fn missing_setting(field_name: &str, keys: &[&str], config_key: Option<&str>) -> InfraError {
    let mut message = format!("missing {} (set one of: {}", field_name, keys.join(", "));
    if let Some(config_key) = config_key {
        message.push_str(&format!(" or {config_key} in {APP_JSON}"));
    }
    message.push(')');
    InfraError::InvalidConfig(message)
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}
