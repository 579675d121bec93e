#![forbid(unsafe_code)]

//! Runtime configuration shared by the OpenTube binaries.
//!
//! Values come from CLI overrides, environment variables and a `.env` file,
//! in that order of precedence.

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_OPENTUBE_PORT: u16 = 8080;
pub const DEFAULT_OPENTUBE_HOST: &str = "127.0.0.1";
pub const DEFAULT_AI_MODEL: &str = "gemini-2.5-flash";

/// Fully resolved settings the binaries run with.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub data_root: PathBuf,
    pub www_root: PathBuf,
    pub opentube_port: u16,
    pub opentube_host: String,
    /// API key for the external text-generation service. When absent the
    /// backend still serves everything except AI-assisted keyword splitting
    /// and category classification.
    pub ai_api_key: Option<String>,
    pub ai_model: String,
}

pub fn load_runtime_config() -> Result<RuntimeConfig> {
    resolve_runtime_config(RuntimeOverrides::default())
}

#[derive(Debug, Clone, Default)]
pub struct RuntimeOverrides {
    pub data_root: Option<PathBuf>,
    pub www_root: Option<PathBuf>,
    pub opentube_port: Option<u16>,
    pub opentube_host: Option<String>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_runtime_config(overrides: RuntimeOverrides) -> Result<RuntimeConfig> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_runtime_config_with_overrides(&file_vars, env_var_string, overrides)
}

#[cfg(test)]
fn build_runtime_config(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<RuntimeConfig> {
    build_runtime_config_with_overrides(file_vars, env_lookup, RuntimeOverrides::default())
}

fn build_runtime_config_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: RuntimeOverrides,
) -> Result<RuntimeConfig> {
    let data_root = overrides
        .data_root
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value("DATA_ROOT", file_vars, &env_lookup))
        .ok_or_else(|| anyhow!("DATA_ROOT not set"))?;
    let www_root = overrides
        .www_root
        .map(|path| path.to_string_lossy().into_owned())
        .or_else(|| lookup_value("WWW_ROOT", file_vars, &env_lookup))
        .ok_or_else(|| anyhow!("WWW_ROOT not set"))?;
    let opentube_port = overrides
        .opentube_port
        .or_else(|| {
            lookup_value("OPENTUBE_PORT", file_vars, &env_lookup)
                .and_then(|value| value.parse::<u16>().ok())
        })
        .unwrap_or(DEFAULT_OPENTUBE_PORT);
    let opentube_host = overrides
        .opentube_host
        .and_then(|value| {
            let trimmed = value.trim().to_string();
            if trimmed.is_empty() { None } else { Some(trimmed) }
        })
        .or_else(|| lookup_value("OPENTUBE_HOST", file_vars, &env_lookup))
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_OPENTUBE_HOST.to_string());
    let ai_api_key = lookup_value("OPENTUBE_AI_KEY", file_vars, &env_lookup)
        .filter(|value| !value.trim().is_empty());
    let ai_model = lookup_value("OPENTUBE_AI_MODEL", file_vars, &env_lookup)
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_AI_MODEL.to_string());
    Ok(RuntimeConfig {
        data_root: PathBuf::from(data_root),
        www_root: PathBuf::from(www_root),
        opentube_port,
        opentube_host,
        ai_api_key,
        ai_model,
    })
}

fn env_var_string(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key).or_else(|| file_vars.get(key).cloned())
}

pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();
    if !path.exists() {
        return Ok(vars);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let line = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value_raw)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let value = value_raw.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|value| value.strip_suffix('"'))
            .or_else(|| {
                value
                    .strip_prefix('\'')
                    .and_then(|value| value.strip_suffix('\''))
            })
            .unwrap_or(value);
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn make_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn runtime_from(contents: &str) -> RuntimeConfig {
        let cfg = make_config(contents);
        let vars = read_env_file(cfg.path()).unwrap();
        build_runtime_config(&vars, |_| None).unwrap()
    }

    #[test]
    fn load_runtime_config_reads_port() {
        let runtime =
            runtime_from("DATA_ROOT=\"/ot\"\nWWW_ROOT=\"/www\"\nOPENTUBE_PORT=\"4242\"\n");
        assert_eq!(runtime.opentube_port, 4242);
    }

    #[test]
    fn load_runtime_config_defaults_missing_values() {
        let runtime = runtime_from("DATA_ROOT=\"/d\"\nWWW_ROOT=\"/w\"\n");
        assert_eq!(runtime.opentube_port, DEFAULT_OPENTUBE_PORT);
        assert_eq!(runtime.data_root, PathBuf::from("/d"));
        assert_eq!(runtime.www_root, PathBuf::from("/w"));
        assert_eq!(runtime.opentube_host, DEFAULT_OPENTUBE_HOST);
        assert!(runtime.ai_api_key.is_none());
        assert_eq!(runtime.ai_model, DEFAULT_AI_MODEL);
    }

    #[test]
    fn load_runtime_config_reads_ai_settings() {
        let runtime = runtime_from(
            "DATA_ROOT=\"/d\"\nWWW_ROOT=\"/w\"\nOPENTUBE_AI_KEY=\"secret\"\nOPENTUBE_AI_MODEL=\"gemini-pro\"\n",
        );
        assert_eq!(runtime.ai_api_key.as_deref(), Some("secret"));
        assert_eq!(runtime.ai_model, "gemini-pro");
    }

    #[test]
    fn build_runtime_config_prefers_env_over_file() {
        let vars =
            read_env_file(make_config("DATA_ROOT=\"/file\"\nWWW_ROOT=\"/www\"\n").path()).unwrap();
        let runtime = build_runtime_config(&vars, |key| {
            if key == "DATA_ROOT" {
                Some("/env".to_string())
            } else {
                None
            }
        })
        .unwrap();
        assert_eq!(runtime.data_root, PathBuf::from("/env"));
    }

    #[test]
    fn read_env_file_handles_export_and_quotes() {
        let cfg = make_config(
            r#"
            export DATA_ROOT="/data"
            WWW_ROOT='/www'
            OPENTUBE_HOST =  "0.0.0.0"
            OPENTUBE_PORT=9090
            # comment
            INVALID_LINE
            "#,
        );
        let vars = read_env_file(cfg.path()).unwrap();
        assert_eq!(vars.get("DATA_ROOT").unwrap(), "/data");
        assert_eq!(vars.get("WWW_ROOT").unwrap(), "/www");
        assert_eq!(vars.get("OPENTUBE_HOST").unwrap(), "0.0.0.0");
        assert_eq!(vars.get("OPENTUBE_PORT").unwrap(), "9090");
        assert!(!vars.contains_key("INVALID_LINE"));
    }

    #[test]
    fn read_env_file_missing_file_returns_empty() {
        let dir = tempfile::tempdir().unwrap();
        let vars = read_env_file(&dir.path().join("missing.env")).unwrap();
        assert!(vars.is_empty());
    }

    #[test]
    fn build_runtime_config_override_precedence() {
        let mut vars = HashMap::new();
        vars.insert("DATA_ROOT".to_string(), "/file-data".to_string());
        vars.insert("WWW_ROOT".to_string(), "/file-www".to_string());
        vars.insert("OPENTUBE_HOST".to_string(), "file-host".to_string());
        vars.insert("OPENTUBE_PORT".to_string(), "7000".to_string());

        let overrides = RuntimeOverrides {
            data_root: Some(PathBuf::from("/override-data")),
            www_root: None,
            opentube_port: Some(9000),
            opentube_host: Some("override-host".into()),
            env_path: None,
        };

        let runtime = build_runtime_config_with_overrides(
            &vars,
            |key| {
                if key == "WWW_ROOT" {
                    Some("/env-www".to_string())
                } else if key == "OPENTUBE_PORT" {
                    Some("8000".to_string())
                } else {
                    None
                }
            },
            overrides,
        )
        .unwrap();

        assert_eq!(runtime.data_root, PathBuf::from("/override-data"));
        assert_eq!(runtime.www_root, PathBuf::from("/env-www"));
        assert_eq!(runtime.opentube_port, 9000);
        assert_eq!(runtime.opentube_host, "override-host");
    }

    #[test]
    fn build_runtime_config_ignores_blank_host() {
        let vars =
            read_env_file(make_config("DATA_ROOT=\"/d\"\nWWW_ROOT=\"/w\"\n").path()).unwrap();
        let runtime = build_runtime_config_with_overrides(
            &vars,
            |_| None,
            RuntimeOverrides {
                opentube_host: Some("   ".into()),
                ..RuntimeOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(runtime.opentube_host, DEFAULT_OPENTUBE_HOST);
    }

    #[test]
    fn build_runtime_config_invalid_port_defaults() {
        let vars = read_env_file(
            make_config("DATA_ROOT=\"/d\"\nWWW_ROOT=\"/w\"\nOPENTUBE_PORT=\"nope\"\n").path(),
        )
        .unwrap();
        let runtime = build_runtime_config(&vars, |_| None).unwrap();
        assert_eq!(runtime.opentube_port, DEFAULT_OPENTUBE_PORT);
    }
}
