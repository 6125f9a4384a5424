use std::{path::Path, str::FromStr};

use anyhow::bail;
use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use std::fmt::Write;
use toml::Value;

use crate::{Config, IdentityClass};

/// Fields that may reference an unset environment variable. They are dropped instead of failing the load.
const OPTIONAL_ENV_FIELDS: &[&str] = &["llm.api_key", "llm.base_url", "server.auth.secret"];

/// Check if a configuration path represents an optional environment variable field
fn is_optional_env_field(path: &str) -> bool {
    OPTIONAL_ENV_FIELDS.contains(&path)
}

/// Check if the error is specifically about a missing environment variable
fn is_missing_env_var_error<E: std::fmt::Display>(err: &E) -> bool {
    let err_str = err.to_string().to_lowercase();

    err_str.contains("environment variable not found")
        || err_str.contains("env var")
        || (err_str.contains("variable") && err_str.contains("not found"))
}

/// Extract the path from an error message like "Failed to expand dynamic string at path 'path': error"
fn extract_path_from_error(error_message: &str) -> Option<String> {
    let start = error_message.find("path '")? + 6;
    let end = error_message[start..].find("':")?;

    Some(error_message[start..start + end].to_string())
}

/// Remove a field from the TOML configuration by path
fn remove_field_from_config(config: &mut Value, path: &str) {
    let parts: Vec<&str> = path.split('.').collect();

    let Some((last, parents)) = parts.split_last() else {
        return;
    };

    let mut current = config;

    for part in parents {
        match current.as_table_mut().and_then(|table| table.get_mut(*part)) {
            Some(value) => current = value,
            None => return,
        }
    }

    if let Some(table) = current.as_table_mut() {
        table.remove(*last);
        log::debug!("Removed optional field '{path}' due to missing environment variable");
    }
}

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref().to_path_buf();
    let content = std::fs::read_to_string(&path)?;
    let mut raw_config: Value = toml::from_str(&content)?;

    // Every retry removes one optional field, so this terminates after at most one pass per field.
    for _ in 0..=OPTIONAL_ENV_FIELDS.len() {
        let Err(err) = expand_dynamic_strings(&mut Vec::new(), &mut raw_config.clone()) else {
            break;
        };

        match extract_path_from_error(&err.to_string()) {
            Some(field) if is_optional_env_field(&field) && is_missing_env_var_error(&err) => {
                remove_field_from_config(&mut raw_config, &field);
            }
            _ => return Err(err),
        }
    }

    expand_dynamic_strings(&mut Vec::new(), &mut raw_config)?;

    let config = Config::deserialize(raw_config)?;
    validate(&config)?;

    Ok(config)
}

pub(crate) fn validate(config: &Config) -> anyhow::Result<()> {
    let quotas = &config.server.quotas;

    if quotas.window.is_zero() {
        bail!("server.quotas.window must be greater than zero.");
    }

    if config.server.auth.token_ttl.is_zero() {
        bail!("server.auth.token_ttl must be greater than zero.");
    }

    if quotas.eviction.enabled && quotas.eviction.retain_windows == 0 {
        bail!("server.quotas.eviction.retain_windows must be at least 1.");
    }

    if quotas.eviction.enabled && quotas.eviction.sweep_interval.is_zero() {
        bail!("server.quotas.eviction.sweep_interval must be greater than zero.");
    }

    let guest = IdentityClass::guest();

    if !quotas.limits.contains_key(&guest) {
        bail!("No quota limit configured for class '{guest}'. Add it to [server.quotas.limits].");
    }

    for user in &config.server.auth.users {
        if !quotas.limits.contains_key(&user.class) {
            bail!(
                "User '{}' has class '{}', which has no quota limit. Add it to [server.quotas.limits].",
                user.username,
                user.class
            );
        }
    }

    Ok(())
}

fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => match DynamicString::<String>::from_str(s) {
            Ok(out) => *s = out.into_inner(),
            Err(err) => {
                let mut p = String::new();

                for segment in path.iter() {
                    match segment {
                        Ok(s) => {
                            p.push_str(s);
                            p.push('.');
                        }
                        Err(i) => write!(p, "[{i}]")?,
                    }
                }

                if p.ends_with('.') {
                    p.pop();
                }

                bail!("Failed to expand dynamic string at path '{p}': {err}");
            }
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}
