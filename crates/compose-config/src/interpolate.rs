//! Variable interpolation for manifest values.
//!
//! Supported forms:
//! - `${VAR}` and `$VAR`
//! - `${VAR:-default}` (default when unset or empty)
//! - `${VAR-default}` (default when unset)
//! - `${VAR:?message}` and `${VAR?message}` (error when unset)
//! - `$$` for a literal `$`

use crate::{ConfigError, Result};
use regex::Regex;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::warn;

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\$|\$\{([^}]+)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("interpolation pattern is valid")
});

/// Substitute variables in `input` using `environment`
pub fn interpolate(input: &str, environment: &BTreeMap<String, String>) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut last = 0;

    for cap in VARIABLE.captures_iter(input) {
        let full_match = cap.get(0).expect("group 0 always matches");
        result.push_str(&input[last..full_match.start()]);
        last = full_match.end();

        if full_match.as_str() == "$$" {
            result.push('$');
            continue;
        }

        let value = match (cap.get(1), cap.get(2)) {
            (Some(expr), _) => resolve_expression(expr.as_str(), environment)?,
            (None, Some(name)) => lookup(name.as_str(), environment),
            (None, None) => String::new(),
        };
        result.push_str(&value);
    }

    result.push_str(&input[last..]);
    Ok(result)
}

/// Substitute variables in every string scalar of `value`.
///
/// Mapping keys are left untouched.
pub fn interpolate_value(value: &mut Value, environment: &BTreeMap<String, String>) -> Result<()> {
    match value {
        Value::String(text) => *text = interpolate(text, environment)?,
        Value::Sequence(items) => {
            for item in items {
                interpolate_value(item, environment)?;
            }
        }
        Value::Mapping(entries) => {
            for (_, item) in entries.iter_mut() {
                interpolate_value(item, environment)?;
            }
        }
        Value::Tagged(tagged) => interpolate_value(&mut tagged.value, environment)?,
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
    Ok(())
}

/// Variable name followed by an optional operator and its argument
static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^([A-Za-z_][A-Za-z0-9_]*)(?:(:-|:\?|-|\?)(.*))?$")
        .expect("expression pattern is valid")
});

fn resolve_expression(expr: &str, environment: &BTreeMap<String, String>) -> Result<String> {
    let Some(cap) = EXPRESSION.captures(expr) else {
        return Err(ConfigError::InvalidInterpolation(format!("${{{}}}", expr)));
    };
    let name = &cap[1];
    let argument = cap.get(3).map_or("", |m| m.as_str());

    match cap.get(2).map(|m| m.as_str()) {
        None => Ok(lookup(name, environment)),
        Some(":-") => Ok(match environment.get(name) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => argument.to_string(),
        }),
        Some(":?") => match environment.get(name) {
            Some(value) if !value.is_empty() => Ok(value.clone()),
            _ => Err(missing(name, argument)),
        },
        Some("-") => Ok(environment
            .get(name)
            .cloned()
            .unwrap_or_else(|| argument.to_string())),
        Some(_) => environment
            .get(name)
            .cloned()
            .ok_or_else(|| missing(name, argument)),
    }
}

fn lookup(name: &str, environment: &BTreeMap<String, String>) -> String {
    match environment.get(name) {
        Some(value) => value.clone(),
        None => {
            warn!("The \"{}\" variable is not set. Defaulting to a blank string.", name);
            String::new()
        }
    }
}

fn missing(name: &str, message: &str) -> ConfigError {
    ConfigError::MissingVariable {
        name: name.to_string(),
        message: message.to_string(),
    }
}
