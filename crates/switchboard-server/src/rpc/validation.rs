//! Parameter extraction for action handlers.

use serde_json::{Map, Value};

use super::errors::RpcError;

/// Maximum length of a string parameter (8 KiB).
pub const MAX_PARAM_LENGTH: usize = 8_192;

/// Maximum entries in an array parameter.
pub const MAX_ARRAY_PARAM_LEN: usize = 1_000;

/// Validate that a string parameter does not exceed `max_len` bytes.
pub fn validate_string_param(value: &str, name: &str, max_len: usize) -> Result<(), RpcError> {
    if value.len() > max_len {
        return Err(RpcError::invalid_param(
            name,
            format!("exceeds maximum length ({} > {max_len})", value.len()),
        ));
    }
    Ok(())
}

/// A required, non-empty string.
pub fn require_str<'a>(data: &'a Map<String, Value>, name: &str) -> Result<&'a str, RpcError> {
    match data.get(name) {
        None | Some(Value::Null) => Err(RpcError::invalid_param(name, "missing")),
        Some(Value::String(s)) if s.is_empty() => Err(RpcError::invalid_param(name, "empty")),
        Some(Value::String(s)) => {
            validate_string_param(s, name, MAX_PARAM_LENGTH)?;
            Ok(s.as_str())
        }
        Some(_) => Err(RpcError::invalid_param(name, "not a string")),
    }
}

/// An optional string; absent or null reads as `""`.
pub fn optional_str<'a>(data: &'a Map<String, Value>, name: &str) -> Result<&'a str, RpcError> {
    match data.get(name) {
        None | Some(Value::Null) => Ok(""),
        Some(Value::String(s)) => {
            validate_string_param(s, name, MAX_PARAM_LENGTH)?;
            Ok(s.as_str())
        }
        Some(_) => Err(RpcError::invalid_param(name, "not a string")),
    }
}

/// A required, non-empty array of non-empty strings.
pub fn require_string_array(
    data: &Map<String, Value>,
    name: &str,
) -> Result<Vec<String>, RpcError> {
    let items = match data.get(name) {
        None | Some(Value::Null) => return Err(RpcError::invalid_param(name, "missing")),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(RpcError::invalid_param(name, "not an array")),
    };
    if items.is_empty() {
        return Err(RpcError::invalid_param(name, "empty"));
    }
    if items.len() > MAX_ARRAY_PARAM_LEN {
        return Err(RpcError::invalid_param(
            name,
            format!("too many entries ({} > {MAX_ARRAY_PARAM_LEN})", items.len()),
        ));
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) if !s.is_empty() => {
                validate_string_param(s, name, MAX_PARAM_LENGTH)?;
                Ok(s.clone())
            }
            _ => Err(RpcError::invalid_param(
                name,
                format!("entry {i} is not a non-empty string"),
            )),
        })
        .collect()
}
