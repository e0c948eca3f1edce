use std::collections::BTreeMap;
use std::iter::FromIterator;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use xtal_core::{ErrorInfo, PhaseError};

fn serde_error(code: &str, err: impl ToString) -> PhaseError {
    PhaseError::Storage(ErrorInfo::new(code, err.to_string()))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into JSON bytes with sorted object keys.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, PhaseError> {
    let value = serde_json::to_value(value).map_err(|err| serde_error("json-serialize", err))?;
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonicalize(value))
        .map_err(|err| serde_error("json-write", err))?;
    Ok(bytes)
}

/// Deserializes a YAML payload.
pub fn from_yaml_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, PhaseError> {
    serde_yaml::from_slice(data).map_err(|err| {
        PhaseError::Configuration(ErrorInfo::new("yaml-deserialize", err.to_string()))
    })
}

/// Serializes a value into YAML.
pub fn to_yaml_string<T: Serialize>(value: &T) -> Result<String, PhaseError> {
    serde_yaml::to_string(value).map_err(|err| serde_error("yaml-serialize", err))
}

/// Hex SHA-256 of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Stable hash of any serializable value via its canonical JSON form.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, PhaseError> {
    Ok(sha256_hex(&to_canonical_json_bytes(value)?))
}
