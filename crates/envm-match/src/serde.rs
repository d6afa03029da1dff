use std::fmt::Display;

use envm_core::errors::{EnvmError, ErrorInfo};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, Clone, Copy)]
enum Stage {
    JsonEncode,
    JsonDecode,
    YamlEncode,
    YamlDecode,
}

impl Stage {
    fn fail(self, err: impl Display) -> EnvmError {
        let code = match self {
            Stage::JsonEncode => "json-encode",
            Stage::JsonDecode => "json-decode",
            Stage::YamlEncode => "yaml-encode",
            Stage::YamlDecode => "yaml-decode",
        };
        EnvmError::Serde(ErrorInfo::new(code, err.to_string()))
    }
}

/// JSON bytes with object keys in sorted order, whatever the field order of
/// the serialized types.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, EnvmError> {
    // serde_json's Map is ordered by key unless `preserve_order` is enabled
    let tree = serde_json::to_value(value).map_err(|err| Stage::JsonEncode.fail(err))?;
    serde_json::to_vec(&tree).map_err(|err| Stage::JsonEncode.fail(err))
}

/// Decodes JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, EnvmError> {
    serde_json::from_slice(data).map_err(|err| Stage::JsonDecode.fail(err))
}

/// Encodes a value as YAML text.
pub fn to_yaml_string<T: Serialize>(value: &T) -> Result<String, EnvmError> {
    serde_yaml::to_string(value).map_err(|err| Stage::YamlEncode.fail(err))
}

/// Decodes YAML bytes.
pub fn from_yaml_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, EnvmError> {
    serde_yaml::from_slice(data).map_err(|err| Stage::YamlDecode.fail(err))
}
