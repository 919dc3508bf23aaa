//! Thin YAML-file loaders for the structures the engine itself only
//! deserializes (spec.md §1: "YAML file loaders" are an external
//! collaborator, kept out of the core engine). `Suite`, `Policy`, and
//! `AdapterSpec` are already plain `serde::Deserialize` structs, so every
//! loader here is read-file-then-parse plus a path in the error message.

use aipo_adapter_api::AdapterSpec;
use aipo_core::{Policy, Suite};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("malformed YAML in {path}: {source}")]
    Parse { path: PathBuf, source: serde_yaml::Error },
    #[error("no adapter spec found for `{name}` (looked for it as a file path and as adapters/{name}.yaml)")]
    AdapterNotFound { name: String },
}

fn read_and_parse<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Read { path: path.to_path_buf(), source })?;
    serde_yaml::from_str(&text).map_err(|source| LoadError::Parse { path: path.to_path_buf(), source })
}

pub fn load_suite(path: &Path) -> Result<Suite, LoadError> {
    read_and_parse(path)
}

pub fn load_policy(path: &Path) -> Result<Policy, LoadError> {
    read_and_parse(path)
}

/// Resolves `--adapter <name>` to a spec. `name` is tried first as a literal
/// path; if that doesn't exist, `adapters/<name>.yaml` (relative to the
/// current working directory) is tried instead.
pub fn load_adapter_spec(name: &str) -> Result<AdapterSpec, LoadError> {
    let direct = Path::new(name);
    if direct.is_file() {
        return read_and_parse(direct);
    }
    let conventional = Path::new("adapters").join(format!("{name}.yaml"));
    if conventional.is_file() {
        return read_and_parse(&conventional);
    }
    Err(LoadError::AdapterNotFound { name: name.to_string() })
}
