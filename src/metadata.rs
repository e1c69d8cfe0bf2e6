//! Experiment metadata
//!
//! A recorder host may point `MOTIF_METADATA_JSON_PATH` at a JSON file
//! describing the running experiment. Absence is normal, so every failure
//! here is logged and answered with an empty mapping.

use std::path::Path;

use serde_json::{Map, Value};

/// Environment variable naming the metadata file
pub const ENV_METADATA_JSON_PATH: &str = "MOTIF_METADATA_JSON_PATH";

/// Load the file named by `MOTIF_METADATA_JSON_PATH`, if any
pub fn experiment_metadata() -> Map<String, Value> {
    match std::env::var_os(ENV_METADATA_JSON_PATH) {
        Some(path) => load_experiment_metadata(Path::new(&path)),
        None => Map::new(),
    }
}

/// Load a metadata file. Anything but a readable JSON object yields an
/// empty mapping.
pub fn load_experiment_metadata(path: impl AsRef<Path>) -> Map<String, Value> {
    let path = path.as_ref();

    let contents = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Error reading metadata file");
            return Map::new();
        }
    };

    match serde_json::from_slice(&contents) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            tracing::warn!(path = %path.display(), "Metadata file is not a JSON object");
            Map::new()
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Error parsing metadata file");
            Map::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn file_with(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_object() {
        let file = file_with(r#"{"experiment": "flies", "trial": 3}"#);
        let md = load_experiment_metadata(file.path());

        assert_eq!(md.get("experiment"), Some(&Value::from("flies")));
        assert_eq!(md.get("trial"), Some(&Value::from(3)));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_experiment_metadata(dir.path().join("nope.json")).is_empty());
    }

    #[test]
    fn test_invalid_json_is_empty() {
        let file = file_with("{not json");
        assert!(load_experiment_metadata(file.path()).is_empty());
    }

    #[test]
    fn test_non_object_is_empty() {
        let file = file_with("[1, 2, 3]");
        assert!(load_experiment_metadata(file.path()).is_empty());
    }
}
