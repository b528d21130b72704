//! Loading recipe documents from JSON or YAML files.

use std::path::Path;

use serde_json::Value;

use crate::error::RecipeError;

/// Read a recipe file. `.yaml`/`.yml` files are parsed as YAML, anything
/// else as JSON.
pub fn load_document(path: &Path) -> Result<Value, RecipeError> {
    let load_error = |reason: String| RecipeError::DocumentLoad {
        path: path.display().to_string(),
        reason,
    };

    let content =
        std::fs::read_to_string(path).map_err(|e| load_error(format!("cannot read file: {e}")))?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .map_err(|e| load_error(format!("invalid YAML: {e}"))),
        _ => serde_json::from_str(&content).map_err(|e| load_error(format!("invalid JSON: {e}"))),
    }
}
