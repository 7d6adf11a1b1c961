//! Stream descriptors: schema document plus key properties per stream.
//!
//! With a `schemas_dir`, each selected stream needs a `<stream>.json` file in
//! it. Without one, every stream gets a permissive object schema.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tap_sentry_core::contract::StreamDescriptor;
use tap_sentry_core::synchronise::Stream;
use tracing::debug;

pub fn default_schema() -> Value {
    json!({
        "type": ["null", "object"],
        "additionalProperties": true
    })
}

pub fn load_descriptors(
    schemas_dir: Option<&Path>,
    streams: &[Stream],
    key_overrides: &BTreeMap<String, Vec<String>>,
) -> Result<Vec<StreamDescriptor>> {
    streams
        .iter()
        .map(|&stream| -> Result<StreamDescriptor> {
            let schema = match schemas_dir {
                Some(dir) => load_schema(&dir.join(format!("{}.json", stream.name())))?,
                None => default_schema(),
            };
            let key_properties = key_overrides
                .get(stream.name())
                .cloned()
                .unwrap_or_else(|| stream.default_key_properties());
            debug!(stream = stream.name(), ?key_properties, "Resolved stream descriptor");
            Ok(StreamDescriptor::new(stream.name(), schema, key_properties))
        })
        .collect()
}

fn load_schema(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema file {path:?}"))?;
    let schema: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse schema file {path:?}"))?;
    if !schema.is_object() {
        anyhow::bail!("Schema file {path:?} must contain a JSON object");
    }
    Ok(schema)
}
