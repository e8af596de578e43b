//! YAML rendering of stored objects.
//!
//! The field map is a `serde_json::Map`, which keeps keys sorted, so the same
//! structure always renders to the same bytes and git diffs stay minimal.
//! (This relies on `serde_json`'s `preserve_order` feature staying off.)

use kit_types::ObjectRecord;
use serde_json::Value;

use crate::error::{SerdeStage, StoreError, StoreResult};

/// Render an object's complete field map as YAML.
pub fn to_yaml(record: &ObjectRecord) -> StoreResult<Vec<u8>> {
    serde_yaml::to_string(record.fields())
        .map(String::into_bytes)
        .map_err(|e| StoreError::Serialization {
            stage: SerdeStage::Render,
            reason: e.to_string(),
        })
}

/// Parse a stored file back into a record.
pub fn from_yaml(data: &[u8]) -> StoreResult<ObjectRecord> {
    let value: Value = serde_yaml::from_slice(data).map_err(|e| StoreError::Serialization {
        stage: SerdeStage::Parse,
        reason: e.to_string(),
    })?;
    Ok(ObjectRecord::try_from(value)?)
}
