use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{TypeError, TypeResult};

/// Key of the nested section holding an object's identity.
pub const KEY_METADATA: &str = "metadata";
/// Key of the namespace inside the metadata section.
pub const KEY_NAMESPACE: &str = "namespace";
/// Key of the name inside the metadata section.
pub const KEY_NAME: &str = "name";

const FIELD_NAMESPACE: &str = "metadata.namespace";
const FIELD_NAME: &str = "metadata.name";

/// Identity of a stored object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Extract the identity from an object's top-level field map.
    pub fn from_fields(fields: &Map<String, Value>) -> TypeResult<Self> {
        let metadata = match fields.get(KEY_METADATA) {
            None => return Err(TypeError::MissingField(KEY_METADATA)),
            Some(Value::Object(m)) => m,
            Some(other) => {
                return Err(TypeError::WrongType {
                    field: KEY_METADATA,
                    expected: "an object",
                    found: kind_of(other),
                })
            }
        };

        let namespace = string_field(metadata, KEY_NAMESPACE, FIELD_NAMESPACE)?;
        let name = string_field(metadata, KEY_NAME, FIELD_NAME)?;
        Ok(Self::new(namespace, name))
    }
}

/// A producer's object, projected to the fields kit interprets.
///
/// The full field map (including `metadata`) is kept untouched so it can be
/// serialized verbatim; `meta` is a typed copy of the identifying fields.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectRecord {
    meta: ObjectMeta,
    fields: Map<String, Value>,
}

impl ObjectRecord {
    /// Convert any serializable producer type into a record.
    ///
    /// The value must serialize to a map; its identity is then extracted as
    /// with [`ObjectRecord::try_from`]. NaN and infinite floats are rejected:
    /// the JSON data model has no room for them.
    pub fn from_serializable<T: Serialize + ?Sized>(object: &T) -> TypeResult<Self> {
        let shadow =
            serde_yaml::to_value(object).map_err(|e| TypeError::Conversion(e.to_string()))?;
        reject_non_finite(&shadow)?;

        let value =
            serde_json::to_value(object).map_err(|e| TypeError::Conversion(e.to_string()))?;
        Self::try_from(value)
    }

    pub fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    pub fn namespace(&self) -> &str {
        &self.meta.namespace
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// The complete field map, identity included.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl TryFrom<Map<String, Value>> for ObjectRecord {
    type Error = TypeError;

    fn try_from(fields: Map<String, Value>) -> TypeResult<Self> {
        let meta = ObjectMeta::from_fields(&fields)?;
        Ok(Self { meta, fields })
    }
}

impl TryFrom<Value> for ObjectRecord {
    type Error = TypeError;

    fn try_from(value: Value) -> TypeResult<Self> {
        match value {
            Value::Object(fields) => Self::try_from(fields),
            other => Err(TypeError::Conversion(format!(
                "expected an object, found {}",
                kind_of(&other)
            ))),
        }
    }
}

fn string_field(
    metadata: &Map<String, Value>,
    key: &str,
    field: &'static str,
) -> TypeResult<String> {
    match metadata.get(key) {
        None => Err(TypeError::MissingField(field)),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(TypeError::WrongType {
            field,
            expected: "a string",
            found: kind_of(other),
        }),
    }
}

/// `serde_json` maps non-finite floats to null without complaint, so they
/// are looked for in a YAML rendering of the same value.
fn reject_non_finite(value: &serde_yaml::Value) -> TypeResult<()> {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Number(n) if !n.is_finite() => Err(TypeError::Conversion(format!(
            "non-finite number {n} has no stored form"
        ))),
        Yaml::Sequence(items) => items.iter().try_for_each(reject_non_finite),
        Yaml::Mapping(map) => map.iter().try_for_each(|(k, v)| {
            reject_non_finite(k)?;
            reject_non_finite(v)
        }),
        Yaml::Tagged(tagged) => reject_non_finite(&tagged.value),
        _ => Ok(()),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn extracts_identity() {
        let record = ObjectRecord::try_from(json!({
            "metadata": {"namespace": "default", "name": "web-1"},
            "status": "Running",
        }))
        .unwrap();
        assert_eq!(record.namespace(), "default");
        assert_eq!(record.name(), "web-1");
        assert_eq!(record.fields()["status"], "Running");
        assert!(record.fields().contains_key("metadata"));
    }

    #[test]
    fn missing_metadata() {
        let err = ObjectRecord::try_from(json!({"status": "Running"})).unwrap_err();
        assert_eq!(err, TypeError::MissingField("metadata"));
    }

    #[test]
    fn missing_namespace() {
        let err = ObjectRecord::try_from(json!({"metadata": {"name": "web-1"}})).unwrap_err();
        assert_eq!(err, TypeError::MissingField("metadata.namespace"));
        assert_eq!(err.to_string(), "not found: metadata.namespace");
    }

    #[test]
    fn missing_name() {
        let err =
            ObjectRecord::try_from(json!({"metadata": {"namespace": "default"}})).unwrap_err();
        assert_eq!(err, TypeError::MissingField("metadata.name"));
    }

    #[test]
    fn mistyped_fields() {
        let err = ObjectRecord::try_from(json!({"metadata": "nope"})).unwrap_err();
        assert!(matches!(err, TypeError::WrongType { field: "metadata", .. }));

        let err = ObjectRecord::try_from(json!({
            "metadata": {"namespace": 7, "name": "web-1"}
        }))
        .unwrap_err();
        assert_eq!(
            err,
            TypeError::WrongType {
                field: "metadata.namespace",
                expected: "a string",
                found: "a number",
            }
        );
    }

    #[test]
    fn non_object_is_rejected() {
        let err = ObjectRecord::try_from(json!(["a", "b"])).unwrap_err();
        assert!(matches!(err, TypeError::Conversion(_)));
    }

    #[test]
    fn from_serializable_struct() {
        #[derive(Serialize)]
        struct Pod {
            metadata: ObjectMeta,
            phase: &'static str,
        }

        let pod = Pod {
            metadata: ObjectMeta::new("kube-system", "dns"),
            phase: "Pending",
        };
        let record = ObjectRecord::from_serializable(&pod).unwrap();
        assert_eq!(record.meta(), &ObjectMeta::new("kube-system", "dns"));
        assert_eq!(record.fields()["phase"], "Pending");
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        #[derive(Serialize)]
        struct Sensor {
            metadata: ObjectMeta,
            samples: Vec<f64>,
        }

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let obj = Sensor {
                metadata: ObjectMeta::new("default", "sensor"),
                samples: vec![1.5, bad],
            };
            let err = ObjectRecord::from_serializable(&obj).unwrap_err();
            assert!(matches!(err, TypeError::Conversion(_)), "{bad}: {err}");
        }

        let fine = Sensor {
            metadata: ObjectMeta::new("default", "sensor"),
            samples: vec![1.5, -0.25],
        };
        let record = ObjectRecord::from_serializable(&fine).unwrap();
        assert_eq!(record.fields()["samples"], json!([1.5, -0.25]));
    }

    proptest! {
        #[test]
        fn identity_survives_extraction(ns in ".*", name in ".*") {
            let record = ObjectRecord::try_from(json!({
                "metadata": {"namespace": ns.clone(), "name": name.clone()},
            }))
            .unwrap();
            prop_assert_eq!(record.namespace(), ns.as_str());
            prop_assert_eq!(record.name(), name.as_str());
        }
    }
}
