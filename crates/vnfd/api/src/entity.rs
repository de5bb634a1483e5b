use core::cmp::Ordering;

use serde_yaml::{Sequence, Value};

use crate::error::{Error, Result};

/// Ordered key/value mapping exchanged with the document layer.
pub type RawMapping = ::serde_yaml::Mapping;

/// Common contract of every descriptor entity: populated exactly once,
/// either from typed arguments (`configure` on the concrete type) or from
/// a raw mapping, and exported back into an ordered mapping.
pub trait Entity {
    const KIND: &'static str;

    /// Identity key: the id, falling back to the name for entities
    /// without one.
    fn key(&self) -> &str;

    fn configured(&self) -> bool;

    /// Populate the entity from a raw mapping. Unrecognized keys are kept
    /// verbatim and re-emitted by [`Entity::to_mapping`], never
    /// interpreted.
    fn load(&mut self, raw: &RawMapping) -> Result<()>;

    /// Export the entity into an ordered mapping matching the external
    /// schema. Unset optionals and internal bookkeeping are omitted.
    fn to_mapping(&self) -> RawMapping;

    fn guard_unconfigured(&self) -> Result<()> {
        if self.configured() {
            Err(Error::AlreadyConfigured {
                kind: Self::KIND,
                id: self.key().into(),
            })
        } else {
            Ok(())
        }
    }
}

/// Identity-based comparison, used wherever entities of one kind need
/// ordering. Entities deliberately do not implement `PartialEq`;
/// structural equality is never identity.
pub fn compare_entities<E>(a: &E, b: &E) -> Ordering
where
    E: Entity,
{
    a.key().cmp(b.key())
}

pub(crate) fn put(map: &mut RawMapping, key: &str, value: impl Into<Value>) {
    map.insert(Value::from(key), value.into());
}

pub(crate) fn put_extras(map: &mut RawMapping, extra: &RawMapping) {
    for (key, value) in extra {
        map.insert(key.clone(), value.clone());
    }
}

pub(crate) fn expect_str(key: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(Into::into)
        .ok_or_else(|| Error::Validation(format!("the key {key:?} expects a string value")))
}

pub(crate) fn expect_u64(key: &str, value: &Value) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| Error::Validation(format!("the key {key:?} expects an integer value")))
}

pub(crate) fn expect_i64(key: &str, value: &Value) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| Error::Validation(format!("the key {key:?} expects an integer value")))
}

pub(crate) fn expect_f64(key: &str, value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| Error::Validation(format!("the key {key:?} expects a numeric value")))
}

pub(crate) fn expect_bool(key: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| Error::Validation(format!("the key {key:?} expects a boolean value")))
}

pub(crate) fn expect_seq<'a>(key: &str, value: &'a Value) -> Result<&'a Sequence> {
    value
        .as_sequence()
        .ok_or_else(|| Error::Validation(format!("the key {key:?} expects a sequence value")))
}

pub(crate) fn expect_map<'a>(key: &str, value: &'a Value) -> Result<&'a RawMapping> {
    value
        .as_mapping()
        .ok_or_else(|| Error::Validation(format!("the key {key:?} expects a mapping value")))
}

/// Scalar as its string form: numeric document fields such as `version`
/// are normalized to strings so a load → export round trip stays stable.
pub(crate) fn expect_scalar_string(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(value) => Ok(value.clone()),
        Value::Number(value) => Ok(value.to_string()),
        _ => Err(Error::Validation(format!(
            "the key {key:?} expects a scalar value"
        ))),
    }
}

pub(crate) fn expect_item_map<'a>(key: &str, value: &'a Value) -> Result<&'a RawMapping> {
    value.as_mapping().ok_or_else(|| {
        Error::Validation(format!("the key {key:?} expects a sequence of mappings"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_string_normalizes_numbers() {
        assert_eq!(
            expect_scalar_string("version", &Value::from(1.5)).unwrap(),
            "1.5",
        );
        assert_eq!(
            expect_scalar_string("version", &Value::from("1.5")).unwrap(),
            "1.5",
        );
        assert!(expect_scalar_string("version", &Value::from(vec![Value::Null])).is_err());
    }

    #[test]
    fn extras_keep_document_order() {
        let mut extra = RawMapping::new();
        put(&mut extra, "z-key", "z");
        put(&mut extra, "a-key", "a");

        let mut map = RawMapping::new();
        put(&mut map, "id", "x");
        put_extras(&mut map, &extra);

        let keys: Vec<_> = map.keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, vec!["id", "z-key", "a-key"]);
    }
}
