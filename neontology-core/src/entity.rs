//! Behaviour shared by node and relationship models.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{NeontologyError, Result};
use crate::fields::{FieldSpec, FieldUsage};
use crate::value::{export_value, json_type_name, Properties};

/// A declared node or relationship model.
///
/// Implemented by `#[derive(Node)]` and `#[derive(Relationship)]`. Field
/// aliases come from serde: a field declared with `#[serde(rename = "x")]`
/// appears as `x` in every property map produced here.
pub trait Entity: Serialize + Clone + Debug + Send + Sync + 'static {
    /// The Rust type name, used in diagnostics.
    fn type_name() -> &'static str;

    /// Every declared field, including fields inherited through `extends`.
    fn field_specs() -> Vec<FieldSpec>;

    /// The lifecycle partition of [`field_specs`](Entity::field_specs),
    /// computed once per type.
    fn field_usage() -> &'static FieldUsage;

    /// Serialize to storable property values, dropping nulls.
    fn engine_dict(&self) -> Result<Properties> {
        engine_dict(self, &DictOptions::default())
    }

    /// Serialize to storable property values with explicit options.
    fn engine_dict_with(&self, options: &DictOptions<'_>) -> Result<Properties> {
        engine_dict(self, options)
    }
}

/// Options for [`engine_dict`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DictOptions<'a> {
    /// Wire names to leave out.
    pub exclude: &'a [&'a str],
    /// When set, only these wire names are kept.
    pub include: Option<&'a [&'a str]>,
    /// Keep entries whose value is null.
    pub keep_nulls: bool,
}

/// Serialize `entity` into a flat map of storable values.
///
/// Fails when the model does not serialize to a map, or when any kept value
/// is a map or a heterogeneous list.
pub fn engine_dict<T: Serialize + ?Sized>(entity: &T, options: &DictOptions<'_>) -> Result<Properties> {
    let map = match serde_json::to_value(entity)? {
        Value::Object(map) => map,
        other => {
            return Err(NeontologyError::type_mismatch(
                "map",
                json_type_name(&other),
                std::any::type_name::<T>(),
            ))
        }
    };

    let mut out = Properties::new();
    for (key, value) in map {
        if options.exclude.contains(&key.as_str()) {
            continue;
        }
        if let Some(include) = options.include {
            if !include.contains(&key.as_str()) {
                continue;
            }
        }
        if value.is_null() && !options.keep_nulls {
            continue;
        }
        let value = export_value(&key, value)?;
        out.insert(key, value);
    }
    Ok(out)
}

/// Build a model from a property map, running serde validation.
pub fn from_properties<T: DeserializeOwned>(props: Properties, type_name: &str) -> Result<T> {
    serde_json::from_value(Value::Object(props))
        .map_err(|e| NeontologyError::from(e).with_context(format!("building {type_name}")))
}

/// Property values bucketed by merge lifecycle.
///
/// `always_set` never contains nulls, so a partial update does not clear
/// values already stored. `set_on_create` and `set_on_match` keep nulls.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeParameters {
    pub always_set: Properties,
    pub set_on_create: Properties,
    pub set_on_match: Properties,
    /// Every non-null property outside `never_set`.
    pub all_props: Properties,
}

impl MergeParameters {
    /// Bucket a serialized property map (nulls included) by `usage`.
    ///
    /// Keys in `skip` (such as the primary property, which is matched on
    /// rather than set) are left out of the three lifecycle buckets.
    pub fn build(props: &Properties, usage: &FieldUsage, skip: &[&str]) -> Self {
        let mut params = MergeParameters::default();

        for (key, value) in props {
            if usage.never_set.iter().any(|n| n == key) {
                continue;
            }
            if !value.is_null() {
                params.all_props.insert(key.clone(), value.clone());
            }
            if skip.contains(&key.as_str()) {
                continue;
            }
            if usage.set_on_create.iter().any(|n| n == key) {
                params.set_on_create.insert(key.clone(), value.clone());
            } else if usage.set_on_match.iter().any(|n| n == key) {
                params.set_on_match.insert(key.clone(), value.clone());
            } else if !value.is_null() {
                params.always_set.insert(key.clone(), value.clone());
            }
        }

        params
    }

    /// Compute the merge parameters of an entity.
    pub fn of<T: Entity>(entity: &T, exclude: &[&str], skip: &[&str]) -> Result<Self> {
        let props = entity.engine_dict_with(&DictOptions {
            exclude,
            keep_nulls: true,
            ..DictOptions::default()
        })?;
        Ok(Self::build(&props, T::field_usage(), skip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldUsage;
    use serde_json::json;

    #[derive(Serialize)]
    struct Sample {
        name: String,
        #[serde(rename = "years")]
        age: Option<i64>,
        tags: Vec<String>,
    }

    #[test]
    fn test_engine_dict_uses_alias_and_drops_nulls() {
        let s = Sample { name: "A".into(), age: None, tags: vec!["x".into()] };
        let dict = engine_dict(&s, &DictOptions::default()).unwrap();
        assert_eq!(dict.get("name"), Some(&json!("A")));
        assert!(!dict.contains_key("years"));
        assert!(!dict.contains_key("age"));

        let kept = engine_dict(&s, &DictOptions { keep_nulls: true, ..Default::default() }).unwrap();
        assert_eq!(kept.get("years"), Some(&Value::Null));
    }

    #[test]
    fn test_engine_dict_include_exclude() {
        let s = Sample { name: "A".into(), age: Some(3), tags: vec![] };
        let only = engine_dict(&s, &DictOptions { include: Some(&["years"]), ..Default::default() }).unwrap();
        assert_eq!(only.len(), 1);
        let without = engine_dict(&s, &DictOptions { exclude: &["tags"], ..Default::default() }).unwrap();
        assert!(!without.contains_key("tags"));
    }

    #[test]
    fn test_merge_parameters_null_asymmetry() {
        let usage = FieldUsage {
            always_set: vec!["pp".into(), "a".into()],
            set_on_create: vec!["c".into()],
            set_on_match: vec!["m".into()],
            never_set: vec!["n".into()],
            merge_on: vec![],
        };
        let mut props = Properties::new();
        props.insert("pp".into(), json!("id"));
        props.insert("a".into(), Value::Null);
        props.insert("c".into(), Value::Null);
        props.insert("m".into(), json!(2));
        props.insert("n".into(), json!("server"));

        let params = MergeParameters::build(&props, &usage, &["pp"]);
        assert!(params.always_set.is_empty());
        assert_eq!(params.set_on_create.get("c"), Some(&Value::Null));
        assert_eq!(params.set_on_match.get("m"), Some(&json!(2)));
        assert_eq!(params.all_props.len(), 2);
        assert!(!params.all_props.contains_key("n"));
    }
}
