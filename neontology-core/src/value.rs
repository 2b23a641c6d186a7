//! Property value conversion.
//!
//! Models serialize to `serde_json` values. This module narrows those values
//! to what a graph backend can store ([`export_value`]) and converts between
//! JSON values and `neo4rs::BoltType` in both directions.

use neo4rs::BoltType;
use serde_json::{Map, Number, Value};

use crate::error::{NeontologyError, Result};

/// A flat property map, keyed by wire name.
pub type Properties = Map<String, Value>;

/// Returns a human-readable name for a [`neo4rs::BoltType`] variant.
pub fn type_name(v: &BoltType) -> &'static str {
    match v {
        BoltType::Null(_) => "Null",
        BoltType::Boolean(_) => "Boolean",
        BoltType::Integer(_) => "Integer",
        BoltType::Float(_) => "Float",
        BoltType::String(_) => "String",
        BoltType::Bytes(_) => "Bytes",
        BoltType::List(_) => "List",
        BoltType::Map(_) => "Map",
        BoltType::Node(_) => "Node",
        BoltType::Relation(_) => "Relationship",
        BoltType::UnboundedRelation(_) => "UnboundedRelationship",
        BoltType::Path(_) => "Path",
        BoltType::Point2D(_) => "Point2D",
        BoltType::Point3D(_) => "Point3D",
        BoltType::Duration(_) => "Duration",
        BoltType::Date(_) => "Date",
        BoltType::Time(_) => "Time",
        BoltType::LocalTime(_) => "LocalTime",
        BoltType::LocalDateTime(_) => "LocalDateTime",
        BoltType::DateTime(_) => "DateTime",
        BoltType::DateTimeZoneId(_) => "DateTimeZoneId",
    }
}

/// Returns a human-readable name for a JSON value's kind.
///
/// Integers and floats are distinct kinds, so `[1, 2.5]` is heterogeneous.
pub fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

// ---------------------------------------------------------------------------
// Export narrowing
// ---------------------------------------------------------------------------

/// Narrow one serialized property value to a storable graph value.
///
/// - maps are rejected outright;
/// - lists must be homogeneous and may not nest lists or maps;
/// - integers outside the signed 64-bit range are stringified;
/// - everything else passes through unchanged.
pub fn export_value(property: &str, value: Value) -> Result<Value> {
    match value {
        Value::Object(_) => Err(NeontologyError::unsupported_property(
            property,
            "maps cannot be stored as graph properties",
        )),
        Value::Array(items) => {
            let Some(first) = items.first() else {
                return Ok(Value::Array(items));
            };
            let kind = json_type_name(first);
            if matches!(kind, "list" | "map") {
                return Err(NeontologyError::unsupported_property(
                    property,
                    format!("lists of {kind}s cannot be stored as graph properties"),
                ));
            }
            if let Some(other) = items.iter().find(|v| json_type_name(v) != kind) {
                return Err(NeontologyError::unsupported_property(
                    property,
                    format!(
                        "all items in a list must share one type, found {kind} and {}",
                        json_type_name(other)
                    ),
                ));
            }
            items
                .into_iter()
                .map(|v| export_value(property, v))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        Value::Number(n) if n.is_u64() && n.as_i64().is_none() => Ok(Value::String(n.to_string())),
        other => Ok(other),
    }
}

/// Apply [`export_value`] to every entry of a property map.
pub fn export_properties(props: Properties) -> Result<Properties> {
    props
        .into_iter()
        .map(|(k, v)| {
            let v = export_value(&k, v)?;
            Ok((k, v))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// JSON -> Bolt (query parameters)
// ---------------------------------------------------------------------------

/// Convert a JSON value into a Bolt value for use as a query parameter.
pub fn json_to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(neo4rs::BoltNull),
        Value::Bool(b) => BoltType::Boolean(neo4rs::BoltBoolean::new(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => BoltType::Integer(neo4rs::BoltInteger::new(i)),
            None => BoltType::Float(neo4rs::BoltFloat::new(n.as_f64().unwrap_or(f64::NAN))),
        },
        Value::String(s) => BoltType::String(neo4rs::BoltString::from(s.as_str())),
        Value::Array(items) => BoltType::List(neo4rs::BoltList {
            value: items.iter().map(json_to_bolt).collect(),
        }),
        Value::Object(map) => {
            let mut out = neo4rs::BoltMap::new();
            for (k, v) in map {
                out.put(neo4rs::BoltString::from(k.as_str()), json_to_bolt(v));
            }
            BoltType::Map(out)
        }
    }
}

// ---------------------------------------------------------------------------
// Bolt -> JSON (results)
// ---------------------------------------------------------------------------

fn float(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

/// Convert a Bolt property map into a JSON property map.
pub fn bolt_map_to_properties(map: neo4rs::BoltMap) -> Result<Properties> {
    let mut out = Map::with_capacity(map.value.len());
    for (k, v) in map.value {
        let key = k.to_string();
        let value = bolt_to_json(v).map_err(|e| e.with_context(format!("property '{key}'")))?;
        out.insert(key, value);
    }
    Ok(out)
}

/// Convert a scalar, collection or temporal Bolt value into JSON.
///
/// Temporal values become ISO-8601 strings, which is also how `chrono`
/// types serialize, so they deserialize straight back into model fields.
/// Graph structures (nodes, relationships, paths) are rendered as plain maps;
/// typed materialization of those happens in [`crate::record`].
pub fn bolt_to_json(value: BoltType) -> Result<Value> {
    Ok(match value {
        BoltType::Null(_) => Value::Null,
        BoltType::Boolean(b) => Value::Bool(b.value),
        BoltType::Integer(i) => Value::from(i.value),
        BoltType::Float(f) => float(f.value),
        BoltType::String(s) => Value::String(s.value),
        BoltType::Bytes(b) => Value::Array(b.value.iter().map(|x| Value::from(*x)).collect()),
        BoltType::List(xs) => Value::Array(
            xs.value
                .into_iter()
                .map(bolt_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        BoltType::Map(m) => Value::Object(bolt_map_to_properties(m)?),
        BoltType::Node(n) => {
            let mut out = Map::new();
            out.insert("id".into(), Value::from(n.id.value));
            out.insert(
                "labels".into(),
                Value::Array(n.labels.value.iter().map(|l| Value::String(l.to_string())).collect()),
            );
            out.insert("properties".into(), Value::Object(bolt_map_to_properties(n.properties)?));
            Value::Object(out)
        }
        BoltType::Relation(r) => {
            let mut out = Map::new();
            out.insert("id".into(), Value::from(r.id.value));
            out.insert("type".into(), Value::String(r.typ.value));
            out.insert("start".into(), Value::from(r.start_node_id.value));
            out.insert("end".into(), Value::from(r.end_node_id.value));
            out.insert("properties".into(), Value::Object(bolt_map_to_properties(r.properties)?));
            Value::Object(out)
        }
        BoltType::UnboundedRelation(r) => {
            let mut out = Map::new();
            out.insert("id".into(), Value::from(r.id.value));
            out.insert("type".into(), Value::String(r.typ.value));
            out.insert("properties".into(), Value::Object(bolt_map_to_properties(r.properties)?));
            Value::Object(out)
        }
        BoltType::Path(p) => {
            let mut out = Map::new();
            let nodes = p.nodes().into_iter().map(|n| bolt_to_json(BoltType::Node(n)));
            let rels = p
                .rels()
                .into_iter()
                .map(|r| bolt_to_json(BoltType::UnboundedRelation(r)));
            out.insert("nodes".into(), Value::Array(nodes.collect::<Result<Vec<_>>>()?));
            out.insert("relationships".into(), Value::Array(rels.collect::<Result<Vec<_>>>()?));
            Value::Object(out)
        }
        BoltType::Point2D(p) => {
            let mut out = Map::new();
            out.insert("srid".into(), Value::from(p.sr_id.value));
            out.insert("x".into(), float(p.x.value));
            out.insert("y".into(), float(p.y.value));
            Value::Object(out)
        }
        BoltType::Point3D(p) => {
            let mut out = Map::new();
            out.insert("srid".into(), Value::from(p.sr_id.value));
            out.insert("x".into(), float(p.x.value));
            out.insert("y".into(), float(p.y.value));
            out.insert("z".into(), float(p.z.value));
            Value::Object(out)
        }
        BoltType::Duration(d) => {
            let d: std::time::Duration = d.into();
            Value::String(format!("PT{}S", d.as_secs_f64()))
        }
        BoltType::Date(d) => {
            let date: chrono::NaiveDate = d.try_into().map_err(|e: neo4rs::Error| {
                NeontologyError::Mapping(format!("BoltDate -> NaiveDate: {e}"))
            })?;
            Value::String(date.to_string())
        }
        BoltType::LocalTime(t) => {
            let time: chrono::NaiveTime = t.into();
            Value::String(time.to_string())
        }
        BoltType::Time(t) => {
            let (time, offset): (chrono::NaiveTime, chrono::FixedOffset) = t.into();
            Value::String(format!("{time}{offset}"))
        }
        BoltType::LocalDateTime(dt) => {
            let ndt: chrono::NaiveDateTime = dt.try_into().map_err(|e: neo4rs::Error| {
                NeontologyError::Mapping(format!("BoltLocalDateTime -> NaiveDateTime: {e}"))
            })?;
            Value::String(ndt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }
        BoltType::DateTime(dt) => {
            let cdt: chrono::DateTime<chrono::FixedOffset> = dt.try_into().map_err(|e: neo4rs::Error| {
                NeontologyError::Mapping(format!("BoltDateTime -> DateTime<FixedOffset>: {e}"))
            })?;
            Value::String(cdt.to_rfc3339())
        }
        BoltType::DateTimeZoneId(dt) => {
            let cdt: chrono::DateTime<chrono::FixedOffset> = (&dt).try_into().map_err(|e: neo4rs::Error| {
                NeontologyError::Mapping(format!("BoltDateTimeZoneId -> DateTime<FixedOffset>: {e}"))
            })?;
            Value::String(cdt.to_rfc3339())
        }
    })
}

/// Render a primary-property value as a stable string key.
///
/// Strings are used verbatim so that `"A"` and the identity value `A` print
/// the same way in exports; everything else uses its JSON form.
pub fn identity_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Like [`identity_key`] but tagged with the value's JSON kind, so the
/// string `"1"` and the number `1` stay distinct.
pub fn typed_identity_key(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(b) => format!("bool:{b}"),
        Value::Number(n) => format!("number:{n}"),
        Value::String(s) => format!("string:{s}"),
        Value::Array(_) => format!("array:{value}"),
        Value::Object(_) => format!("object:{value}"),
    }
}
