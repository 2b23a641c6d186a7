//! Structured filters for node queries.
//!
//! A filter map has keys of the form `field` or `field__lookup`. Every entry
//! becomes one predicate and the predicates are ANDed. Cypher engines render
//! filters with [`Filters::where_clause`]; the in-memory engine evaluates
//! them with [`Filters::matches`].

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use crate::error::{NeontologyError, Result};
use crate::identifier::escape_identifier;
use crate::value::Properties;

/// A lookup operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lookup {
    Exact,
    IExact,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    Gt,
    Lt,
    Gte,
    Lte,
    In,
    IsNull,
}

impl Lookup {
    pub const ALL: [Lookup; 12] = [
        Lookup::Exact,
        Lookup::IExact,
        Lookup::Contains,
        Lookup::IContains,
        Lookup::StartsWith,
        Lookup::IStartsWith,
        Lookup::Gt,
        Lookup::Lt,
        Lookup::Gte,
        Lookup::Lte,
        Lookup::In,
        Lookup::IsNull,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Lookup::Exact => "exact",
            Lookup::IExact => "iexact",
            Lookup::Contains => "contains",
            Lookup::IContains => "icontains",
            Lookup::StartsWith => "startswith",
            Lookup::IStartsWith => "istartswith",
            Lookup::Gt => "gt",
            Lookup::Lt => "lt",
            Lookup::Gte => "gte",
            Lookup::Lte => "lte",
            Lookup::In => "in",
            Lookup::IsNull => "isnull",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Lookup::ALL.into_iter().find(|l| l.as_str() == s)
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed filter entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub lookup: Lookup,
    pub value: Value,
}

impl Filter {
    /// Parse a `field` or `field__lookup` key.
    pub fn parse(key: &str, value: Value) -> Result<Self> {
        let (field, lookup) = match key.rsplit_once("__") {
            Some((field, suffix)) => {
                let lookup = Lookup::parse(suffix)
                    .ok_or_else(|| NeontologyError::invalid_filter(key, format!("unknown lookup '{suffix}'")))?;
                (field, lookup)
            }
            None => (key, Lookup::Exact),
        };

        if field.is_empty() {
            return Err(NeontologyError::invalid_filter(key, "missing field name"));
        }
        match lookup {
            Lookup::In if !value.is_array() => {
                return Err(NeontologyError::invalid_filter(key, "'in' needs a list value"));
            }
            Lookup::IsNull if !value.is_boolean() => {
                return Err(NeontologyError::invalid_filter(key, "'isnull' needs a boolean value"));
            }
            _ => {}
        }

        Ok(Filter {
            field: field.to_owned(),
            lookup,
            value,
        })
    }

    /// Deterministic parameter name derived from field and lookup.
    pub fn param_name(&self) -> String {
        let field: String = self
            .field
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("filter_{field}_{}", self.lookup)
    }

    /// The Cypher predicate for node variable `var`, plus its parameter.
    pub fn predicate(&self, var: &str, param: &str) -> (String, Option<Value>) {
        let prop = format!("{var}.{}", escape_identifier(&self.field));
        let value = Some(self.value.clone());
        match self.lookup {
            Lookup::Exact => (format!("{prop} = ${param}"), value),
            Lookup::IExact => (format!("toLower({prop}) = toLower(${param})"), value),
            Lookup::Contains => (format!("{prop} CONTAINS ${param}"), value),
            Lookup::IContains => (format!("toLower({prop}) CONTAINS toLower(${param})"), value),
            Lookup::StartsWith => (format!("{prop} STARTS WITH ${param}"), value),
            Lookup::IStartsWith => (format!("toLower({prop}) STARTS WITH toLower(${param})"), value),
            Lookup::Gt => (format!("{prop} > ${param}"), value),
            Lookup::Lt => (format!("{prop} < ${param}"), value),
            Lookup::Gte => (format!("{prop} >= ${param}"), value),
            Lookup::Lte => (format!("{prop} <= ${param}"), value),
            Lookup::In => (format!("{prop} IN ${param}"), value),
            Lookup::IsNull if self.value.as_bool() == Some(true) => (format!("{prop} IS NULL"), None),
            Lookup::IsNull => (format!("{prop} IS NOT NULL"), None),
        }
    }

    /// Evaluate against a stored property map.
    pub fn matches(&self, props: &Properties) -> bool {
        let actual = props.get(&self.field).filter(|v| !v.is_null());

        match self.lookup {
            Lookup::IsNull => actual.is_none() == self.value.as_bool().unwrap_or(false),
            Lookup::In => match (actual, self.value.as_array()) {
                (Some(a), Some(options)) => options.iter().any(|o| values_equal(a, o)),
                _ => false,
            },
            _ => match actual {
                Some(a) => self.compare(a),
                None => false,
            },
        }
    }

    fn compare(&self, actual: &Value) -> bool {
        let text = || Some((actual.as_str()?, self.value.as_str()?));
        let lower = || text().map(|(a, b)| (a.to_lowercase(), b.to_lowercase()));

        match self.lookup {
            Lookup::Exact => values_equal(actual, &self.value),
            Lookup::IExact => lower().map_or(false, |(a, b)| a == b),
            Lookup::Contains => text().map_or(false, |(a, b)| a.contains(b)),
            Lookup::IContains => lower().map_or(false, |(a, b)| a.contains(&b)),
            Lookup::StartsWith => text().map_or(false, |(a, b)| a.starts_with(b)),
            Lookup::IStartsWith => lower().map_or(false, |(a, b)| a.starts_with(&b)),
            Lookup::Gt => compare_values(actual, &self.value) == Some(Ordering::Greater),
            Lookup::Lt => compare_values(actual, &self.value) == Some(Ordering::Less),
            Lookup::Gte => matches!(compare_values(actual, &self.value), Some(Ordering::Greater | Ordering::Equal)),
            Lookup::Lte => matches!(compare_values(actual, &self.value), Some(Ordering::Less | Ordering::Equal)),
            Lookup::In | Lookup::IsNull => false,
        }
    }
}

/// Equality with integer/float unification, as Cypher compares numbers.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering between two values of comparable kinds.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// An ANDed set of filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    filters: Vec<Filter>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `(key, value)` pairs.
    ///
    /// ```rust
    /// # use neontology_core::filter::{Filters, Lookup};
    /// # use serde_json::json;
    /// let filters = Filters::parse([("age__gte", json!(18)), ("name", json!("Ada"))]).unwrap();
    /// assert_eq!(filters.iter().next().unwrap().lookup, Lookup::Gte);
    /// ```
    pub fn parse<I, K>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let filters = pairs
            .into_iter()
            .map(|(k, v)| Filter::parse(k.as_ref(), v))
            .collect::<Result<Vec<_>>>()?;
        Ok(Filters { filters })
    }

    /// Parse a property-style map.
    pub fn from_map(map: &Properties) -> Result<Self> {
        Self::parse(map.iter().map(|(k, v)| (k.as_str(), v.clone())))
    }

    /// Add a single filter.
    pub fn and(mut self, key: &str, value: impl Into<Value>) -> Result<Self> {
        self.filters.push(Filter::parse(key, value.into())?);
        Ok(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Fail with [`NeontologyError::NotImplemented`] for the first lookup
    /// outside `supported`.
    pub fn check_supported(&self, supported: &[Lookup], engine: &str) -> Result<()> {
        match self.filters.iter().find(|f| !supported.contains(&f.lookup)) {
            Some(f) => Err(NeontologyError::not_implemented(
                format!("the '{}' filter lookup", f.lookup),
                engine,
            )),
            None => Ok(()),
        }
    }

    /// Render a `WHERE` clause (empty when there are no filters) and its
    /// parameters for node variable `var`.
    pub fn where_clause(&self, var: &str) -> (String, Properties) {
        let mut params = Properties::new();
        let mut predicates = Vec::with_capacity(self.filters.len());

        for filter in &self.filters {
            let base = filter.param_name();
            let mut name = base.clone();
            let mut n = 1;
            while params.contains_key(&name) {
                n += 1;
                name = format!("{base}_{n}");
            }
            let (predicate, value) = filter.predicate(var, &name);
            if let Some(value) = value {
                params.insert(name, value);
            }
            predicates.push(predicate);
        }

        if predicates.is_empty() {
            (String::new(), params)
        } else {
            (format!("WHERE {}", predicates.join(" AND ")), params)
        }
    }

    pub fn matches(&self, props: &Properties) -> bool {
        self.filters.iter().all(|f| f.matches(props))
    }
}

impl TryFrom<Properties> for Filters {
    type Error = NeontologyError;

    fn try_from(map: Properties) -> Result<Self> {
        Self::parse(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_default_lookup() {
        let f = Filter::parse("name", json!("A")).unwrap();
        assert_eq!(f.field, "name");
        assert_eq!(f.lookup, Lookup::Exact);
    }

    #[test]
    fn test_parse_field_with_underscores() {
        let f = Filter::parse("first_name__istartswith", json!("a")).unwrap();
        assert_eq!(f.field, "first_name");
        assert_eq!(f.lookup, Lookup::IStartsWith);
        assert_eq!(f.param_name(), "filter_first_name_istartswith");
    }

    #[test]
    fn test_unknown_lookup_is_rejected() {
        let err = Filter::parse("age__between", json!([1, 2])).unwrap_err();
        assert!(matches!(err, NeontologyError::InvalidFilter { .. }));
    }

    #[test]
    fn test_lookup_names() {
        let names: Vec<&str> = Lookup::ALL.iter().map(|l| l.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "exact", "iexact", "contains", "icontains", "startswith", "istartswith", "gt", "lt", "gte", "lte",
                "in", "isnull"
            ]
        );
        assert_eq!(Lookup::parse("endswith"), None);
        assert_eq!(Lookup::parse("iendswith"), None);
    }

    #[test]
    fn test_where_clause_same_field_two_lookups() {
        let filters = Filters::parse([("age__gt", json!(1)), ("age__lt", json!(9))]).unwrap();
        let (clause, params) = filters.where_clause("n");
        assert_eq!(clause, "WHERE n.age > $filter_age_gt AND n.age < $filter_age_lt");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_isnull_has_no_parameter() {
        let filters = Filters::parse([("email__isnull", json!(true))]).unwrap();
        let (clause, params) = filters.where_clause("n");
        assert_eq!(clause, "WHERE n.email IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_matches_each_lookup() {
        let mut props = Properties::new();
        props.insert("name".into(), json!("Alice"));
        props.insert("age".into(), json!(30));

        let check = |key: &str, value: Value| Filter::parse(key, value).unwrap().matches(&props);
        assert!(check("name", json!("Alice")));
        assert!(check("name__iexact", json!("alice")));
        assert!(check("name__contains", json!("lic")));
        assert!(!check("name__contains", json!("LIC")));
        assert!(check("name__icontains", json!("LIC")));
        assert!(check("name__startswith", json!("Al")));
        assert!(check("name__istartswith", json!("al")));
        assert!(check("age__gt", json!(29)));
        assert!(check("age__gte", json!(30.0)));
        assert!(check("age__lt", json!(31)));
        assert!(check("age__lte", json!(30)));
        assert!(check("age__in", json!([1, 30])));
        assert!(check("email__isnull", json!(true)));
        assert!(!check("age__isnull", json!(true)));
    }

    #[test]
    fn test_check_supported() {
        let filters = Filters::parse([("name__icontains", json!("a"))]).unwrap();
        let err = filters.check_supported(&[Lookup::Exact], "memory").unwrap_err();
        assert!(err.is_not_implemented());
    }
}
