//! Field metadata and the merge-lifecycle classifier.
//!
//! Each declared field carries zero or more [`FieldTag`]s. The classifier
//! partitions a model's fields into the four lifecycle buckets used when
//! building `MERGE` statements.

/// A behavioral tag attached to a field with `#[neontology(...)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldTag {
    /// Written only when the merge creates the entity.
    SetOnCreate,
    /// Written only when the merge matches an existing entity.
    SetOnMatch,
    /// Never written by create or merge (server-assigned or identity-like).
    NeverSet,
    /// Relationships only: part of the edge identity used by `MERGE`.
    MergeOn,
}

/// Static description of one declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// The Rust field name.
    pub name: &'static str,
    /// The serialized key, i.e. the serde alias when one is declared.
    pub wire_name: &'static str,
    /// A readable rendering of the field's Rust type.
    pub type_repr: &'static str,
    /// Whether the field is an `Option`.
    pub optional: bool,
    /// Whether a value must be supplied when constructing from a record.
    pub required: bool,
    pub tags: &'static [FieldTag],
}

impl FieldSpec {
    pub fn has_tag(&self, tag: FieldTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// The lifecycle partition of a model's wire names.
///
/// `always_set`, `set_on_create`, `set_on_match` and `never_set` are
/// disjoint and together cover every declared field except the
/// relationship endpoints `source` and `target`. `merge_on` lists the
/// relationship identity keys and is a subset of `always_set`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldUsage {
    pub always_set: Vec<String>,
    pub set_on_create: Vec<String>,
    pub set_on_match: Vec<String>,
    pub never_set: Vec<String>,
    pub merge_on: Vec<String>,
}

impl FieldUsage {
    /// Classify a list of field specs.
    ///
    /// A field carrying more than one lifecycle role is assigned by the
    /// precedence `never_set`, then `set_on_create`, then `set_on_match`, and a
    /// warning is logged. The derive macros reject such fields at compile time.
    pub fn classify(fields: &[FieldSpec]) -> Self {
        let mut usage = FieldUsage::default();

        for field in fields {
            let name = field.wire_name;
            if name == "source" || name == "target" {
                continue;
            }

            let roles = [FieldTag::NeverSet, FieldTag::SetOnCreate, FieldTag::SetOnMatch]
                .into_iter()
                .filter(|t| field.has_tag(*t))
                .collect::<Vec<_>>();

            if roles.len() > 1 {
                tracing::warn!(field = name, ?roles, "field carries conflicting lifecycle tags");
            }

            match roles.first() {
                Some(FieldTag::NeverSet) => usage.never_set.push(name.to_owned()),
                Some(FieldTag::SetOnCreate) => usage.set_on_create.push(name.to_owned()),
                Some(FieldTag::SetOnMatch) => usage.set_on_match.push(name.to_owned()),
                _ => {
                    usage.always_set.push(name.to_owned());
                    if field.has_tag(FieldTag::MergeOn) {
                        usage.merge_on.push(name.to_owned());
                    }
                }
            }
        }

        usage
    }

    /// Every wire name the classifier saw.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.always_set
            .iter()
            .chain(&self.set_on_create)
            .chain(&self.set_on_match)
            .chain(&self.never_set)
            .map(String::as_str)
    }
}
