//! Entities (cubes and views), their fields, and their relationships.

use serde::{Deserialize, Serialize};

use super::filter::FilterDef;
use super::types::{AggregationKind, Cardinality, EntityKind, RelationshipKind, ValueType};

fn default_public() -> bool {
    true
}

/// A named logical source: a cube or a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_public")]
    pub public: bool,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub measures: Vec<MeasureDef>,
    /// Declared relationships, in declaration order.
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    /// Member paths re-exported by a view (e.g. `Users.company`).
    #[serde(default)]
    pub includes: Vec<String>,
}

impl Entity {
    pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            public: true,
            dimensions: Vec::new(),
            measures: Vec::new(),
            relationships: Vec::new(),
            includes: Vec::new(),
        }
    }

    pub fn cube(name: impl Into<String>) -> Self {
        Self::new(name, EntityKind::Cube)
    }

    pub fn view(name: impl Into<String>) -> Self {
        Self::new(name, EntityKind::View)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn with_dimension(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.dimensions.push(Dimension::new(name, value_type));
        self
    }

    pub fn with_primary_key(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        let mut dim = Dimension::new(name, value_type);
        dim.primary_key = true;
        self.dimensions.push(dim);
        self
    }

    pub fn with_measure(mut self, measure: MeasureDef) -> Self {
        self.measures.push(measure);
        self
    }

    /// Declare a join to another entity.
    pub fn join(self, target: impl Into<String>, cardinality: Cardinality) -> Self {
        self.with_relationship(Relationship::join(target, cardinality))
    }

    /// Declare a join with an explicit join condition.
    pub fn join_on(
        self,
        target: impl Into<String>,
        cardinality: Cardinality,
        condition: impl Into<String>,
    ) -> Self {
        self.with_relationship(Relationship::join(target, cardinality).on(condition))
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Re-export a member of another entity (views).
    ///
    /// The include relationship to the path's root entity is added when the
    /// entity is registered.
    pub fn include(mut self, member_path: impl Into<String>) -> Self {
        self.includes.push(member_path.into());
        self
    }

    /// Path of the included member re-exported under `name`.
    pub fn included_path(&self, name: &str) -> Option<&str> {
        self.includes
            .iter()
            .map(String::as_str)
            .find(|path| path.rsplit('.').next() == Some(name))
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn measure(&self, name: &str) -> Option<&MeasureDef> {
        self.measures.iter().find(|m| m.name == name)
    }

    /// Look up a field by name. Dimensions shadow nothing: names are unique
    /// per entity (enforced at registration).
    pub fn field(&self, name: &str) -> Option<Field<'_>> {
        self.dimension(name)
            .map(Field::Dimension)
            .or_else(|| self.measure(name).map(Field::Measure))
    }

    pub fn is_view(&self) -> bool {
        self.kind == EntityKind::View
    }

    /// Names of all own fields, dimensions first, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.dimensions
            .iter()
            .map(|d| d.name.as_str())
            .chain(self.measures.iter().map(|m| m.name.as_str()))
    }
}

/// A scalar, non-aggregated field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default = "default_public")]
    pub public: bool,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            sql: None,
            primary_key: false,
            public: true,
        }
    }
}

/// A measure definition as authored.
///
/// `declared` is the author's `type:`; when present it is authoritative over
/// whatever could be inferred from `sql`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub declared: Option<AggregationKind>,
    #[serde(default)]
    pub filters: Vec<FilterDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_public")]
    pub public: bool,
}

impl MeasureDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: None,
            declared: None,
            filters: Vec::new(),
            description: None,
            public: true,
        }
    }

    /// `count(*)` measure.
    pub fn count(name: impl Into<String>) -> Self {
        Self::new(name).with_type(AggregationKind::Count)
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn with_type(mut self, kind: AggregationKind) -> Self {
        self.declared = Some(kind);
        self
    }

    pub fn with_filter(mut self, filter: FilterDef) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.public = false;
        self
    }
}

/// A field of an entity, borrowed from the registry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    Dimension(&'a Dimension),
    Measure(&'a MeasureDef),
}

impl<'a> Field<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            Field::Dimension(d) => &d.name,
            Field::Measure(m) => &m.name,
        }
    }

    pub fn is_measure(&self) -> bool {
        matches!(self, Field::Measure(_))
    }

    pub fn is_public(&self) -> bool {
        match self {
            Field::Dimension(d) => d.public,
            Field::Measure(m) => m.public,
        }
    }

    /// Owned description of the field's kind, as carried by references.
    pub fn member_kind(&self) -> MemberKind {
        match self {
            Field::Dimension(d) => MemberKind::Dimension {
                value_type: d.value_type,
            },
            Field::Measure(m) => MemberKind::Measure {
                declared: m.declared,
            },
        }
    }
}

/// Kind of the field a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemberKind {
    Dimension { value_type: ValueType },
    Measure { declared: Option<AggregationKind> },
}

impl MemberKind {
    pub fn is_measure(&self) -> bool {
        matches!(self, MemberKind::Measure { .. })
    }
}

/// A directed edge from the owning entity to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub target: String,
    #[serde(default)]
    pub kind: RelationshipKind,
    #[serde(default = "Relationship::default_cardinality")]
    pub cardinality: Cardinality,
    /// Join condition, if any.
    #[serde(default, rename = "sql", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Relationship {
    fn default_cardinality() -> Cardinality {
        Cardinality::ManyToOne
    }

    pub fn join(target: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            target: target.into(),
            kind: RelationshipKind::Join,
            cardinality,
            condition: None,
        }
    }

    /// A view including members of `target`; same grain, one-way.
    pub fn include(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind: RelationshipKind::Include,
            cardinality: Cardinality::OneToOne,
            condition: None,
        }
    }

    pub fn on(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}
