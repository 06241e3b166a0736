//! Raw schema document types matching the JSON model definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scalar type of a field. Closed set; anything else fails validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Decimal,
    Boolean,
    Date,
    Datetime,
    Text,
    Json,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Decimal => "decimal",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::Text => "text",
            FieldType::Json => "json",
        }
    }
}

/// Predicate shape a filterable field answers to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    #[default]
    Equals,
    Like,
    StartsWith,
    EndsWith,
    In,
    Between,
    GreaterThan,
    LessThan,
    NotEquals,
}

/// Per-field validation rules, applied before any SQL runs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default = "default_true")]
    pub listable: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
    #[serde(default)]
    pub filter_type: Option<FilterType>,
}

fn default_true() -> bool {
    true
}

/// Declared relationship. The `type` is kept as a raw string so an unknown
/// shape surfaces as UnsupportedRelationshipType at resolve time, not as a
/// deserialization failure.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub related_model: String,
    /// Table backing the related model; defaults to the model name.
    #[serde(default)]
    pub related_table: Option<String>,
    /// Column on the pivot (or related table for one_to_many) referencing the parent.
    #[serde(default)]
    pub foreign_key: Option<String>,
    /// Column on the pivot referencing the related row.
    #[serde(default)]
    pub related_key: Option<String>,
    #[serde(default)]
    pub pivot_table: Option<String>,
    /// Second pivot (intermediate <-> related) for the through shape.
    #[serde(default)]
    pub through_pivot_table: Option<String>,
    /// Column on the first pivot referencing the intermediate row.
    #[serde(default)]
    pub through_foreign_key: Option<String>,
    /// Column on the second pivot referencing the intermediate row.
    #[serde(default)]
    pub through_related_key: Option<String>,
}

pub const ONE_TO_MANY: &str = "one_to_many";
pub const MANY_TO_MANY: &str = "many_to_many";
pub const MANY_TO_MANY_THROUGH: &str = "many_to_many_through";

/// Child-listing block shown on a detail page (a one_to_many projection).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetailConfig {
    pub relation: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Schema-declared default sort, used when a request carries none.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DefaultSort {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// A validated schema document for one logical model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub model: String,
    pub table: String,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default = "default_pk")]
    pub primary_key: String,
    #[serde(default = "default_true")]
    pub timestamps: bool,
    #[serde(default)]
    pub soft_delete: bool,
    pub fields: BTreeMap<String, FieldDefinition>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDefinition>,
    #[serde(default)]
    pub details: Vec<DetailConfig>,
    #[serde(default)]
    pub default_sort: Option<DefaultSort>,
    #[serde(default)]
    pub permissions: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub actions: Vec<String>,
}

fn default_pk() -> String {
    "id".into()
}

impl SchemaDefinition {
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDefinition> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

impl RelationshipDefinition {
    pub fn related_table(&self) -> &str {
        self.related_table.as_deref().unwrap_or(&self.related_model)
    }
}
