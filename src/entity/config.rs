//! Runtime entity configuration derived from a validated schema.

use crate::entity::registry::EntityRegistry;
use crate::error::EngineError;
use crate::schema::types::{
    DefaultSort, FieldType, FilterType, RelationshipDefinition, SchemaDefinition, ValidationRule,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Column used for soft deletes when a schema declares `soft_delete`.
pub const SOFT_DELETE_COLUMN: &str = "deleted_at";

/// Everything the query engine and entity services need about one table,
/// derived once per schema and shared through the process-wide registry.
#[derive(Clone, Debug)]
pub struct RuntimeEntityConfig {
    pub model: String,
    pub table: String,
    pub connection: Option<String>,
    pub primary_key: String,
    /// All field names, in schema order; drives select-list layout.
    pub field_names: Vec<String>,
    /// Fields with `auto_increment=false` and `readonly=false`, in schema order.
    pub writable_fields: Vec<String>,
    pub readonly_fields: HashSet<String>,
    /// Field name -> declared scalar type; drives value coercion and binds.
    pub casts: HashMap<String, FieldType>,
    pub filter_types: HashMap<String, FilterType>,
    pub sortable_fields: Vec<String>,
    pub filterable_fields: Vec<String>,
    pub searchable_fields: Vec<String>,
    pub listable_fields: Vec<String>,
    pub validation: HashMap<String, ValidationRule>,
    pub default_sort: Option<DefaultSort>,
    pub soft_delete_column: Option<String>,
    pub timestamps: bool,
    pub relationships: Vec<RelationshipDefinition>,
}

impl RuntimeEntityConfig {
    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.casts.get(field).copied()
    }

    pub fn filter_type(&self, field: &str) -> FilterType {
        self.filter_types.get(field).copied().unwrap_or_default()
    }

    pub fn is_writable(&self, field: &str) -> bool {
        self.writable_fields.iter().any(|f| f == field)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDefinition> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Bare config for a table whose model was never configured. Rows can
    /// still be listed through a relationship scope; sorting and filtering
    /// stay unavailable until the model is published.
    pub fn minimal(table: &str, primary_key: &str) -> Self {
        RuntimeEntityConfig {
            model: table.to_string(),
            table: table.to_string(),
            connection: None,
            primary_key: primary_key.to_string(),
            field_names: Vec::new(),
            writable_fields: Vec::new(),
            readonly_fields: HashSet::new(),
            casts: HashMap::new(),
            filter_types: HashMap::new(),
            sortable_fields: Vec::new(),
            filterable_fields: Vec::new(),
            searchable_fields: Vec::new(),
            listable_fields: Vec::new(),
            validation: HashMap::new(),
            default_sort: None,
            soft_delete_column: None,
            timestamps: false,
            relationships: Vec::new(),
        }
    }
}

pub struct EntityConfigurator;

impl EntityConfigurator {
    /// Derive the runtime config for `schema` and publish it to the global
    /// table registry, so rows materialized through any query path resolve
    /// the same configuration as explicitly configured ones.
    pub fn configure(schema: &SchemaDefinition) -> Arc<RuntimeEntityConfig> {
        let mut writable = Vec::new();
        let mut readonly = HashSet::new();
        let mut casts = HashMap::new();
        let mut filter_types = HashMap::new();
        let mut sortable = Vec::new();
        let mut filterable = Vec::new();
        let mut searchable = Vec::new();
        let mut listable = Vec::new();
        let mut validation = HashMap::new();

        let field_names: Vec<String> = schema.fields.keys().cloned().collect();
        for (name, f) in &schema.fields {
            casts.insert(name.clone(), f.field_type);
            if f.auto_increment || f.readonly || name == &schema.primary_key {
                readonly.insert(name.clone());
            } else {
                writable.push(name.clone());
            }
            if f.sortable {
                sortable.push(name.clone());
            }
            if f.filterable {
                filterable.push(name.clone());
                filter_types.insert(name.clone(), f.filter_type.unwrap_or_default());
            }
            if f.searchable {
                searchable.push(name.clone());
            }
            if f.listable {
                listable.push(name.clone());
            }
            let mut rule = f.validation.clone().unwrap_or_default();
            if f.required {
                rule.required = Some(true);
            }
            validation.insert(name.clone(), rule);
        }

        let config = Arc::new(RuntimeEntityConfig {
            model: schema.model.clone(),
            table: schema.table.clone(),
            connection: schema.connection.clone(),
            primary_key: schema.primary_key.clone(),
            field_names,
            writable_fields: writable,
            readonly_fields: readonly,
            casts,
            filter_types,
            sortable_fields: sortable,
            filterable_fields: filterable,
            searchable_fields: searchable,
            listable_fields: listable,
            validation,
            default_sort: schema.default_sort.clone(),
            soft_delete_column: schema.soft_delete.then(|| SOFT_DELETE_COLUMN.to_string()),
            timestamps: schema.timestamps,
            relationships: schema.relationships.clone(),
        });
        // republishing must not leave relations resolved from the old schema
        crate::relation::spec::RelationRegistry::global().remove_table(&config.table);
        EntityRegistry::global().publish(Arc::clone(&config));
        tracing::debug!(model = %config.model, table = %config.table, "entity configured");
        config
    }
}

/// Coerce a JSON value to a field's declared type. String inputs are parsed
/// where the transport hands query-string values through untyped.
pub fn coerce_value(field: &str, ty: FieldType, value: &Value) -> Result<Value, EngineError> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let mismatch = |expected: &'static str| EngineError::FilterValue {
        field: field.to_string(),
        expected,
        got: value.to_string(),
    };
    match ty {
        FieldType::String | FieldType::Text => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(mismatch("string")),
        },
        FieldType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .map_err(|_| mismatch("integer")),
            _ => Err(mismatch("integer")),
        },
        FieldType::Float => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| mismatch("float")),
            _ => Err(mismatch("float")),
        },
        // numeric columns bind as text with a ::numeric cast, keeping precision
        FieldType::Decimal => match value {
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::String(s) if s.trim().parse::<f64>().is_ok() => {
                Ok(Value::String(s.trim().to_string()))
            }
            _ => Err(mismatch("decimal")),
        },
        FieldType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(mismatch("boolean")),
        },
        FieldType::Date => match value {
            Value::String(s) => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|_| value.clone())
                .map_err(|_| mismatch("date")),
            _ => Err(mismatch("date")),
        },
        FieldType::Datetime => match value {
            Value::String(s) => {
                let ok = chrono::DateTime::parse_from_rfc3339(s).is_ok()
                    || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok();
                if ok {
                    Ok(value.clone())
                } else {
                    Err(mismatch("datetime"))
                }
            }
            _ => Err(mismatch("datetime")),
        },
        FieldType::Json => Ok(value.clone()),
    }
}

/// SQL cast appended to a bind placeholder so text-bound values compare
/// against typed columns (numeric, date, timestamptz).
pub fn sql_cast(ty: FieldType) -> Option<&'static str> {
    match ty {
        FieldType::Decimal => Some("numeric"),
        FieldType::Date => Some("date"),
        FieldType::Datetime => Some("timestamptz"),
        _ => None,
    }
}
