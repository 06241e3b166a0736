//! Context-specific schema views.

use crate::error::SchemaError;
use crate::schema::types::{DetailConfig, FieldDefinition, RelationshipDefinition, SchemaDefinition};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Usage scenario a view is shaped for. `Full` is the default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewContext {
    List,
    Form,
    Detail,
    Meta,
    Full,
}

impl ViewContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewContext::List => "list",
            ViewContext::Form => "form",
            ViewContext::Detail => "detail",
            ViewContext::Meta => "meta",
            ViewContext::Full => "full",
        }
    }
}

impl Default for ViewContext {
    fn default() -> Self {
        ViewContext::Full
    }
}

impl FromStr for ViewContext {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list" => Ok(ViewContext::List),
            "form" => Ok(ViewContext::Form),
            "detail" => Ok(ViewContext::Detail),
            "meta" => Ok(ViewContext::Meta),
            "full" | "" => Ok(ViewContext::Full),
            other => Err(SchemaError::Validation(format!(
                "unknown view context '{}'",
                other
            ))),
        }
    }
}

/// One field as exposed by a view. Which members are populated depends on
/// the context: list views carry display metadata only, form views carry
/// editing metadata and validation.
#[derive(Clone, Debug, Serialize)]
pub struct FieldView {
    #[serde(rename = "type")]
    pub field_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sortable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filterable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<crate::schema::types::ValidationRule>,
}

/// A context-shaped projection of a schema. Transient and cacheable.
#[derive(Clone, Debug, Serialize)]
pub struct SchemaView {
    pub model: String,
    pub table: String,
    pub context: ViewContext,
    pub primary_key: String,
    pub timestamps: bool,
    pub soft_delete: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, FieldView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<RelationshipDefinition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<DetailConfig>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub permissions: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
}

fn is_writable(f: &FieldDefinition) -> bool {
    !f.readonly && !f.auto_increment
}

fn display_view(f: &FieldDefinition) -> FieldView {
    FieldView {
        field_type: f.field_type.as_str(),
        sortable: Some(f.sortable),
        filterable: Some(f.filterable),
        searchable: Some(f.searchable),
        required: None,
        editable: None,
        default: None,
        validation: None,
    }
}

fn form_view(f: &FieldDefinition) -> FieldView {
    FieldView {
        field_type: f.field_type.as_str(),
        sortable: None,
        filterable: None,
        searchable: None,
        required: Some(f.required),
        editable: Some(true),
        default: f.default.clone(),
        validation: f.validation.clone(),
    }
}

fn detail_view(f: &FieldDefinition) -> FieldView {
    FieldView {
        field_type: f.field_type.as_str(),
        sortable: Some(f.sortable),
        filterable: Some(f.filterable),
        searchable: Some(f.searchable),
        required: Some(f.required),
        editable: Some(is_writable(f)),
        default: f.default.clone(),
        validation: f.validation.clone(),
    }
}

/// Derive the view of `schema` for `context`. Pure: same inputs, same view.
pub fn filter_for_context(schema: &SchemaDefinition, context: ViewContext) -> SchemaView {
    let mut view = SchemaView {
        model: schema.model.clone(),
        table: schema.table.clone(),
        context,
        primary_key: schema.primary_key.clone(),
        timestamps: schema.timestamps,
        soft_delete: schema.soft_delete,
        fields: BTreeMap::new(),
        relationships: Vec::new(),
        details: Vec::new(),
        permissions: BTreeMap::new(),
        actions: Vec::new(),
    };

    match context {
        ViewContext::List => {
            for (name, f) in &schema.fields {
                if f.listable {
                    view.fields.insert(name.clone(), display_view(f));
                }
            }
        }
        ViewContext::Form => {
            for (name, f) in &schema.fields {
                if is_writable(f) {
                    view.fields.insert(name.clone(), form_view(f));
                }
            }
        }
        ViewContext::Detail => {
            for (name, f) in &schema.fields {
                view.fields.insert(name.clone(), detail_view(f));
            }
            view.relationships = schema.relationships.clone();
            view.details = schema.details.clone();
        }
        ViewContext::Meta => {
            view.permissions = schema.permissions.clone();
            view.actions = schema.actions.clone();
        }
        ViewContext::Full => {
            for (name, f) in &schema.fields {
                view.fields.insert(name.clone(), detail_view(f));
            }
            view.relationships = schema.relationships.clone();
            view.details = schema.details.clone();
            view.permissions = schema.permissions.clone();
            view.actions = schema.actions.clone();
        }
    }

    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::store::validate;
    use serde_json::json;

    fn products() -> SchemaDefinition {
        validate(&json!({
            "model": "products",
            "table": "products",
            "fields": {
                "id": { "type": "integer", "auto_increment": true, "readonly": true, "sortable": true },
                "name": { "type": "string", "listable": true, "searchable": true, "required": true },
                "price": { "type": "decimal", "listable": true, "sortable": true, "filterable": true },
                "secret_cost": { "type": "decimal", "listable": false }
            },
            "relationships": [{
                "name": "orders", "type": "one_to_many", "related_model": "orders",
                "foreign_key": "product_id"
            }],
            "permissions": { "delete": "admin" },
            "actions": ["export"]
        }))
        .unwrap()
    }

    #[test]
    fn list_view_excludes_unlistable_fields() {
        let view = filter_for_context(&products(), ViewContext::List);
        let names: Vec<&str> = view.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["id", "name", "price"]);
        assert!(view.relationships.is_empty());
        for f in view.fields.values() {
            assert!(f.validation.is_none());
            assert!(f.editable.is_none());
        }
    }

    #[test]
    fn form_view_excludes_readonly_and_auto_fields() {
        let view = filter_for_context(&products(), ViewContext::Form);
        assert!(!view.fields.contains_key("id"));
        assert!(view.fields.contains_key("name"));
        assert!(view.fields.contains_key("secret_cost"));
        assert_eq!(view.fields["name"].required, Some(true));
    }

    #[test]
    fn detail_view_has_all_fields_and_relationships() {
        let view = filter_for_context(&products(), ViewContext::Detail);
        assert_eq!(view.fields.len(), 4);
        assert_eq!(view.relationships.len(), 1);
        assert_eq!(view.fields["id"].editable, Some(false));
        assert_eq!(view.fields["name"].editable, Some(true));
    }

    #[test]
    fn meta_view_has_no_field_bodies() {
        let view = filter_for_context(&products(), ViewContext::Meta);
        assert!(view.fields.is_empty());
        assert_eq!(view.permissions["delete"], json!("admin"));
        assert_eq!(view.actions, vec!["export"]);
    }

    #[test]
    fn full_view_carries_everything() {
        let view = filter_for_context(&products(), ViewContext::Full);
        assert_eq!(view.fields.len(), 4);
        assert_eq!(view.relationships.len(), 1);
        assert!(!view.permissions.is_empty());
    }

    #[test]
    fn context_parse() {
        assert_eq!("list".parse::<ViewContext>().unwrap(), ViewContext::List);
        assert_eq!("".parse::<ViewContext>().unwrap(), ViewContext::Full);
        assert!("grid".parse::<ViewContext>().is_err());
    }
}
