//! Builds the listing SQL: scope joins, filters, search, sort, pagination.
//!
//! Invariant: every column reference in predicates, sort, or search is
//! qualified with its owning table. A bare identifier works until some other
//! subsystem layers a join with the same column name onto the query, so the
//! builder never emits one.

use crate::entity::config::{coerce_value, sql_cast, RuntimeEntityConfig};
use crate::error::EngineError;
use crate::query::request::{FilterClause, QueryRequest, SortField};
use crate::relation::spec::{JoinFragment, RelationshipSpec, ResolvedRelation};
use crate::schema::types::{FieldType, FilterType, SortDirection};
use crate::sql::ident::{qualified, quoted, QueryBuf};
use serde_json::Value;

/// A listing against one target table, optionally scoped to a relationship
/// of a parent row, with room for joins injected by other subsystems.
pub struct ListQuery<'a> {
    target: &'a RuntimeEntityConfig,
    scope: Option<(&'a ResolvedRelation, Value)>,
    extra_joins: Vec<JoinFragment>,
}

impl<'a> ListQuery<'a> {
    pub fn new(target: &'a RuntimeEntityConfig) -> Self {
        ListQuery {
            target,
            scope: None,
            extra_joins: Vec::new(),
        }
    }

    pub fn scoped(mut self, relation: &'a ResolvedRelation, parent_id: Value) -> Self {
        self.scope = Some((relation, parent_id));
        self
    }

    /// Layer an unrelated join onto the query (audit, tenancy, ...). The
    /// generated SQL must stay unambiguous regardless.
    pub fn with_join(mut self, join: JoinFragment) -> Self {
        self.extra_joins.push(join);
        self
    }

    /// The page query: select list, joins, predicates, order, limit/offset.
    pub fn select_sql(&self, request: &QueryRequest) -> Result<QueryBuf, EngineError> {
        let mut q = QueryBuf::new();
        let mut parts = Vec::new();
        self.push_scope(&mut q, &mut parts);
        self.push_soft_delete(&mut parts);
        self.push_filters(&mut q, &mut parts, &request.filters)?;
        self.push_search(&mut q, &mut parts, request.search.as_deref());

        let where_clause = render_where(&parts);
        let distinct = self.needs_distinct();
        let order_clause = self.order_by(request, distinct)?;
        q.sql = format!(
            "SELECT {}{} FROM {}{}{} ORDER BY {} LIMIT {} OFFSET {}",
            if distinct { "DISTINCT " } else { "" },
            self.select_columns(),
            quoted(&self.target.table),
            self.render_joins(),
            where_clause,
            order_clause,
            request.effective_page_size(),
            request.offset(),
        );
        Ok(q)
    }

    /// COUNT(*) over the scope; with `filtered` the filter and search
    /// predicates apply as well.
    pub fn count_sql(&self, request: &QueryRequest, filtered: bool) -> Result<QueryBuf, EngineError> {
        let mut q = QueryBuf::new();
        let mut parts = Vec::new();
        self.push_scope(&mut q, &mut parts);
        self.push_soft_delete(&mut parts);
        if filtered {
            self.push_filters(&mut q, &mut parts, &request.filters)?;
            self.push_search(&mut q, &mut parts, request.search.as_deref());
        }
        let counted = if self.needs_distinct() {
            format!(
                "DISTINCT {}",
                qualified(&self.target.table, &self.target.primary_key)
            )
        } else {
            "*".to_string()
        };
        q.sql = format!(
            "SELECT COUNT({}) FROM {}{}{}",
            counted,
            quoted(&self.target.table),
            self.render_joins(),
            render_where(&parts),
        );
        Ok(q)
    }

    fn select_columns(&self) -> String {
        select_columns(self.target)
    }

    /// A through scope joins two pivots, so one related row is reachable
    /// once per intermediate path; collapse the duplicates.
    fn needs_distinct(&self) -> bool {
        matches!(
            &self.scope,
            Some((rel, _)) if matches!(rel.spec, RelationshipSpec::ManyToManyThrough { .. })
        )
    }

    fn render_joins(&self) -> String {
        let mut out = String::new();
        if let Some((relation, _)) = &self.scope {
            for j in relation.joins() {
                out.push(' ');
                out.push_str(&j.render());
            }
        }
        for j in &self.extra_joins {
            out.push(' ');
            out.push_str(&j.render());
        }
        out
    }

    fn push_scope(&self, q: &mut QueryBuf, parts: &mut Vec<String>) {
        if let Some((relation, parent_id)) = &self.scope {
            let (table, column) = relation.scope_column();
            let ph = q.placeholder(parent_id.clone(), None);
            parts.push(format!("{} = {}", qualified(table, column), ph));
        }
    }

    fn push_soft_delete(&self, parts: &mut Vec<String>) {
        if let Some(col) = &self.target.soft_delete_column {
            parts.push(format!("{} IS NULL", qualified(&self.target.table, col)));
        }
    }

    fn push_filters(
        &self,
        q: &mut QueryBuf,
        parts: &mut Vec<String>,
        filters: &[FilterClause],
    ) -> Result<(), EngineError> {
        for clause in filters {
            if let Some(p) = self.filter_predicate(q, clause)? {
                parts.push(p);
            }
        }
        Ok(())
    }

    fn filter_predicate(
        &self,
        q: &mut QueryBuf,
        clause: &FilterClause,
    ) -> Result<Option<String>, EngineError> {
        let field = clause.field.as_str();
        // fields the schema never declared filterable are ignored, not errors
        let Some(ty) = self.target.field_type(field) else {
            return Ok(None);
        };
        if !self.target.filterable_fields.iter().any(|f| f == field) {
            return Ok(None);
        }
        let col = qualified(&self.target.table, field);
        let cast = sql_cast(ty);
        let predicate = match self.target.filter_type(field) {
            FilterType::Equals => {
                let v = coerce_value(field, ty, &clause.value)?;
                format!("{} = {}", col, q.placeholder(v, cast))
            }
            FilterType::NotEquals => {
                let v = coerce_value(field, ty, &clause.value)?;
                format!("{} <> {}", col, q.placeholder(v, cast))
            }
            FilterType::GreaterThan => {
                let v = coerce_value(field, ty, &clause.value)?;
                format!("{} > {}", col, q.placeholder(v, cast))
            }
            FilterType::LessThan => {
                let v = coerce_value(field, ty, &clause.value)?;
                format!("{} < {}", col, q.placeholder(v, cast))
            }
            FilterType::Like => self.pattern_predicate(q, &col, field, &clause.value, "%", "%")?,
            FilterType::StartsWith => {
                self.pattern_predicate(q, &col, field, &clause.value, "", "%")?
            }
            FilterType::EndsWith => {
                self.pattern_predicate(q, &col, field, &clause.value, "%", "")?
            }
            FilterType::In => {
                let Value::Array(items) = &clause.value else {
                    return Err(EngineError::FilterValue {
                        field: field.to_string(),
                        expected: "array",
                        got: clause.value.to_string(),
                    });
                };
                if items.is_empty() {
                    "1 = 0".to_string()
                } else {
                    let mut placeholders = Vec::with_capacity(items.len());
                    for item in items {
                        let v = coerce_value(field, ty, item)?;
                        placeholders.push(q.placeholder(v, cast));
                    }
                    format!("{} IN ({})", col, placeholders.join(", "))
                }
            }
            FilterType::Between => {
                let bounds = clause
                    .value
                    .as_array()
                    .filter(|a| a.len() == 2)
                    .ok_or_else(|| EngineError::FilterValue {
                        field: field.to_string(),
                        expected: "array of two bounds",
                        got: clause.value.to_string(),
                    })?;
                let low = coerce_value(field, ty, &bounds[0])?;
                let high = coerce_value(field, ty, &bounds[1])?;
                format!(
                    "{} BETWEEN {} AND {}",
                    col,
                    q.placeholder(low, cast),
                    q.placeholder(high, cast)
                )
            }
        };
        Ok(Some(predicate))
    }

    fn pattern_predicate(
        &self,
        q: &mut QueryBuf,
        col: &str,
        field: &str,
        value: &Value,
        prefix: &str,
        suffix: &str,
    ) -> Result<String, EngineError> {
        let s = value.as_str().ok_or_else(|| EngineError::FilterValue {
            field: field.to_string(),
            expected: "string",
            got: value.to_string(),
        })?;
        let pattern = format!("{}{}{}", prefix, escape_like(s), suffix);
        Ok(format!(
            "{} ILIKE {}",
            col,
            q.placeholder(Value::String(pattern), None)
        ))
    }

    fn push_search(&self, q: &mut QueryBuf, parts: &mut Vec<String>, term: Option<&str>) {
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
            return;
        };
        // no searchable fields configured: the term is ignored, not an error
        if self.target.searchable_fields.is_empty() {
            return;
        }
        let pattern = format!("%{}%", escape_like(term));
        let ph = q.placeholder(Value::String(pattern), None);
        let ors: Vec<String> = self
            .target
            .searchable_fields
            .iter()
            .map(|f| format!("{} ILIKE {}", qualified(&self.target.table, f), ph))
            .collect();
        parts.push(format!("({})", ors.join(" OR ")));
    }

    fn order_by(&self, request: &QueryRequest, distinct: bool) -> Result<String, EngineError> {
        let mut keys: Vec<(String, SortDirection)> = Vec::new();
        if request.sort.is_empty() {
            match &self.target.default_sort {
                Some(d) => keys.push((d.field.clone(), d.direction)),
                None => keys.push((self.target.primary_key.clone(), SortDirection::Asc)),
            }
        } else {
            for SortField { field, direction } in &request.sort {
                let known = self.target.casts.contains_key(field)
                    || *field == self.target.primary_key;
                let sortable = self.target.sortable_fields.iter().any(|f| f == field)
                    || *field == self.target.primary_key;
                if !known || !sortable {
                    return Err(EngineError::SortField(field.clone()));
                }
                keys.push((field.clone(), *direction));
            }
        }
        // primary-key tie-break keeps pagination stable
        if !keys.iter().any(|(f, _)| *f == self.target.primary_key) {
            keys.push((self.target.primary_key.clone(), SortDirection::Asc));
        }
        Ok(keys
            .iter()
            .map(|(f, d)| {
                let col = qualified(&self.target.table, f);
                // under DISTINCT the sort key must match a select-list
                // expression; decimals are selected as ::text
                if distinct && self.target.field_type(f) == Some(FieldType::Decimal) {
                    format!("{}::text {}", col, d.as_sql())
                } else {
                    format!("{} {}", col, d.as_sql())
                }
            })
            .collect::<Vec<_>>()
            .join(", "))
    }
}

/// Qualified select list for a config; numeric columns come back as text so
/// rows stay JSON-friendly. Also used for RETURNING lists.
pub fn select_columns(config: &RuntimeEntityConfig) -> String {
    if config.field_names.is_empty() {
        return format!("{}.*", quoted(&config.table));
    }
    config
        .field_names
        .iter()
        .map(|name| {
            let col = qualified(&config.table, name);
            if config.field_type(name) == Some(FieldType::Decimal) {
                format!("{}::text AS {}", col, quoted(name))
            } else {
                col
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_where(parts: &[String]) -> String {
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// Escape LIKE wildcards in user input (backslash is the PG default escape).
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// SELECT 1 probe for a parent row, honoring the parent's soft delete.
pub fn exists_sql(config: &RuntimeEntityConfig, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut parts = vec![format!(
        "{} = {}",
        qualified(&config.table, &config.primary_key),
        q.placeholder(id.clone(), None)
    )];
    if let Some(col) = &config.soft_delete_column {
        parts.push(format!("{} IS NULL", qualified(&config.table, col)));
    }
    q.sql = format!(
        "SELECT 1 FROM {} WHERE {} LIMIT 1",
        quoted(&config.table),
        parts.join(" AND ")
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::config::EntityConfigurator;
    use crate::relation::spec::RelationshipSpec;
    use crate::schema::store::validate;
    use serde_json::json;
    use std::sync::Arc;

    fn products() -> Arc<RuntimeEntityConfig> {
        EntityConfigurator::configure(
            &validate(&json!({
                "model": "products",
                "table": "products",
                "fields": {
                    "id": { "type": "integer", "auto_increment": true, "sortable": true },
                    "name": { "type": "string", "searchable": true, "filterable": true,
                              "filter_type": "like" },
                    "price": { "type": "decimal", "sortable": true, "filterable": true,
                               "filter_type": "between" },
                    "secret_cost": { "type": "decimal", "listable": false }
                }
            }))
            .unwrap(),
        )
    }

    fn roles_relation() -> ResolvedRelation {
        ResolvedRelation {
            name: "roles".into(),
            parent_table: "users".into(),
            parent_pk: "id".into(),
            spec: RelationshipSpec::ManyToMany {
                related_table: "roles".into(),
                related_pk: "id".into(),
                pivot_table: "role_users".into(),
                foreign_key: "user_id".into(),
                related_key: "role_id".into(),
            },
        }
    }

    #[test]
    fn plain_listing_is_fully_qualified() {
        let config = products();
        let q = ListQuery::new(&config)
            .select_sql(&QueryRequest::default())
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT \"products\".\"id\", \"products\".\"name\", \"products\".\"price\"::text AS \"price\", \
\"products\".\"secret_cost\"::text AS \"secret_cost\" FROM \"products\" \
ORDER BY \"products\".\"id\" ASC LIMIT 25 OFFSET 0"
        );
        assert!(q.params.is_empty());
    }

    #[test]
    fn like_filter_and_desc_sort_with_pk_tiebreak() {
        let config = products();
        let request = QueryRequest {
            page: 0,
            page_size: Some(10),
            sort: vec![SortField {
                field: "price".into(),
                direction: SortDirection::Desc,
            }],
            filters: vec![FilterClause {
                field: "name".into(),
                value: json!("wid"),
            }],
            search: None,
        };
        let q = ListQuery::new(&config).select_sql(&request).unwrap();
        assert!(q.sql.contains("WHERE \"products\".\"name\" ILIKE $1"));
        assert!(q
            .sql
            .contains("ORDER BY \"products\".\"price\" DESC, \"products\".\"id\" ASC"));
        assert!(q.sql.ends_with("LIMIT 10 OFFSET 0"));
        assert_eq!(q.params, vec![json!("%wid%")]);
    }

    #[test]
    fn between_filter_casts_numeric_bounds() {
        let config = products();
        let request = QueryRequest {
            filters: vec![FilterClause {
                field: "price".into(),
                value: json!([10, "99.5"]),
            }],
            ..Default::default()
        };
        let q = ListQuery::new(&config).select_sql(&request).unwrap();
        assert!(q
            .sql
            .contains("\"products\".\"price\" BETWEEN $1::numeric AND $2::numeric"));
        assert_eq!(q.params, vec![json!("10"), json!("99.5")]);
    }

    fn inventory() -> Arc<RuntimeEntityConfig> {
        EntityConfigurator::configure(
            &validate(&json!({
                "model": "inventory",
                "table": "inventory",
                "fields": {
                    "id": { "type": "integer", "auto_increment": true },
                    "status": { "type": "string", "filterable": true, "filter_type": "in" },
                    "sku": { "type": "string", "filterable": true, "filter_type": "starts_with" },
                    "origin": { "type": "string", "filterable": true, "filter_type": "ends_with" },
                    "qty": { "type": "integer", "filterable": true, "filter_type": "greater_than" },
                    "weight": { "type": "float", "filterable": true, "filter_type": "less_than" },
                    "state": { "type": "string", "filterable": true, "filter_type": "not_equals" }
                }
            }))
            .unwrap(),
        )
    }

    fn filter_on(field: &str, value: serde_json::Value) -> QueryRequest {
        QueryRequest {
            filters: vec![FilterClause {
                field: field.into(),
                value,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn in_filter_expands_one_placeholder_per_item() {
        let config = inventory();
        let q = ListQuery::new(&config)
            .select_sql(&filter_on("status", json!(["open", "held"])))
            .unwrap();
        assert!(q.sql.contains("\"inventory\".\"status\" IN ($1, $2)"));
        assert_eq!(q.params, vec![json!("open"), json!("held")]);
    }

    #[test]
    fn empty_in_filter_matches_nothing() {
        let config = inventory();
        let q = ListQuery::new(&config)
            .select_sql(&filter_on("status", json!([])))
            .unwrap();
        assert!(q.sql.contains("WHERE 1 = 0"));
        assert!(q.params.is_empty());
    }

    #[test]
    fn starts_with_filter_anchors_the_prefix() {
        let config = inventory();
        let q = ListQuery::new(&config)
            .select_sql(&filter_on("sku", json!("AB")))
            .unwrap();
        assert!(q.sql.contains("\"inventory\".\"sku\" ILIKE $1"));
        assert_eq!(q.params, vec![json!("AB%")]);
    }

    #[test]
    fn ends_with_filter_anchors_the_suffix() {
        let config = inventory();
        let q = ListQuery::new(&config)
            .select_sql(&filter_on("origin", json!("-EU")))
            .unwrap();
        assert!(q.sql.contains("\"inventory\".\"origin\" ILIKE $1"));
        assert_eq!(q.params, vec![json!("%-EU")]);
    }

    #[test]
    fn greater_than_filter_coerces_the_bound() {
        let config = inventory();
        let q = ListQuery::new(&config)
            .select_sql(&filter_on("qty", json!("5")))
            .unwrap();
        assert!(q.sql.contains("\"inventory\".\"qty\" > $1"));
        assert_eq!(q.params, vec![json!(5)]);
    }

    #[test]
    fn less_than_filter_compares_below_the_bound() {
        let config = inventory();
        let q = ListQuery::new(&config)
            .select_sql(&filter_on("weight", json!(2.5)))
            .unwrap();
        assert!(q.sql.contains("\"inventory\".\"weight\" < $1"));
        assert_eq!(q.params, vec![json!(2.5)]);
    }

    #[test]
    fn not_equals_filter_excludes_the_value() {
        let config = inventory();
        let q = ListQuery::new(&config)
            .select_sql(&filter_on("state", json!("archived")))
            .unwrap();
        assert!(q.sql.contains("\"inventory\".\"state\" <> $1"));
        assert_eq!(q.params, vec![json!("archived")]);
    }

    #[test]
    fn bad_filter_value_is_rejected_before_sql_runs() {
        let config = products();
        let request = QueryRequest {
            filters: vec![FilterClause {
                field: "price".into(),
                value: json!(["10"]),
            }],
            ..Default::default()
        };
        let err = ListQuery::new(&config).select_sql(&request).unwrap_err();
        assert!(matches!(err, EngineError::FilterValue { .. }));
    }

    #[test]
    fn unknown_filter_field_is_ignored() {
        let config = products();
        let request = QueryRequest {
            filters: vec![FilterClause {
                field: "nope".into(),
                value: json!(1),
            }],
            ..Default::default()
        };
        let q = ListQuery::new(&config).select_sql(&request).unwrap();
        assert!(!q.sql.contains("WHERE"));
    }

    #[test]
    fn unknown_sort_field_errors() {
        let config = products();
        let request = QueryRequest {
            sort: vec![SortField {
                field: "secret_cost".into(),
                direction: SortDirection::Asc,
            }],
            ..Default::default()
        };
        let err = ListQuery::new(&config).select_sql(&request).unwrap_err();
        assert!(matches!(err, EngineError::SortField(_)));
    }

    #[test]
    fn search_ors_searchable_fields_and_escapes_wildcards() {
        let config = products();
        let request = QueryRequest {
            search: Some("50%_off".into()),
            ..Default::default()
        };
        let q = ListQuery::new(&config).select_sql(&request).unwrap();
        assert!(q.sql.contains("(\"products\".\"name\" ILIKE $1)"));
        assert_eq!(q.params, vec![json!("%50\\%\\_off%")]);
    }

    #[test]
    fn search_without_searchable_fields_is_ignored() {
        let config = Arc::new(RuntimeEntityConfig::minimal("audit_log", "id"));
        let request = QueryRequest {
            search: Some("anything".into()),
            ..Default::default()
        };
        let q = ListQuery::new(&config).select_sql(&request).unwrap();
        assert!(!q.sql.contains("ILIKE"));
    }

    #[test]
    fn relationship_scope_joins_before_predicates() {
        let config = Arc::new(RuntimeEntityConfig::minimal("roles", "id"));
        let relation = roles_relation();
        let q = ListQuery::new(&config)
            .scoped(&relation, json!(5))
            .select_sql(&QueryRequest::default())
            .unwrap();
        assert_eq!(
            q.sql,
            "SELECT \"roles\".* FROM \"roles\" \
JOIN \"role_users\" ON \"roles\".\"id\" = \"role_users\".\"role_id\" \
WHERE \"role_users\".\"user_id\" = $1 \
ORDER BY \"roles\".\"id\" ASC LIMIT 25 OFFSET 0"
        );
        assert_eq!(q.params, vec![json!(5)]);
    }

    #[test]
    fn through_scope_collapses_multi_path_duplicates() {
        let config = Arc::new(RuntimeEntityConfig::minimal("permissions", "id"));
        let relation = ResolvedRelation {
            name: "permissions".into(),
            parent_table: "users".into(),
            parent_pk: "id".into(),
            spec: RelationshipSpec::ManyToManyThrough {
                related_table: "permissions".into(),
                related_pk: "id".into(),
                pivot_table: "role_users".into(),
                foreign_key: "user_id".into(),
                through_foreign_key: "role_id".into(),
                through_pivot_table: "permission_roles".into(),
                through_related_key: "role_id".into(),
                related_key: "permission_id".into(),
            },
        };
        let request = QueryRequest::default();
        let page = ListQuery::new(&config)
            .scoped(&relation, json!(5))
            .select_sql(&request)
            .unwrap();
        assert!(page.sql.starts_with("SELECT DISTINCT \"permissions\".*"));
        let count = ListQuery::new(&config)
            .scoped(&relation, json!(5))
            .count_sql(&request, false)
            .unwrap();
        assert!(count
            .sql
            .starts_with("SELECT COUNT(DISTINCT \"permissions\".\"id\") FROM"));
    }

    #[test]
    fn injected_unrelated_join_keeps_columns_unambiguous() {
        let config = products();
        let request = QueryRequest {
            filters: vec![FilterClause {
                field: "name".into(),
                value: json!("wid"),
            }],
            sort: vec![SortField {
                field: "price".into(),
                direction: SortDirection::Desc,
            }],
            search: Some("wid".into()),
            ..Default::default()
        };
        let audit = JoinFragment {
            table: "audit_entries".into(),
            on_left: ("products".into(), "id".into()),
            on_right: ("audit_entries".into(), "name".into()),
        };
        let q = ListQuery::new(&config)
            .with_join(audit)
            .select_sql(&request)
            .unwrap();
        assert!(q
            .sql
            .contains("JOIN \"audit_entries\" ON \"products\".\"id\" = \"audit_entries\".\"name\""));
        // every products column that appears is table-qualified
        for col in ["name", "price", "id"] {
            assert!(!q.sql.contains(&format!(" \"{}\"", col)) || q.sql.contains(&format!("\"products\".\"{}\"", col)));
        }
        assert!(q.sql.contains("\"products\".\"name\" ILIKE"));
        assert!(q.sql.contains("ORDER BY \"products\".\"price\" DESC, \"products\".\"id\" ASC"));
    }

    #[test]
    fn soft_delete_predicate_applies_to_counts_and_pages() {
        let config = EntityConfigurator::configure(
            &validate(&json!({
                "model": "soft_items",
                "table": "soft_items",
                "soft_delete": true,
                "fields": { "id": { "type": "integer", "auto_increment": true } }
            }))
            .unwrap(),
        );
        let request = QueryRequest::default();
        let page = ListQuery::new(&config).select_sql(&request).unwrap();
        let total = ListQuery::new(&config).count_sql(&request, false).unwrap();
        assert!(page.sql.contains("\"soft_items\".\"deleted_at\" IS NULL"));
        assert!(total.sql.contains("\"soft_items\".\"deleted_at\" IS NULL"));
    }

    #[test]
    fn total_count_excludes_filters_filtered_count_includes_them() {
        let config = products();
        let request = QueryRequest {
            filters: vec![FilterClause {
                field: "name".into(),
                value: json!("wid"),
            }],
            ..Default::default()
        };
        let total = ListQuery::new(&config).count_sql(&request, false).unwrap();
        let filtered = ListQuery::new(&config).count_sql(&request, true).unwrap();
        assert_eq!(total.sql, "SELECT COUNT(*) FROM \"products\"");
        assert_eq!(
            filtered.sql,
            "SELECT COUNT(*) FROM \"products\" WHERE \"products\".\"name\" ILIKE $1"
        );
    }

    #[test]
    fn exists_probe_is_qualified() {
        let config = products();
        let q = exists_sql(&config, &json!(7));
        assert_eq!(
            q.sql,
            "SELECT 1 FROM \"products\" WHERE \"products\".\"id\" = $1 LIMIT 1"
        );
    }
}
