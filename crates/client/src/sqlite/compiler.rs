//! SQL generation for query declarations.
//!
//! Compilation is pure: table shapes and relation plans are looked up by
//! the executor beforehand, so every statement here can be checked without
//! a database. Values are always bound; only validated identifiers are
//! spliced into the text, quoted.
//!
//! Paginated queries select the page of main-table ids in a CTE first so
//! that relation joins cannot shift the window.

use quire_core::model::{ModelDescriptor, RelationSpec, to_snake_case};
use quire_core::operator::Operator;
use quire_core::query::Query;
use quire_core::Error;
use serde_json::Value;
use tokio_rusqlite::rusqlite::types::Value as SqlValue;

use super::connection::{LOWER_FUNCTION, to_sql};
use super::content::{RELATIONS_TABLE, main_table, quote_ident, translation_table};

/// Columns every main table carries.
pub const SYSTEM_COLUMNS: [&str; 5] = ["id", "created_at", "updated_at", "status", "scheduled"];

/// Separates the relation name from the column in joined column aliases.
pub const RELATION_SEPARATOR: char = '.';

/// Column alias suffix carrying the link target id of a joined relation.
pub const LINK_COLUMN: &str = "__link";

const NEVER: &str = "0 = 1";
const ALWAYS: &str = "1 = 1";

/// Alias of a target column joined under relation `name`.
pub fn related_alias(name: &str, column: &str) -> String {
    format!("{name}{RELATION_SEPARATOR}{column}")
}

pub fn link_alias(name: &str) -> String {
    related_alias(name, LINK_COLUMN)
}

/// Columns of a model's tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableShape {
    pub model_id: String,
    pub main_columns: Vec<String>,
    /// Content columns of the translation table, `None` without one.
    pub translation_columns: Option<Vec<String>>,
}

impl TableShape {
    fn has_main(&self, column: &str) -> bool {
        self.main_columns.iter().any(|c| c == column)
    }

    fn has_translation(&self, column: &str) -> bool {
        self.translation_columns.as_ref().is_some_and(|cols| cols.iter().any(|c| c == column))
    }

    /// Translation columns that do not shadow a main column.
    fn translated_only(&self) -> impl Iterator<Item = &String> {
        self.translation_columns.iter().flatten().filter(|c| !self.has_main(c))
    }
}

/// An include answered inside the main statement.
#[derive(Debug, Clone)]
pub struct JoinPlan {
    /// Include name, also the prefix of projected target columns.
    pub name: String,
    pub spec: RelationSpec,
    pub target: TableShape,
    /// Locale of the target's translated columns.
    pub locale: Option<String>,
    /// Main-table column holding the target id; links are used without one.
    pub foreign_key: Option<String>,
}

/// Where a declared field lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    System,
    ForeignKey,
    Translatable,
    Main,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub placement: Placement,
    pub column: String,
}

impl ColumnRef {
    fn sql(&self) -> String {
        let alias = if self.placement == Placement::Translatable { "t" } else { "m" };
        format!("{alias}.{}", quote_ident(&self.column))
    }
}

/// Map a declared field name onto a column.
///
/// camelCase names are matched against their snake_case columns; relation
/// fields resolve to their `<name>_id` foreign key.
///
/// # Errors
///
/// Returns `Error::Validation` for dotted paths and unknown fields.
pub fn classify(field: &str, descriptor: &ModelDescriptor, shape: &TableShape) -> Result<ColumnRef, Error> {
    if field.contains('.') {
        return Err(Error::Validation(format!(
            "related field '{field}' cannot be used to filter or sort model '{}'",
            shape.model_id
        )));
    }

    let column = to_snake_case(field);
    if SYSTEM_COLUMNS.contains(&column.as_str()) && shape.has_main(&column) {
        return Ok(ColumnRef { placement: Placement::System, column });
    }
    if descriptor.field(field).is_some_and(|f| f.is_relation()) {
        let foreign_key = format!("{column}_id");
        if shape.has_main(&foreign_key) {
            return Ok(ColumnRef { placement: Placement::ForeignKey, column: foreign_key });
        }
        return Err(Error::Validation(format!(
            "relation '{field}' of model '{}' has no foreign key column",
            shape.model_id
        )));
    }
    if column.ends_with("_id") && shape.has_main(&column) {
        return Ok(ColumnRef { placement: Placement::ForeignKey, column });
    }
    if shape.has_translation(&column) {
        return Ok(ColumnRef { placement: Placement::Translatable, column });
    }
    if shape.has_main(&column) {
        return Ok(ColumnRef { placement: Placement::Main, column });
    }
    Err(Error::Validation(format!("unknown field '{field}' for model '{}'", shape.model_id)))
}

/// SQL text plus its parameters, in text order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Fragment {
    fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self { sql: sql.into(), params }
    }

    fn text(sql: &str) -> Self {
        Self::new(sql, Vec::new())
    }
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Compile `column <op> value`.
///
/// Operands of the wrong type compile to a condition that never holds,
/// matching the in-memory evaluator.
pub fn compile_predicate(column: &str, op: Operator, value: &Value) -> Fragment {
    match op {
        Operator::Eq if value.is_null() => Fragment::new(format!("{column} IS NULL"), Vec::new()),
        Operator::Ne if value.is_null() => Fragment::new(format!("{column} IS NOT NULL"), Vec::new()),
        Operator::Eq => Fragment::new(format!("{column} = ?"), vec![to_sql(value)]),
        Operator::Ne => Fragment::new(format!("({column} IS NULL OR {column} <> ?)"), vec![to_sql(value)]),
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            if !value.is_number() {
                return Fragment::text(NEVER);
            }
            let symbol = match op {
                Operator::Gt => ">",
                Operator::Gte => ">=",
                Operator::Lt => "<",
                _ => "<=",
            };
            Fragment::new(
                format!("(typeof({column}) IN ('integer', 'real') AND {column} {symbol} ?)"),
                vec![to_sql(value)],
            )
        }
        Operator::In => match value.as_array() {
            Some(items) if !items.is_empty() => {
                let params = items.iter().map(to_sql).collect();
                Fragment::new(format!("{column} IN ({})", placeholders(items.len())), params)
            }
            _ => Fragment::text(NEVER),
        },
        Operator::Nin => match value.as_array() {
            Some(items) if items.is_empty() => Fragment::text(ALWAYS),
            Some(items) => Fragment::new(
                format!("({column} IS NULL OR {column} NOT IN ({}))", placeholders(items.len())),
                items.iter().map(to_sql).collect(),
            ),
            None => Fragment::text(NEVER),
        },
        Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
            let Some(needle) = value.as_str() else {
                return Fragment::text(NEVER);
            };
            let needle = escape_like(&needle.to_lowercase());
            let pattern = match op {
                Operator::Contains => format!("%{needle}%"),
                Operator::StartsWith => format!("{needle}%"),
                _ => format!("%{needle}"),
            };
            Fragment::new(format!("{LOWER_FUNCTION}({column}) LIKE ? ESCAPE '\\'"), vec![SqlValue::Text(pattern)])
        }
    }
}

/// Statements answering one query.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub count_sql: String,
    pub count_params: Vec<SqlValue>,
}

struct Projection {
    columns: Vec<String>,
    joins: Fragment,
    /// Extra ordering keeping link rows in insertion order.
    link_order: Vec<String>,
}

fn project(shape: &TableShape, translated: bool, joins: &[JoinPlan]) -> Projection {
    let mut columns: Vec<String> =
        shape.main_columns.iter().map(|c| format!("m.{} AS {}", quote_ident(c), quote_ident(c))).collect();
    if translated {
        columns.extend(shape.translated_only().map(|c| format!("t.{} AS {}", quote_ident(c), quote_ident(c))));
    }

    let mut sql = String::new();
    let mut params = Vec::new();
    let mut link_order = Vec::new();
    for (i, join) in joins.iter().enumerate() {
        let target = format!("r{i}");
        let target_table = quote_ident(&main_table(&join.target.model_id));
        match &join.foreign_key {
            Some(foreign_key) => {
                sql.push_str(&format!(
                    " LEFT JOIN {target_table} AS {target} ON {target}.\"id\" = m.{}",
                    quote_ident(foreign_key)
                ));
            }
            None => {
                let link = format!("l{i}");
                sql.push_str(&format!(
                    " LEFT JOIN {} AS {link} ON {link}.\"source_model\" = ? AND {link}.\"source_id\" = m.\"id\" \
                     AND {link}.\"field_id\" = ? \
                     LEFT JOIN {target_table} AS {target} ON {target}.\"id\" = {link}.\"target_id\"",
                    quote_ident(RELATIONS_TABLE)
                ));
                params.push(SqlValue::Text(shape.model_id.clone()));
                params.push(SqlValue::Text(join.spec.field_id.clone()));
                columns.push(format!("{link}.\"target_id\" AS {}", quote_ident(&link_alias(&join.name))));
                link_order.push(format!("{link}.rowid ASC"));
            }
        }
        columns.extend(
            join.target
                .main_columns
                .iter()
                .map(|c| format!("{target}.{} AS {}", quote_ident(c), quote_ident(&related_alias(&join.name, c)))),
        );

        if let (Some(_), Some(locale)) = (&join.target.translation_columns, &join.locale) {
            let translated = format!("rt{i}");
            sql.push_str(&format!(
                " LEFT JOIN {} AS {translated} \
                 ON {translated}.\"id\" = {target}.\"id\" AND {translated}.\"locale\" = ?",
                quote_ident(&translation_table(&join.target.model_id))
            ));
            params.push(SqlValue::Text(locale.clone()));
            columns.extend(join.target.translated_only().map(|c| {
                format!("{translated}.{} AS {}", quote_ident(c), quote_ident(&related_alias(&join.name, c)))
            }));
        }
    }

    Projection { columns, joins: Fragment::new(sql, params), link_order }
}

fn localized_field_error(field: &str, model_id: &str) -> Error {
    Error::Validation(format!(
        "field '{field}' of model '{model_id}' is localized; set a locale to filter or sort on it"
    ))
}

/// Compile `query` against `shape`.
///
/// `locale` is the locale translated columns are read in (already resolved
/// to a fallback if needed); the declared locale in `query` decides whether
/// localized fields may be filtered or sorted on.
///
/// # Errors
///
/// Returns `Error::Validation` for unknown fields, dotted paths, and
/// localized fields used without a declared locale.
pub fn compile(
    query: &Query,
    descriptor: &ModelDescriptor,
    shape: &TableShape,
    locale: Option<&str>,
    joins: &[JoinPlan],
) -> Result<CompiledQuery, Error> {
    let translated = shape.translation_columns.is_some() && locale.is_some();
    let mut inner = false;

    let mut predicates = Vec::with_capacity(query.filters.len());
    for filter in &query.filters {
        let column = classify(&filter.field, descriptor, shape)?;
        if column.placement == Placement::Translatable {
            if query.locale.is_none() || !translated {
                return Err(localized_field_error(&filter.field, &shape.model_id));
            }
            inner = true;
        }
        predicates.push(compile_predicate(&column.sql(), filter.operator, &filter.value));
    }

    let mut order = Vec::with_capacity(query.sorting.len() + 1);
    for sort in &query.sorting {
        let column = classify(&sort.field, descriptor, shape)?;
        if column.placement == Placement::Translatable {
            if query.locale.is_none() || !translated {
                return Err(localized_field_error(&sort.field, &shape.model_id));
            }
            inner = true;
        }
        order.push(format!("{} {}", column.sql(), sort.direction.as_sql()));
    }
    order.push("m.rowid ASC".to_string());

    let table = quote_ident(&main_table(&shape.model_id));
    let translation = match locale.filter(|_| translated) {
        Some(locale) => Fragment::new(
            format!(
                " {} JOIN {} AS t ON t.\"id\" = m.\"id\" AND t.\"locale\" = ?",
                if inner { "INNER" } else { "LEFT" },
                quote_ident(&translation_table(&shape.model_id))
            ),
            vec![SqlValue::Text(locale.to_string())],
        ),
        None => Fragment::default(),
    };

    let filter = if predicates.is_empty() {
        Fragment::default()
    } else {
        Fragment::new(
            format!(" WHERE {}", predicates.iter().map(|p| p.sql.as_str()).collect::<Vec<_>>().join(" AND ")),
            predicates.into_iter().flat_map(|p| p.params).collect(),
        )
    };

    let projection = project(shape, translated, joins);
    let columns = projection.columns.join(", ");
    let order_sql = format!(" ORDER BY {}", order.join(", "));
    let outer_order = if projection.link_order.is_empty() {
        order_sql.clone()
    } else {
        format!("{order_sql}, {}", projection.link_order.join(", "))
    };

    let count_sql = format!("SELECT COUNT(*) AS total FROM {table} AS m{}{}", translation.sql, filter.sql);
    let count_params = [translation.params.clone(), filter.params.clone()].concat();

    let paginated = query.limit().is_some() || query.offset() > 0;
    let (sql, params) = if paginated {
        let limit = query.limit().map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);
        let sql = format!(
            "WITH page AS (SELECT m.\"id\" AS id FROM {table} AS m{t}{w}{order_sql} LIMIT ? OFFSET ?) \
             SELECT {columns} FROM {table} AS m{t}{j} WHERE m.\"id\" IN (SELECT id FROM page){outer_order}",
            t = translation.sql,
            w = filter.sql,
            j = projection.joins.sql,
        );
        let params = [
            translation.params.clone(),
            filter.params,
            vec![SqlValue::Integer(limit), SqlValue::Integer(offset)],
            translation.params,
            projection.joins.params,
        ]
        .concat();
        (sql, params)
    } else {
        let sql = format!(
            "SELECT {columns} FROM {table} AS m{}{}{}{outer_order}",
            translation.sql, projection.joins.sql, filter.sql
        );
        let params = [translation.params, projection.joins.params, filter.params].concat();
        (sql, params)
    };

    Ok(CompiledQuery { sql, params, count_sql, count_params })
}
