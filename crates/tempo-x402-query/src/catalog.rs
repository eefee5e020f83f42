//! Table discovery and schema introspection over `system.tables` / `system.columns`.
//!
//! Replies are accepted in two encodings, tried in order:
//!
//! 1. structured JSON: an array of records, or the `FORMAT JSON` envelope
//!    whose `data` field holds that array;
//! 2. line-oriented text (ClickHouse TabSeparated), one record per line.
//!
//! [`Parsed`] records which path produced the rows.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::db::{Database, DbError};

pub const LIST_TABLES_SQL: &str = "SELECT DISTINCT name AS table FROM system.tables \
     WHERE database = currentDatabase() ORDER BY table FORMAT JSON";

/// Row order (table, then physical position) decides column order in the schema document.
pub const SCHEMA_SQL: &str = "SELECT table, name AS column_name, type AS column_type, \
     default_kind, default_expression FROM system.columns \
     WHERE database = currentDatabase() ORDER BY table, position FORMAT JSON";

const SCHEMA_FIELDS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Database(#[from] DbError),

    /// The database answered with a non-2xx status.
    #[error("database returned status {status}")]
    Upstream { status: u16, body: String },
}

/// Which encoding a reply was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    Structured(Vec<T>),
    Lines(Vec<T>),
}

impl<T> Parsed<T> {
    pub fn rows(&self) -> &[T] {
        match self {
            Parsed::Structured(rows) | Parsed::Lines(rows) => rows,
        }
    }

    pub fn into_rows(self) -> Vec<T> {
        match self {
            Parsed::Structured(rows) | Parsed::Lines(rows) => rows,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Parsed::Structured(_))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Structured<T> {
    Envelope { data: Vec<T> },
    Rows(Vec<T>),
}

/// Outcome of the structured decode attempt.
enum Decoded<T> {
    Rows(Vec<T>),
    /// A JSON object or array that isn't a row set. Never retried as lines.
    Mismatch,
    NotJson,
}

fn parse_structured<T: DeserializeOwned>(body: &str) -> Decoded<T> {
    match serde_json::from_str::<Structured<T>>(body) {
        Ok(Structured::Envelope { data }) => Decoded::Rows(data),
        Ok(Structured::Rows(rows)) => Decoded::Rows(rows),
        Err(e) => match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(_) | serde_json::Value::Array(_)) => {
                tracing::warn!(error = %e, "JSON reply does not have the expected row shape");
                Decoded::Mismatch
            }
            _ => Decoded::NotJson,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
}

#[derive(Deserialize)]
struct TableRow {
    table: String,
}

/// One `system.columns` row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnRow {
    pub table: String,
    pub column_name: String,
    pub column_type: String,
    #[serde(default)]
    pub default_kind: String,
    #[serde(default)]
    pub default_expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<ColumnRow> for ColumnDescriptor {
    fn from(row: ColumnRow) -> Self {
        let description = if row.default_expression.trim().is_empty() {
            None
        } else {
            let kind = match row.default_kind.trim() {
                "" => "DEFAULT",
                kind => kind,
            };
            Some(format!("{kind} {}", row.default_expression))
        };
        Self {
            name: row.column_name,
            column_type: row.column_type,
            description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDocument {
    pub description: String,
    pub tables: Vec<TableSchema>,
    pub notes: Vec<String>,
}

/// Decode a table-list reply.
pub fn parse_tables(body: &str) -> Parsed<TableDescriptor> {
    match parse_structured::<TableRow>(body) {
        Decoded::Rows(rows) => {
            return Parsed::Structured(
                rows.into_iter()
                    .map(|r| TableDescriptor { name: r.table })
                    .collect(),
            )
        }
        Decoded::Mismatch => return Parsed::Structured(Vec::new()),
        Decoded::NotJson => {}
    }

    Parsed::Lines(
        body.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| TableDescriptor {
                name: unescape_tsv(line),
            })
            .collect(),
    )
}

/// Decode a schema reply.
///
/// In the line fallback every line must carry all five tab-separated fields
/// (table, column_name, column_type, default_kind, default_expression).
/// Shorter lines are dropped rather than padded.
pub fn parse_schema(body: &str) -> Parsed<ColumnRow> {
    match parse_structured::<ColumnRow>(body) {
        Decoded::Rows(rows) => return Parsed::Structured(rows),
        Decoded::Mismatch => return Parsed::Structured(Vec::new()),
        Decoded::NotJson => {}
    }

    let mut rows = Vec::new();
    for (idx, line) in body.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.splitn(SCHEMA_FIELDS, '\t').collect();
        if fields.len() < SCHEMA_FIELDS {
            tracing::warn!(
                line = idx + 1,
                fields = fields.len(),
                "skipping malformed schema line"
            );
            continue;
        }
        rows.push(ColumnRow {
            table: unescape_tsv(fields[0]),
            column_name: unescape_tsv(fields[1]),
            column_type: unescape_tsv(fields[2]),
            default_kind: unescape_tsv(fields[3]),
            default_expression: unescape_tsv(fields[4]),
        });
    }
    Parsed::Lines(rows)
}

/// Undo TabSeparated escaping (`\t`, `\n`, `\\`, ...).
fn unescape_tsv(field: &str) -> String {
    if !field.contains('\\') {
        return field.to_string();
    }
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// List tables in the current database. Never fails: any error is logged
/// and reported as "no tables".
pub async fn list_tables(db: &Database) -> Vec<TableDescriptor> {
    match db.execute(LIST_TABLES_SQL).await {
        Ok(resp) if resp.is_success() => {
            let parsed = parse_tables(&resp.body);
            tracing::debug!(
                structured = parsed.is_structured(),
                count = parsed.rows().len(),
                "table list fetched"
            );
            parsed.into_rows()
        }
        Ok(resp) => {
            tracing::warn!(status = resp.status, body = %resp.body, "failed to list tables");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to list tables");
            Vec::new()
        }
    }
}

/// Fetch column metadata for every table in the current database.
pub async fn get_schema(db: &Database) -> Result<Parsed<ColumnRow>, CatalogError> {
    let resp = db.execute(SCHEMA_SQL).await?;
    if !resp.is_success() {
        return Err(CatalogError::Upstream {
            status: resp.status,
            body: resp.body,
        });
    }
    Ok(parse_schema(&resp.body))
}

/// Group rows by table, keeping first-seen table order and row order within a table.
pub fn build_schema_document(rows: Vec<ColumnRow>) -> SchemaDocument {
    let mut tables: Vec<TableSchema> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let slot = match index.get(&row.table) {
            Some(&i) => i,
            None => {
                index.insert(row.table.clone(), tables.len());
                tables.push(TableSchema {
                    name: row.table.clone(),
                    columns: Vec::new(),
                });
                tables.len() - 1
            }
        };
        tables[slot].columns.push(ColumnDescriptor::from(row));
    }

    SchemaDocument {
        description: "ClickHouse database schema. Pay per query via POST /query.".to_string(),
        tables,
        notes: vec![
            "Queries run against the ClickHouse SQL dialect.".to_string(),
            "Results are returned as JSON; FORMAT JSON is appended when no output format is given."
                .to_string(),
            "Use GET /validate?query=... to check syntax before paying.".to_string(),
        ],
    }
}

/// Human-readable capability string advertised by the payment gate.
pub fn tables_description(tables: &[TableDescriptor]) -> String {
    let base = "Execute SQL queries against a ClickHouse analytics database; results are returned as JSON.";
    if tables.is_empty() {
        format!("{base} No tables found.")
    } else {
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        format!("{base} Available tables: {}.", names.join(", "))
    }
}
