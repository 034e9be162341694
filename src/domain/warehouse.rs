//! Analytics warehouse: native queries with bound parameters, and their results.
//!
//! A `NativeQuery` keeps SQL text and caller values apart. The text references values
//! only through `{{tag}}` placeholders; the gateway substitutes them server-side.

use crate::domain::{SourceKind, SourceRef, SourceSystem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// One result row keyed by column name.
pub type Row = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryParam {
    Text(String),
    /// Whole numbers, e.g. `LIMIT` values. Serialized without a fraction.
    Integer(i64),
    Number(f64),
    /// ISO-8601 date (`YYYY-MM-DD`).
    Date(String),
}

impl QueryParam {
    /// SQL literal for previews. Single quotes are doubled.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Text(s) | Self::Date(s) => quote_literal(s),
            Self::Integer(n) => n.to_string(),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
        }
    }
}

/// Quote a string as a SQL literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Escape LIKE wildcards so the term matches literally (used with `ESCAPE '\'`).
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct NativeQuery {
    pub sql: String,
    pub params: BTreeMap<String, QueryParam>,
    /// Execution target; falls back to the configured default database.
    pub database: Option<i64>,
}

impl NativeQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: BTreeMap::new(),
            database: None,
        }
    }

    pub fn bind(mut self, name: &str, value: QueryParam) -> Self {
        self.params.insert(name.to_string(), value);
        self
    }

    pub fn bind_text(self, name: &str, value: impl Into<String>) -> Self {
        self.bind(name, QueryParam::Text(value.into()))
    }

    pub fn bind_integer(self, name: &str, value: i64) -> Self {
        self.bind(name, QueryParam::Integer(value))
    }

    pub fn bind_number(self, name: &str, value: f64) -> Self {
        self.bind(name, QueryParam::Number(value))
    }

    pub fn on_database(mut self, database: i64) -> Self {
        self.database = Some(database);
        self
    }

    /// Tag names referenced by the SQL text, in order of first appearance.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut rest = self.sql.as_str();
        while let Some(start) = rest.find("{{") {
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else { break };
            let name = after[..end].trim().to_string();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
            rest = &after[end + 2..];
        }
        names
    }

    /// Placeholders with no bound value.
    pub fn unbound(&self) -> Vec<String> {
        self.placeholders()
            .into_iter()
            .filter(|n| !self.params.contains_key(n))
            .collect()
    }

    /// SQL with literals substituted. For logs and previews only; never executed.
    pub fn inline_sql(&self) -> String {
        let mut out = String::with_capacity(self.sql.len());
        let mut rest = self.sql.as_str();
        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                out.push_str(&rest[start..]);
                return out;
            };
            let name = after[..end].trim();
            match self.params.get(name) {
                Some(p) => out.push_str(&p.to_sql_literal()),
                None => out.push_str(&rest[start..start + end + 4]),
            }
            rest = &after[end + 2..];
        }
        out.push_str(rest);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub display_name: Option<String>,
    pub base_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub database: Option<i64>,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Zip column metadata with positional row arrays.
    pub fn from_columns_and_rows(
        database: Option<i64>,
        columns: Vec<Column>,
        raw_rows: Vec<Vec<serde_json::Value>>,
    ) -> Self {
        let rows = raw_rows
            .into_iter()
            .map(|values| {
                columns
                    .iter()
                    .zip(values)
                    .map(|(c, v)| (c.name.clone(), v))
                    .collect::<Row>()
            })
            .collect();
        Self {
            database,
            columns,
            rows,
        }
    }

    /// Source key for a row, taken from `id_column`.
    pub fn row_source(row: &Row, id_column: &str) -> Option<SourceRef> {
        let id = match row.get(id_column)? {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(SourceRef::new(SourceSystem::Metabase, SourceKind::Row, id))
    }

    /// Write rows as CSV with a header line in column order.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in &self.rows {
            let record: Vec<String> = self
                .columns
                .iter()
                .map(|c| cell_text(row.get(&c.name)))
                .collect();
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn cell_text(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_literal_doubles_quotes() {
        assert_eq!(quote_literal("O'Brien Transit"), "'O''Brien Transit'");
        assert_eq!(quote_literal("a'; DROP TABLE x; --"), "'a''; DROP TABLE x; --'");
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("O'Brien"), "O'Brien");
    }

    #[test]
    fn test_inline_sql_keeps_hostile_input_inside_literal() {
        let q = NativeQuery::new("SELECT * FROM operator WHERE name = {{name}} LIMIT {{limit}}")
            .bind_text("name", "x'; DELETE FROM operator; --")
            .bind_integer("limit", 10);
        assert_eq!(
            q.inline_sql(),
            "SELECT * FROM operator WHERE name = 'x''; DELETE FROM operator; --' LIMIT 10"
        );
        // The executable text is untouched.
        assert!(!q.sql.contains("DELETE"));
    }

    #[test]
    fn test_placeholders_and_unbound() {
        let q = NativeQuery::new("a = {{a}} AND b = {{ b }} OR a = {{a}}").bind_text("a", "1");
        assert_eq!(q.placeholders(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(q.unbound(), vec!["b".to_string()]);
        assert_eq!(q.inline_sql(), "a = '1' AND b = {{ b }} OR a = '1'");
    }

    #[test]
    fn test_from_columns_and_rows_and_csv() {
        let cols = vec![
            Column {
                name: "id".to_string(),
                display_name: None,
                base_type: None,
            },
            Column {
                name: "name".to_string(),
                display_name: None,
                base_type: None,
            },
        ];
        let result = QueryResult::from_columns_and_rows(
            Some(2),
            cols,
            vec![vec![json!(7), json!("O'Brien, Inc")], vec![json!(8), json!(null)]],
        );
        assert_eq!(result.rows[0]["name"], json!("O'Brien, Inc"));
        assert_eq!(
            QueryResult::row_source(&result.rows[0], "id").map(|s| s.id),
            Some("7".to_string())
        );

        let mut out = Vec::new();
        result.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "id,name\n7,\"O'Brien, Inc\"\n8,\n");
    }
}
