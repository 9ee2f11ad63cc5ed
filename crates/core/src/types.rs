//! Core domain types for relational subset extraction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a table by schema and name.
///
/// The canonical string form `schema.name` (the *normalized name*) is the
/// identity used by every map and set in the workspace. Ordering follows the
/// normalized name so that iteration over table collections is deterministic.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema the table lives in
    pub schema: String,
    /// Table name within the schema
    pub name: String,
}

impl TableRef {
    /// Create a table reference from schema and name.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        TableRef {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Canonical `schema.name` form.
    pub fn normalized(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Parse a normalized name. A bare table name defaults to the `public`
    /// schema; anything after the first dot is the table name.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('.') {
            Some((schema, name)) => TableRef::new(schema, name),
            None => TableRef::new("public", raw),
        }
    }

    /// Double-quoted identifier pair, safe for interpolation into generated
    /// SQL (`"schema"."name"`).
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Quote an identifier for interpolation into generated SQL.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Coarse SQL type category.
///
/// This is the minimum information needed to render a value read back from a
/// CSV into a SQL literal. Anything that is not character-like or integral is
/// `Other`, which the planner refuses to render rather than guessing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlTypeCategory {
    /// Fixed or varying character data (`character`, `character varying`)
    Character,
    /// Unbounded text
    Text,
    /// Integral types (`smallint`, `integer`, `bigint`)
    Integer,
    /// Everything else (uuid, numeric, timestamps, arrays, ...)
    Other,
}

impl SqlTypeCategory {
    /// Map an `information_schema` `data_type` string onto a category.
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type.trim().to_ascii_lowercase().as_str() {
            t if t.starts_with("character") || t == "char" || t == "bpchar" => {
                SqlTypeCategory::Character
            }
            "text" => SqlTypeCategory::Text,
            "smallint" | "integer" | "bigint" => SqlTypeCategory::Integer,
            _ => SqlTypeCategory::Other,
        }
    }

    /// Render a raw CSV value as a SQL literal, or `None` when this category
    /// cannot be rendered faithfully. Character data is single-quoted with
    /// embedded quotes doubled; integers pass through bare.
    pub fn render_literal(&self, raw: &str) -> Option<String> {
        match self {
            SqlTypeCategory::Character | SqlTypeCategory::Text => {
                Some(format!("'{}'", raw.replace('\'', "''")))
            }
            SqlTypeCategory::Integer => Some(raw.to_string()),
            SqlTypeCategory::Other => None,
        }
    }
}

/// A table column together with its type category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Coarse type category
    pub category: SqlTypeCategory,
}

impl Column {
    /// Create a column descriptor.
    pub fn new(name: impl Into<String>, category: SqlTypeCategory) -> Self {
        Column {
            name: name.into(),
            category,
        }
    }
}

/// Everything the snapshot needs to know about one table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table identity
    pub table: TableRef,
    /// Columns in ordinal order
    pub columns: Vec<Column>,
}

impl TableDescriptor {
    /// Create a descriptor from identity and columns.
    pub fn new(table: TableRef, columns: Vec<Column>) -> Self {
        TableDescriptor { table, columns }
    }

    /// Column names in ordinal order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// One column pair of a foreign-key constraint.
///
/// A row in `child` requires a row in `parent` with a matching column value.
/// Multi-column constraints appear as multiple edges sharing `constraint`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyEdge {
    /// Constraint name as reported by the catalog
    pub constraint: String,
    /// Referencing table
    pub child: TableRef,
    /// Referencing column
    pub child_column: String,
    /// Referenced table
    pub parent: TableRef,
    /// Referenced column
    pub parent_column: String,
    /// Type category of the referencing column
    pub child_column_type: SqlTypeCategory,
}

impl ForeignKeyEdge {
    /// Whether this edge points back at its own table.
    pub fn is_self_referencing(&self) -> bool {
        self.child == self.parent
    }
}
