//! Every statement the migrator builds by string formatting lives here.
//!
//! Identifiers cannot be bound as parameters, and the version placeholder syntax
//! differs between drivers, so the table name and version are interpolated.
//! Both are restricted to a narrow alphabet before they get here: table names by
//! [TableName::parse], versions by the filename patterns in [crate::source].

use crate::core::Version;
use crate::error::Error;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)^[\w.]+$").expect("table name pattern is valid"));

pub(crate) const DEFAULT_TABLE_NAME: &str = "migrations";

/// A validated name for the version table, matching `^[\w.]+$`.
///
/// A dot is allowed so the table can be schema-qualified, e.g. `schema.mytable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn parse(name: impl Into<String>) -> Result<Self, Error> {
        let name = name.into();
        if TABLE_NAME.is_match(&name) {
            Ok(Self(name))
        } else {
            Err(Error::InvalidTableName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self(DEFAULT_TABLE_NAME.to_string())
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn create_table(table: &TableName) -> String {
    format!("create table if not exists {table} (version text not null)")
}

pub(crate) fn has_version_row(table: &TableName) -> String {
    format!("select exists (select * from {table})")
}

pub(crate) fn seed_version_row(table: &TableName) -> String {
    format!("insert into {table} values ('')")
}

pub(crate) fn select_version(table: &TableName) -> String {
    format!("select version from {table}")
}

pub(crate) fn set_version(table: &TableName, version: &Version) -> String {
    debug_assert!(
        !version.as_str().contains('\''),
        "versions reaching set_version come from filename patterns"
    );
    format!("update {table} set version = '{}'", version.as_str())
}
