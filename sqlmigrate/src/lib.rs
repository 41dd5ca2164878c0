#![cfg_attr(docsrs, feature(doc_cfg))]
//! `sqlmigrate` is a small library for applying versioned SQL scripts to a database.
//!
//! Core concepts:
//! - A migration is a pair of plain SQL files, `{version}.up.sql` and `{version}.down.sql`,
//!   where `{version}` is made of ASCII word characters and dashes.
//! - Versions are ordered as strings. A Unix timestamp prefix such as
//!   `1700000000-add_users` keeps that order chronological.
//! - The database stores a single current version, in a one-row table. The empty
//!   string means nothing has been applied.
//!
//! # Operations
//!
//! - **up** applies every `up` script newer than the current version, oldest first.
//! - **down** applies every `down` script at or below the current version, newest first,
//!   recording after each one the version of the next `down` script below it.
//! - **to** moves up or down until a named version is current. An empty target is the
//!   same as **down**.
//!
//! Each script runs in its own transaction with the version update. A failure stops the
//! run, rolls back the failing script, and keeps every script committed before it.
//!
//! # Sources
//!
//! Scripts are read through the [ScriptSource] trait: from a directory with
//! [DirSource], from memory with [MemorySource], or compiled into the binary with
//! `EmbeddedSource` (with the `embed` feature flag).
//!
//! # Benefits
//! - Per-script transactions with explicit rollback, including when a callback panics.
//! - `before` and `after` callbacks that run inside each script's transaction.
//! - Preview / dry-run support.
//! - Observability hooks.
//! - Tracing integration - available with the `tracing` feature flag.
//!
//! # Database support
//!
//! - [`SQLite`](sqlite) - available with the `sqlite` feature flag (on by default).
//! - [`MySQL`](mysql) - available with the `mysql` feature flag.
//! - [`PostgreSQL`](postgres) - available with the `postgres` feature flag.

mod core;
pub use core::{Direction, MigrationReport, Script, Step, Version};

mod error;
pub use error::{ApplyPhase, Error};

mod source;
#[cfg(feature = "embed")]
pub use source::EmbeddedSource;
pub use source::{list_scripts, parse_script_name, DirSource, MemorySource, ScriptSource};

mod sql;
pub use sql::TableName;

mod apply;

#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite;

#[cfg(feature = "mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "mysql")))]
pub mod mysql;

#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres;

#[cfg(all(test, feature = "mysql"))]
pub(crate) mod test_mysql;

#[cfg(all(test, feature = "postgres"))]
pub(crate) mod test_postgres;
