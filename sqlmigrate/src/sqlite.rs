//! SQLite migration support, using the [`rusqlite`](https://crates.io/crates/rusqlite) crate.
//!
//! SQLite runs DDL inside transactions, so a failing script leaves no trace: its
//! statements and the version update are rolled back together.
//!
//! # Example
//!
//! ```
//! use rusqlite::Connection;
//! use sqlmigrate::sqlite::SqliteMigrator;
//! use sqlmigrate::MemorySource;
//!
//! let source = MemorySource::new()
//!     .with_script("1.up.sql", "create table users (id integer primary key, name text)")
//!     .with_script("1.down.sql", "drop table users")
//!     .with_script("2.up.sql", "alter table users add column email text")
//!     .with_script("2.down.sql", "alter table users drop column email");
//!
//! let migrator = SqliteMigrator::new(source);
//! let mut conn = Connection::open_in_memory().unwrap();
//!
//! let report = migrator.migrate_up(&mut conn).unwrap();
//! assert_eq!(report.scripts_run, vec!["1.up.sql", "2.up.sql"]);
//! assert_eq!(migrator.current_version(&conn).unwrap(), "2");
//!
//! migrator.migrate_to(&mut conn, "1").unwrap();
//! assert_eq!(migrator.current_version(&conn).unwrap(), "1");
//!
//! migrator.migrate_down(&mut conn).unwrap();
//! assert!(migrator.current_version(&conn).unwrap().is_empty());
//! ```

use crate::apply::{apply_script, ScriptTransaction};
use crate::core::{GenericMigrator, MigrationReport, Operation, Script, Step, Version};
use crate::error::{ApplyPhase, Error};
use crate::source::ScriptSource;
use crate::sql;
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::time::Duration;

type Callback = Box<dyn Fn(&Transaction<'_>, &str) -> Result<(), Error> + Send + Sync>;

impl ScriptTransaction for Transaction<'_> {
    fn execute_script(&mut self, sql: &str) -> Result<(), Error> {
        self.execute_batch(sql)?;
        Ok(())
    }

    fn commit_script(self) -> Result<(), Error> {
        self.commit()?;
        Ok(())
    }

    fn rollback_script(self) -> Result<(), Error> {
        self.rollback()?;
        Ok(())
    }
}

/// Applies and reverts the SQL scripts of a [ScriptSource] on a SQLite database.
///
/// The current version lives in a single-row table, `migrations` unless changed with
/// [SqliteMigrator::with_table_name]. Each script runs in its own transaction together
/// with the update of that row.
pub struct SqliteMigrator {
    migrator: GenericMigrator,
    before: Option<Callback>,
    after: Option<Callback>,
}

// Manual Debug impl since closures don't implement Debug
impl std::fmt::Debug for SqliteMigrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMigrator")
            .field("migrator", &self.migrator)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

impl SqliteMigrator {
    pub fn new(source: impl ScriptSource + 'static) -> Self {
        Self {
            migrator: GenericMigrator::new(source),
            before: None,
            after: None,
        }
    }

    /// Set the name of the version table, returning an error if it doesn't match `^[\w.]+$`.
    pub fn try_with_table_name(mut self, name: impl Into<String>) -> Result<Self, Error> {
        self.migrator.set_table_name(name)?;
        Ok(self)
    }

    /// Set the name of the version table. Defaults to "migrations".
    ///
    /// # Panics
    ///
    /// If the name doesn't match `^[\w.]+$`. For a non-panicking version, use `try_with_table_name`.
    pub fn with_table_name(self, name: impl Into<String>) -> Self {
        match self.try_with_table_name(name) {
            Ok(migrator) => migrator,
            Err(err) => panic!("{}", err),
        }
    }

    /// Set a callback run inside each script's transaction, before the script.
    /// It receives the transaction and the version the table will hold afterwards.
    /// Returning an error rolls the transaction back.
    pub fn before<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Transaction<'_>, &str) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.before = Some(Box::new(callback));
        self
    }

    /// Set a callback run inside each script's transaction, after the script and before
    /// the commit. Returning an error rolls the transaction back.
    pub fn after<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Transaction<'_>, &str) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.after = Some(Box::new(callback));
        self
    }

    /// Set a callback to be invoked when a script starts.
    pub fn on_migration_start<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Script, &Version) + Send + Sync + 'static,
    {
        self.migrator.set_on_migration_start(callback);
        self
    }

    /// Set a callback to be invoked when a script has been committed.
    pub fn on_migration_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Script, &Version, Duration) + Send + Sync + 'static,
    {
        self.migrator.set_on_migration_complete(callback);
        self
    }

    /// Set a callback to be invoked when a script fails.
    pub fn on_migration_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Script, &Error) + Send + Sync + 'static,
    {
        self.migrator.set_on_migration_error(callback);
        self
    }

    pub fn table_name(&self) -> &str {
        self.migrator.table.as_str()
    }

    /// Create the version table if it doesn't exist, and give it its single row.
    pub fn ensure_version_table(&self, conn: &mut Connection) -> Result<(), Error> {
        let table = &self.migrator.table;
        let tx = conn.transaction()?;
        tx.execute_batch(&sql::create_table(table))?;
        let has_row: bool = tx.query_row(&sql::has_version_row(table), [], |row| row.get(0))?;
        if !has_row {
            #[cfg(feature = "tracing")]
            tracing::info!(table = %table, "Initializing version table");

            tx.execute(&sql::seed_version_row(table), [])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Read the current version. Fails if the version table hasn't been created.
    pub fn current_version(&self, conn: &Connection) -> Result<Version, Error> {
        let table = &self.migrator.table;
        let version: Option<String> = conn
            .query_row(&sql::select_version(table), [], |row| row.get(0))
            .optional()?;
        version
            .map(Version::new)
            .ok_or_else(|| Error::MissingVersionRow(table.to_string()))
    }

    /// The steps [SqliteMigrator::migrate_up] would run, without running them.
    pub fn preview_up(&self, conn: &mut Connection) -> Result<Vec<Step>, Error> {
        self.preview(conn, Operation::Up)
    }

    /// The steps [SqliteMigrator::migrate_down] would run, without running them.
    pub fn preview_down(&self, conn: &mut Connection) -> Result<Vec<Step>, Error> {
        self.preview(conn, Operation::Down)
    }

    /// The steps [SqliteMigrator::migrate_to] would run, without running them.
    pub fn preview_to(&self, conn: &mut Connection, version: &str) -> Result<Vec<Step>, Error> {
        self.preview(conn, Operation::To(version))
    }

    /// Apply every `up` script newer than the current version, oldest first.
    ///
    /// Stops at the first script that fails. Scripts committed before it stay applied,
    /// so calling this again resumes from there.
    pub fn migrate_up(&self, conn: &mut Connection) -> Result<MigrationReport, Error> {
        self.migrate(conn, Operation::Up)
    }

    /// Apply every `down` script at or below the current version, newest first.
    pub fn migrate_down(&self, conn: &mut Connection) -> Result<MigrationReport, Error> {
        self.migrate(conn, Operation::Down)
    }

    /// Migrate up or down until `version` is the current version.
    ///
    /// An empty `version` reverts everything. Fails with [Error::VersionNotFound],
    /// before running anything, if no script has that version.
    pub fn migrate_to(
        &self,
        conn: &mut Connection,
        version: &str,
    ) -> Result<MigrationReport, Error> {
        self.migrate(conn, Operation::To(version))
    }

    fn preview(&self, conn: &mut Connection, operation: Operation<'_>) -> Result<Vec<Step>, Error> {
        self.ensure_version_table(conn)?;
        let current = self.current_version(conn)?;
        Ok(self.migrator.plan(&current, operation)?.steps)
    }

    fn migrate(
        &self,
        conn: &mut Connection,
        operation: Operation<'_>,
    ) -> Result<MigrationReport, Error> {
        self.ensure_version_table(conn)?;
        let current = self.current_version(conn)?;
        let plan = self.migrator.plan(&current, operation)?;
        self.migrator
            .run(current, plan, |step, content| self.apply(conn, step, content))
    }

    fn apply(&self, conn: &mut Connection, step: &Step, content: &str) -> Result<(), Error> {
        let tx = conn
            .transaction()
            .map_err(|e| step.error(ApplyPhase::Begin, e.into()))?;
        let record = step.record.as_str();
        apply_script(
            tx,
            step,
            &sql::set_version(&self.migrator.table, &step.record),
            content,
            |tx| match &self.before {
                Some(callback) => callback(&*tx, record),
                None => Ok(()),
            },
            |tx| match &self.after {
                Some(callback) => callback(&*tx, record),
                None => Ok(()),
            },
        )
    }
}

/// Migrate up with default options.
pub fn up(
    conn: &mut Connection,
    source: impl ScriptSource + 'static,
) -> Result<MigrationReport, Error> {
    SqliteMigrator::new(source).migrate_up(conn)
}

/// Migrate down with default options.
pub fn down(
    conn: &mut Connection,
    source: impl ScriptSource + 'static,
) -> Result<MigrationReport, Error> {
    SqliteMigrator::new(source).migrate_down(conn)
}

/// Migrate to `version` with default options.
pub fn to(
    conn: &mut Connection,
    source: impl ScriptSource + 'static,
    version: &str,
) -> Result<MigrationReport, Error> {
    SqliteMigrator::new(source).migrate_to(conn, version)
}
