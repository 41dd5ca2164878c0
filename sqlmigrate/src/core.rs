use crate::error::{ApplyPhase, Error};
use crate::source::{list_scripts, ScriptSource};
use crate::sql::TableName;
use std::fmt;
use std::time::{Duration, Instant};

/// A migration version, taken from a script filename.
///
/// Versions compare as strings, so `"10"` sorts before `"9"`: pick a naming scheme
/// (zero-padded numbers, timestamps) where string order is the order you want.
/// The empty version means no migrations are applied and sorts before all others.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(String);

impl Version {
    pub(crate) fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The "nothing applied" version.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("\"\"")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl PartialEq<str> for Version {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Version {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Whether a script applies (`up`) or reverts (`down`) a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

/// A migration script found in a [ScriptSource].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// The filename, e.g. `2.up.sql`.
    pub name: String,
    /// The version parsed from the filename.
    pub version: Version,
    pub direction: Direction,
}

/// One script to apply, and the version the table holds once it commits.
///
/// For `up` scripts `record` is the script's own version. For `down` scripts it is
/// the version of the next lower `down` script, or the empty version for the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub script: Script,
    pub record: Version,
}

impl Step {
    pub(crate) fn error(&self, phase: ApplyPhase, source: Error) -> Error {
        Error::Apply {
            phase,
            script: self.script.name.clone(),
            version: self.script.version.clone(),
            source: Box::new(source),
        }
    }
}

/// A report of the scripts applied by one migrator operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// `None` when the operation had nothing to decide, e.g. migrating to the current version.
    pub direction: Option<Direction>,
    /// The version before the operation.
    pub from: Version,
    /// The version after the operation.
    pub to: Version,
    /// Filenames of the scripts applied, in order.
    pub scripts_run: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Operation<'a> {
    Up,
    Down,
    To(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Plan {
    pub direction: Option<Direction>,
    pub steps: Vec<Step>,
}

/// Steps that apply every `up` script above `current`, stopping after `target`.
fn steps_up(current: &Version, scripts: Vec<Script>, target: Option<&Version>) -> Vec<Step> {
    scripts
        .into_iter()
        .filter(|script| &script.version > current)
        .take_while(|script| target.map_or(true, |target| &script.version <= target))
        .map(|script| Step {
            record: script.version.clone(),
            script,
        })
        .collect()
}

/// Steps that revert every `down` script at or below `current`, newest first,
/// stopping before `target`.
fn steps_down(current: &Version, scripts: Vec<Script>, target: Option<&Version>) -> Vec<Step> {
    let mut steps = Vec::new();
    for (i, script) in scripts.iter().enumerate().rev() {
        if &script.version > current {
            continue;
        }
        if target.is_some_and(|target| &script.version <= target) {
            break;
        }
        let record = scripts[..i]
            .last()
            .map(|previous| previous.version.clone())
            .unwrap_or_default();
        steps.push(Step {
            script: script.clone(),
            record,
        });
    }
    steps
}

type StartHook = Box<dyn Fn(&Script, &Version) + Send + Sync>;
type CompleteHook = Box<dyn Fn(&Script, &Version, Duration) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&Script, &Error) + Send + Sync>;

/// Shared migrator logic between different database types.
pub(crate) struct GenericMigrator {
    pub source: Box<dyn ScriptSource>,
    pub table: TableName,
    pub on_migration_start: Option<StartHook>,
    pub on_migration_complete: Option<CompleteHook>,
    pub on_migration_error: Option<ErrorHook>,
}

// Manual Debug impl since closures don't implement Debug
impl fmt::Debug for GenericMigrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericMigrator")
            .field("table", &self.table)
            .field("on_migration_start", &self.on_migration_start.is_some())
            .field(
                "on_migration_complete",
                &self.on_migration_complete.is_some(),
            )
            .field("on_migration_error", &self.on_migration_error.is_some())
            .finish_non_exhaustive()
    }
}

impl GenericMigrator {
    pub fn new(source: impl ScriptSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            table: TableName::default(),
            on_migration_start: None,
            on_migration_complete: None,
            on_migration_error: None,
        }
    }

    /// Validate and set the version table name.
    pub fn set_table_name(&mut self, name: impl Into<String>) -> Result<(), Error> {
        self.table = TableName::parse(name)?;
        Ok(())
    }

    pub fn set_on_migration_start(
        &mut self,
        callback: impl Fn(&Script, &Version) + Send + Sync + 'static,
    ) {
        self.on_migration_start = Some(Box::new(callback));
    }

    pub fn set_on_migration_complete(
        &mut self,
        callback: impl Fn(&Script, &Version, Duration) + Send + Sync + 'static,
    ) {
        self.on_migration_complete = Some(Box::new(callback));
    }

    pub fn set_on_migration_error(&mut self, callback: impl Fn(&Script, &Error) + Send + Sync + 'static) {
        self.on_migration_error = Some(Box::new(callback));
    }

    pub fn scripts(&self, direction: Direction) -> Result<Vec<Script>, Error> {
        list_scripts(self.source.as_ref(), direction)
    }

    /// Work out which scripts an operation applies from `current`, without touching the database.
    /// Fails with [Error::VersionNotFound] if a `to` target is not among the scripts.
    pub fn plan(&self, current: &Version, operation: Operation<'_>) -> Result<Plan, Error> {
        let plan = match operation {
            Operation::Up => Plan {
                direction: Some(Direction::Up),
                steps: steps_up(current, self.scripts(Direction::Up)?, None),
            },
            Operation::Down => Plan {
                direction: Some(Direction::Down),
                steps: steps_down(current, self.scripts(Direction::Down)?, None),
            },
            Operation::To(target) if target == current.as_str() => Plan {
                direction: None,
                steps: Vec::new(),
            },
            Operation::To("") => return self.plan(current, Operation::Down),
            Operation::To(target) => {
                let target = Version::new(target);
                let direction = if &target > current {
                    Direction::Up
                } else {
                    Direction::Down
                };
                let scripts = self.scripts(direction)?;
                if !scripts.iter().any(|script| script.version == target) {
                    return Err(Error::VersionNotFound(target.as_str().to_string()));
                }
                let steps = match direction {
                    Direction::Up => steps_up(current, scripts, Some(&target)),
                    Direction::Down => steps_down(current, scripts, Some(&target)),
                };
                Plan {
                    direction: Some(direction),
                    steps,
                }
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            current_version = %current,
            direction = ?plan.direction,
            steps = ?plan.steps.iter().map(|s| s.script.name.as_str()).collect::<Vec<_>>(),
            "Planned migration"
        );

        Ok(plan)
    }

    /// Apply the steps of `plan` in order, stopping at the first failure.
    ///
    /// `apply` receives each step with its script content and must run it in a
    /// transaction of its own.
    pub fn run<F>(&self, from: Version, plan: Plan, mut apply: F) -> Result<MigrationReport, Error>
    where
        F: FnMut(&Step, &str) -> Result<(), Error>,
    {
        let mut report = MigrationReport {
            direction: plan.direction,
            to: from.clone(),
            from,
            scripts_run: Vec::new(),
        };

        for step in plan.steps {
            #[cfg(feature = "tracing")]
            let _span = tracing::info_span!(
                "migration",
                direction = %step.script.direction,
                script = %step.script.name,
                record = %step.record
            )
            .entered();

            #[cfg(feature = "tracing")]
            tracing::info!("Starting migration");

            if let Some(ref callback) = self.on_migration_start {
                callback(&step.script, &step.record);
            }

            let started = Instant::now();
            let result = self
                .source
                .read(&step.script.name)
                .map_err(|e| step.error(ApplyPhase::Read, e))
                .and_then(|content| apply(&step, &content));

            match result {
                Ok(()) => {
                    let elapsed = started.elapsed();

                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        duration_ms = elapsed.as_millis(),
                        "Migration completed successfully"
                    );

                    if let Some(ref callback) = self.on_migration_complete {
                        callback(&step.script, &step.record, elapsed);
                    }
                    report.to = step.record;
                    report.scripts_run.push(step.script.name);
                }
                Err(error) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(error = %error, "Migration failed");

                    if let Some(ref callback) = self.on_migration_error {
                        callback(&step.script, &error);
                    }
                    return Err(error);
                }
            }
        }

        Ok(report)
    }
}
