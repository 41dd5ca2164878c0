//! Applying one script inside one transaction.
//!
//! ```text
//! Idle -> TxOpen -> [Before] -> VersionUpdated -> ScriptRun -> [After] -> Committed
//!            \__________\_____________\______________\___________\---> RolledBack
//! ```

use crate::core::Step;
use crate::error::{ApplyPhase, Error};
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

/// The parts of a driver transaction the migrator needs.
///
/// Every implementing type rolls back when dropped without a commit, so a transaction
/// is released even if the migrator itself unwinds.
pub(crate) trait ScriptTransaction: Sized {
    /// Execute one or more statements.
    fn execute_script(&mut self, sql: &str) -> Result<(), Error>;
    fn commit_script(self) -> Result<(), Error>;
    fn rollback_script(self) -> Result<(), Error>;
}

/// Run `before`, the version update, the script and `after` in `tx`, then commit.
///
/// Any failure or panic in between rolls the transaction back. If the rollback fails
/// too, both errors are returned together as [Error::Rollback].
pub(crate) fn apply_script<T, B, A>(
    mut tx: T,
    step: &Step,
    set_version: &str,
    content: &str,
    before: B,
    after: A,
) -> Result<(), Error>
where
    T: ScriptTransaction,
    B: FnOnce(&mut T) -> Result<(), Error>,
    A: FnOnce(&mut T) -> Result<(), Error>,
{
    let phase = Cell::new(ApplyPhase::Before);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<(), Error> {
        before(&mut tx).map_err(|e| step.error(ApplyPhase::Before, e))?;
        phase.set(ApplyPhase::Run);
        tx.execute_script(set_version)
            .map_err(|e| step.error(ApplyPhase::Run, e))?;
        tx.execute_script(content)
            .map_err(|e| step.error(ApplyPhase::Run, e))?;
        phase.set(ApplyPhase::After);
        after(&mut tx).map_err(|e| step.error(ApplyPhase::After, e))
    }));

    let result = match outcome {
        Ok(result) => result,
        Err(payload) => Err(step.error(phase.get(), Error::Panic(panic_message(payload)))),
    };

    match result {
        Ok(()) => tx
            .commit_script()
            .map_err(|e| step.error(ApplyPhase::Commit, e)),
        Err(error) => Err(rollback(tx, error)),
    }
}

fn rollback<T: ScriptTransaction>(tx: T, original: Error) -> Error {
    match tx.rollback_script() {
        Ok(()) => original,
        Err(rollback) => Error::Rollback {
            original: Box::new(original),
            rollback: Box::new(rollback),
        },
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
