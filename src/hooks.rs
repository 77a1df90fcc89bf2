//! Lifecycle hooks around a run and around each batch.
//!
//! All methods default to no-ops; implementations override what they need.
//! The per-batch pair takes `&mut self` so an implementation can hold state
//! opened in [`before_batch`](LifecycleHooks::before_batch) and release it in
//! [`after_batch`](LifecycleHooks::after_batch), a connection or transaction
//! being the typical case.

use crate::logger::ProgressLogger;
use crate::BoxError;

/// Hooks invoked around the whole run and around each batch of items.
///
/// `before_first_command` and `after_last_command` run only in the
/// coordinator; the batch pair runs wherever items are processed. Hook
/// errors abort the run and propagate to the caller unmodified.
pub trait LifecycleHooks: Send {
    /// Runs once before any item is dispatched.
    ///
    /// # Errors
    ///
    /// Implementation-defined; aborts the run.
    fn before_first_command(&mut self, logger: &dyn ProgressLogger) -> Result<(), BoxError> {
        let _ = logger;
        Ok(())
    }

    /// Runs once after all work has finished.
    ///
    /// # Errors
    ///
    /// Implementation-defined; aborts the run.
    fn after_last_command(&mut self, logger: &dyn ProgressLogger) -> Result<(), BoxError> {
        let _ = logger;
        Ok(())
    }

    /// Runs before each batch, with the batch about to be processed.
    ///
    /// # Errors
    ///
    /// Implementation-defined; aborts the run.
    fn before_batch(
        &mut self,
        batch: &[String],
        logger: &dyn ProgressLogger,
    ) -> Result<(), BoxError> {
        let _ = (batch, logger);
        Ok(())
    }

    /// Runs after each batch, with the batch that was just processed.
    ///
    /// Not reached when an earlier hook or the progress channel failed
    /// mid-batch; per-item failures do not prevent it.
    ///
    /// # Errors
    ///
    /// Implementation-defined; aborts the run.
    fn after_batch(
        &mut self,
        batch: &[String],
        logger: &dyn ProgressLogger,
    ) -> Result<(), BoxError> {
        let _ = (batch, logger);
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl LifecycleHooks for NoopHooks {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NullLogger;

    #[test]
    fn test_noop_hooks_succeed() {
        let mut hooks = NoopHooks;
        let batch = vec!["a".to_string()];
        assert!(hooks.before_first_command(&NullLogger).is_ok());
        assert!(hooks.before_batch(&batch, &NullLogger).is_ok());
        assert!(hooks.after_batch(&batch, &NullLogger).is_ok());
        assert!(hooks.after_last_command(&NullLogger).is_ok());
    }
}
