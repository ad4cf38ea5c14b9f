// SPDX-License-Identifier: GPL-3.0-only

//! Guarded configuration values
//!
//! A [`ConfigurableProperty`] owns one committed value. Writes go through a
//! fixed pipeline:
//!
//! 1. `predicate(old, new)`: a `false` result ends the write with no side effects
//! 2. `apply(old, new)`: caller-supplied platform call; an error aborts the write
//! 3. `dispose(old)`: best-effort cleanup, failures are logged and ignored
//! 4. commit: readers see the new value from here on
//! 5. `effect(new)`
//! 6. observers are notified

use crate::errors::{SessionError, SessionResult, WriteOutcome};
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{debug, warn};

pub type Predicate<T> = Box<dyn Fn(&T, &T) -> bool + Send + Sync>;
pub type Dispose<T> = Box<dyn Fn(&T) -> SessionResult<()> + Send + Sync>;
pub type Effect<T> = Box<dyn Fn(&T) + Send + Sync>;

/// A committed configuration value with predicate/dispose/effect hooks
pub struct ConfigurableProperty<T> {
    name: &'static str,
    value: RwLock<T>,
    /// Serializes writers; readers only ever take `value` briefly
    write_lock: Mutex<()>,
    predicate: Predicate<T>,
    dispose: Option<Dispose<T>>,
    effect: Option<Effect<T>>,
    notifier: watch::Sender<T>,
    closed: AtomicBool,
}

impl<T> ConfigurableProperty<T>
where
    T: Clone + PartialEq + Debug + Send + Sync + 'static,
{
    /// Create a property whose predicate accepts any value different from the current one
    pub fn new(name: &'static str, initial: T) -> Self {
        let (notifier, _) = watch::channel(initial.clone());
        Self {
            name,
            value: RwLock::new(initial),
            write_lock: Mutex::new(()),
            predicate: Box::new(|old, new| old != new),
            dispose: None,
            effect: None,
            notifier,
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_predicate(mut self, predicate: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        self.predicate = Box::new(predicate);
        self
    }

    pub fn with_dispose(
        mut self,
        dispose: impl Fn(&T) -> SessionResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.dispose = Some(Box::new(dispose));
        self
    }

    pub fn with_effect(mut self, effect: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.effect = Some(Box::new(effect));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last fully committed value
    pub fn read(&self) -> T {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Receiver notified after every accepted write
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.notifier.subscribe()
    }

    /// Check if writing `new` would pass the predicate
    pub fn would_change(&self, new: &T) -> bool {
        (self.predicate)(&self.read(), new)
    }

    /// Write without any platform side effect
    pub fn write(&self, new: T) -> SessionResult<WriteOutcome> {
        self.try_write(new, |_, _| Ok(()))
    }

    /// Write, running `apply` between the predicate and the commit
    ///
    /// When `apply` fails nothing is disposed or committed and the error is
    /// returned unchanged.
    pub fn try_write<F>(&self, new: T, apply: F) -> SessionResult<WriteOutcome>
    where
        F: FnOnce(&T, &T) -> SessionResult<()>,
    {
        if self.is_closed() {
            return Err(SessionError::LifecycleViolation(format!(
                "{} written after dispose",
                self.name
            )));
        }

        let _writer = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.read();

        if !(self.predicate)(&current, &new) {
            return Ok(WriteOutcome::Unchanged);
        }

        apply(&current, &new)?;

        if let Some(dispose) = &self.dispose
            && let Err(e) = dispose(&current)
        {
            warn!(property = self.name, error = %e, "Dispose failed, committing anyway");
        }

        *self.value.write().unwrap_or_else(PoisonError::into_inner) = new.clone();
        debug!(property = self.name, old = ?current, new = ?new, "Committed");

        if let Some(effect) = &self.effect {
            effect(&new);
        }
        self.notifier.send_replace(new);

        Ok(WriteOutcome::Applied)
    }

    /// Refuse all further writes
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<T: Debug> Debug for ConfigurableProperty<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurableProperty")
            .field("name", &self.name)
            .field("value", &*self.value.read().unwrap_or_else(PoisonError::into_inner))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    type Log = Arc<Mutex<Vec<String>>>;

    fn logged_property(log: &Log) -> ConfigurableProperty<i32> {
        let dispose_log = Arc::clone(log);
        let effect_log = Arc::clone(log);
        ConfigurableProperty::new("level", 1)
            .with_dispose(move |old| {
                dispose_log.lock().unwrap().push(format!("dispose {}", old));
                Ok(())
            })
            .with_effect(move |new| effect_log.lock().unwrap().push(format!("effect {}", new)))
    }

    #[test]
    fn test_write_runs_dispose_then_effect() {
        let log = Log::default();
        let property = logged_property(&log);
        let mut rx = property.subscribe();

        assert_eq!(property.write(5).unwrap(), WriteOutcome::Applied);
        assert_eq!(property.read(), 5);
        assert_eq!(*log.lock().unwrap(), vec!["dispose 1", "effect 5"]);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 5);
    }

    #[test]
    fn test_equal_write_is_silent() {
        let log = Log::default();
        let property = logged_property(&log);
        let rx = property.subscribe();

        assert_eq!(property.write(1).unwrap(), WriteOutcome::Unchanged);
        assert!(log.lock().unwrap().is_empty());
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_apply_failure_aborts_commit() {
        let log = Log::default();
        let property = logged_property(&log);

        let result = property.try_write(9, |_, _| {
            Err(SessionError::UnsupportedValue("nope".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(property.read(), 1);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dispose_failure_does_not_block_commit() {
        let property = ConfigurableProperty::new("level", 1)
            .with_dispose(|_| Err(SessionError::Config("cleanup failed".to_string())));

        assert_eq!(property.write(2).unwrap(), WriteOutcome::Applied);
        assert_eq!(property.read(), 2);
    }

    #[test]
    fn test_custom_predicate() {
        let property = ConfigurableProperty::new("zoom", 1.0f32)
            .with_predicate(|old: &f32, new: &f32| (old - new).abs() > 0.01);

        assert_eq!(property.write(1.001).unwrap(), WriteOutcome::Unchanged);
        assert!(property.would_change(&2.0));
        assert_eq!(property.write(2.0).unwrap(), WriteOutcome::Applied);
    }

    #[test]
    fn test_closed_property_rejects_writes() {
        let property = ConfigurableProperty::new("torch", false);
        property.close();
        let err = property.write(true).unwrap_err();
        assert!(err.is_lifecycle());
        assert!(!property.read());
    }
}
