//! The Control Plane (§4.6): a single atomic `transcribing` flag that every
//! write path — GUI toggle, CLI verb, state-file watcher — goes through, so
//! persistence to the external state file and reset semantics happen in
//! exactly one place.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The user-visible transcribing switch (§3 "Run Flag").
///
/// `RunFlag` itself only tracks the boolean and notifies a persistence
/// callback of writes; it does not know about the lookback buffer or
/// recognizer — those resets are the caller's responsibility on a
/// false→true or true→false edge (see [`RunFlag::set`]'s return value).
pub struct RunFlag {
    transcribing: AtomicBool,
    on_change: Box<dyn Fn(bool) + Send + Sync>,
}

/// What changed on a `set` call, so the caller can apply start/stop
/// semantics (§4.6: "a false→true transition clears the lookback... a
/// true→false drops any pending process-async and requests reset").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    None,
    StartedTranscribing,
    StoppedTranscribing,
}

impl RunFlag {
    /// `on_change` is invoked (off the audio path) every time the flag's
    /// value actually changes, so the caller can persist it to the external
    /// state file. It is not called on a same-value `set`.
    pub fn new(initial: bool, on_change: impl Fn(bool) + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            transcribing: AtomicBool::new(initial),
            on_change: Box::new(on_change),
        })
    }

    pub fn get(&self) -> bool {
        self.transcribing.load(Ordering::Acquire)
    }

    /// Set the flag, persisting through `on_change` on an actual edge and
    /// reporting which edge (if any) occurred.
    pub fn set(&self, value: bool) -> Transition {
        let previous = self.transcribing.swap(value, Ordering::AcqRel);
        if previous == value {
            return Transition::None;
        }
        (self.on_change)(value);
        if value {
            Transition::StartedTranscribing
        } else {
            Transition::StoppedTranscribing
        }
    }

    /// Flip the flag and return the transition, as `set` does.
    pub fn toggle(&self) -> Transition {
        loop {
            let current = self.transcribing.load(Ordering::Acquire);
            if self
                .transcribing
                .compare_exchange(current, !current, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                (self.on_change)(!current);
                return if !current {
                    Transition::StartedTranscribing
                } else {
                    Transition::StoppedTranscribing
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn set_to_same_value_does_not_persist() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = Arc::clone(&log);
        let flag = RunFlag::new(false, move |v| log2.lock().unwrap().push(v));
        assert_eq!(flag.set(false), Transition::None);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn set_edge_persists_and_reports_transition() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = Arc::clone(&log);
        let flag = RunFlag::new(false, move |v| log2.lock().unwrap().push(v));
        assert_eq!(flag.set(true), Transition::StartedTranscribing);
        assert_eq!(flag.set(false), Transition::StoppedTranscribing);
        assert_eq!(*log.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn toggle_flips_and_reports_transition() {
        let flag = RunFlag::new(false, |_| {});
        assert_eq!(flag.toggle(), Transition::StartedTranscribing);
        assert!(flag.get());
        assert_eq!(flag.toggle(), Transition::StoppedTranscribing);
        assert!(!flag.get());
    }
}
