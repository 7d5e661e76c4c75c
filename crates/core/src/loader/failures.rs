use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub module: String,
    pub exit_code: Option<i32>,
    /// Error and failure lines from the build output
    pub summary: Vec<String>,
    pub failed_at: Instant,
}

#[derive(Debug, Default)]
struct FailureState {
    /// Last failure per module, used for the rebuild cooldown
    last_failure: HashMap<String, BuildFailure>,
    /// Failures not yet shown to the user, in the order they happened
    unreported: Vec<BuildFailure>,
}

/// Modules whose build failed, shared between discovery passes.
///
/// Each module has its own cooldown: after a failure it is not rebuilt until
/// `cooldown` has elapsed, independently of other modules.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    state: Arc<Mutex<FailureState>>,
    cooldown: Duration,
}

impl FailureTracker {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(FailureState::default())),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn record(&self, failure: BuildFailure) {
        let mut state = self.lock();
        state.unreported.push(failure.clone());
        state.last_failure.insert(failure.module.clone(), failure);
    }

    pub fn is_cooling_down(&self, module: &str) -> bool {
        self.is_cooling_down_at(module, Instant::now())
    }

    pub fn is_cooling_down_at(&self, module: &str, now: Instant) -> bool {
        self.lock()
            .last_failure
            .get(module)
            .is_some_and(|failure| now.saturating_duration_since(failure.failed_at) < self.cooldown)
    }

    /// Time left before `module` may be rebuilt
    pub fn remaining_cooldown(&self, module: &str) -> Option<Duration> {
        let now = Instant::now();
        let state = self.lock();
        let failure = state.last_failure.get(module)?;
        self.cooldown
            .checked_sub(now.saturating_duration_since(failure.failed_at))
            .filter(|left| !left.is_zero())
    }

    /// Forget a module's failure, e.g. after it built successfully
    pub fn clear(&self, module: &str) {
        let mut state = self.lock();
        state.last_failure.remove(module);
        state.unreported.retain(|failure| failure.module != module);
    }

    pub fn failed_modules(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().last_failure.keys().cloned().collect();
        names.sort();
        names
    }

    /// Failures since the last call; the caller is expected to show them
    pub fn take_unreported(&self) -> Vec<BuildFailure> {
        std::mem::take(&mut self.lock().unreported)
    }

    fn lock(&self) -> MutexGuard<'_, FailureState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for FailureTracker {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(module: &str, failed_at: Instant) -> BuildFailure {
        BuildFailure {
            module: module.to_string(),
            exit_code: Some(101),
            summary: vec!["error: could not compile".to_string()],
            failed_at,
        }
    }

    #[test]
    fn test_cooldown_is_per_module() {
        let tracker = FailureTracker::new(Duration::from_secs(30));
        let start = Instant::now();
        tracker.record(failure("chess", start));

        assert!(tracker.is_cooling_down_at("chess", start + Duration::from_secs(29)));
        assert!(!tracker.is_cooling_down_at("chess", start + Duration::from_secs(30)));
        assert!(!tracker.is_cooling_down_at("checkers", start));
    }

    #[test]
    fn test_newer_failure_restarts_cooldown() {
        let tracker = FailureTracker::new(Duration::from_secs(30));
        let start = Instant::now();
        tracker.record(failure("chess", start));
        tracker.record(failure("chess", start + Duration::from_secs(20)));

        assert!(tracker.is_cooling_down_at("chess", start + Duration::from_secs(40)));
    }

    #[test]
    fn test_take_unreported_clears_only_the_report() {
        let tracker = FailureTracker::default();
        tracker.record(failure("chess", Instant::now()));
        tracker.record(failure("go", Instant::now()));

        let reported = tracker.take_unreported();
        assert_eq!(reported.len(), 2);
        assert_eq!(reported[0].module, "chess");
        assert!(tracker.take_unreported().is_empty());

        // Cooldown memory survives reporting
        assert!(tracker.is_cooling_down("chess"));
        assert_eq!(tracker.failed_modules(), vec!["chess".to_string(), "go".to_string()]);
    }

    #[test]
    fn test_clear_forgets_one_module() {
        let tracker = FailureTracker::default();
        tracker.record(failure("chess", Instant::now()));
        tracker.record(failure("go", Instant::now()));
        tracker.clear("chess");

        assert!(!tracker.is_cooling_down("chess"));
        assert!(tracker.is_cooling_down("go"));
        assert_eq!(tracker.take_unreported().len(), 1);
        assert!(tracker.remaining_cooldown("go").is_some());
        assert!(tracker.remaining_cooldown("chess").is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let tracker = FailureTracker::default();
        let shared = tracker.clone();
        shared.record(failure("chess", Instant::now()));
        assert!(tracker.is_cooling_down("chess"));
    }
}
