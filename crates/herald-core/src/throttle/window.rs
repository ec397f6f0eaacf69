//! Sliding-window invocation counter.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use super::Release;
use crate::error::ThrottledError;

/// Number of checks between full sweeps of expired keys.
const SWEEP_INTERVAL: u32 = 1024;

/// Admits at most `max` invocations per key within any sliding `window`.
///
/// Each key maps to the insertion-ordered timestamps of its admitted
/// invocations. A check prunes timestamps that have aged out of the window,
/// admits the invocation if fewer than `max` remain and otherwise reports how
/// long until the oldest one expires. Pruning and appending happen under a
/// single lock, so concurrent checks on one key never admit more than `max`.
///
/// Time is read from [`tokio::time::Instant`], which follows a paused test
/// clock.
pub struct TimeWindow<K> {
    max: usize,
    window: Duration,
    state: Arc<Mutex<WindowState<K>>>,
}

struct WindowState<K> {
    entries: HashMap<K, VecDeque<Stamp>>,
    next_seq: u64,
    checks_since_sweep: u32,
}

/// One admitted invocation. `seq` tells apart invocations admitted at the
/// same instant.
#[derive(Debug, Clone, Copy)]
struct Stamp {
    at: Instant,
    seq: u64,
}

impl<K> TimeWindow<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Creates a window admitting `max` invocations per key every `window`.
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max: max as usize,
            window,
            state: Arc::new(Mutex::new(WindowState {
                entries: HashMap::new(),
                next_seq: 0,
                checks_since_sweep: 0,
            })),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Counts an invocation for `key`.
    ///
    /// The returned [`Release`] removes exactly this invocation's timestamp; it
    /// does nothing if the timestamp already aged out of the window.
    pub fn check(&self, key: K) -> Result<Release, ThrottledError> {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        state.checks_since_sweep += 1;
        if state.checks_since_sweep >= SWEEP_INTERVAL {
            state.sweep(now, self.window);
        }

        let stamps = state.entries.entry(key.clone()).or_default();
        prune(stamps, now, self.window);

        if stamps.len() >= self.max {
            let wait = match stamps.front() {
                Some(oldest) => self
                    .window
                    .saturating_sub(now.saturating_duration_since(oldest.at)),
                None => self.window,
            };
            if stamps.is_empty() {
                state.entries.remove(&key);
            }
            trace!(?wait, "Invocation throttled");
            return Err(ThrottledError { wait });
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        stamps.push_back(Stamp { at: now, seq });

        let weak = Arc::downgrade(&self.state);
        Ok(Release::new(move || {
            if let Some(state) = weak.upgrade() {
                state.lock().remove(&key, seq);
            }
        }))
    }

    /// Number of invocations currently counted for `key`.
    pub fn count(&self, key: &K) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        match state.entries.get_mut(key) {
            Some(stamps) => {
                prune(stamps, now, self.window);
                stamps.len()
            }
            None => 0,
        }
    }

    /// Returns `true` if no key has a counted invocation left in the window.
    pub fn is_idle(&self) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.sweep(now, self.window);
        state.entries.is_empty()
    }
}

impl<K> WindowState<K>
where
    K: Eq + Hash,
{
    fn remove(&mut self, key: &K, seq: u64) {
        if let Some(stamps) = self.entries.get_mut(key) {
            if let Some(pos) = stamps.iter().position(|stamp| stamp.seq == seq) {
                stamps.remove(pos);
            }
            if stamps.is_empty() {
                self.entries.remove(key);
            }
        }
    }

    fn sweep(&mut self, now: Instant, window: Duration) {
        self.entries.retain(|_, stamps| {
            prune(stamps, now, window);
            !stamps.is_empty()
        });
        self.checks_since_sweep = 0;
    }
}

/// Drops timestamps whose age reached `window` from the front of `stamps`.
fn prune(stamps: &mut VecDeque<Stamp>, now: Instant, window: Duration) {
    while let Some(front) = stamps.front() {
        if now.saturating_duration_since(front.at) < window {
            break;
        }
        stamps.pop_front();
    }
}

impl<K> fmt::Debug for TimeWindow<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeWindow")
            .field("max", &self.max)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test(start_paused = true)]
    async fn test_window_admits_max_then_throttles() {
        let window = TimeWindow::new(2, Duration::from_secs(30));

        assert_ok!(window.check("k"));
        assert_ok!(window.check("k"));

        advance(Duration::from_secs(10)).await;
        let err = assert_err!(window.check("k"));
        assert_eq!(err.wait, Duration::from_secs(20));

        advance(Duration::from_secs(21)).await;
        assert_ok!(window.check("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_undoes_count() {
        let window = TimeWindow::new(1, Duration::from_secs(30));

        let release = assert_ok!(window.check(1_u64));
        release.release();
        assert_eq!(window.count(&1), 0);
        assert_ok!(window.check(1_u64));
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_after_prune_is_noop() {
        let window = TimeWindow::new(1, Duration::from_secs(10));

        let stale = assert_ok!(window.check("k"));
        advance(Duration::from_secs(11)).await;
        let _fresh = assert_ok!(window.check("k"));

        // The stale timestamp already aged out; releasing it must not remove
        // the fresh one.
        stale.release();
        assert_err!(window.check("k"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let window = TimeWindow::new(1, Duration::from_secs(5));

        assert_ok!(window.check("a"));
        assert_ok!(window.check("b"));
        assert_err!(window.check("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_after_window_passes() {
        let window = TimeWindow::new(3, Duration::from_secs(5));
        assert_ok!(window.check("a"));
        assert!(!window.is_idle());

        advance(Duration::from_secs(5)).await;
        assert!(window.is_idle());
    }

    #[test]
    fn test_zero_max_always_throttles() {
        let window = TimeWindow::new(0, Duration::from_secs(3));
        let err = assert_err!(window.check("k"));
        assert_eq!(err.wait, Duration::from_secs(3));
    }

    #[test]
    fn test_concurrent_checks_never_exceed_max() {
        let window = TimeWindow::new(5, Duration::from_secs(60));
        let admitted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| scope.spawn(|| window.check("shared").is_ok()))
                .collect();
            handles
                .into_iter()
                .map(|h| usize::from(h.join().unwrap()))
                .sum()
        });
        assert_eq!(admitted, 5);
    }
}
