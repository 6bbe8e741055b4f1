use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Outcome of asking the limiter to admit one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

/// Sliding-window limiter keyed by client address.
#[derive(Debug, Clone)]
pub struct IpRateLimiter {
    state: Arc<Mutex<LimiterState>>,
    window: Duration,
    max_requests: usize,
}

#[derive(Debug, Default)]
struct LimiterState {
    hits: HashMap<String, VecDeque<Instant>>,
    last_sweep: Option<Instant>,
}

impl IpRateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(LimiterState::default())),
            window,
            max_requests,
        }
    }

    pub fn admit(&self, client: &str) -> Admission {
        self.admit_at(client, Instant::now())
    }

    /// Number of clients with hits still inside the window.
    pub fn tracked_clients(&self) -> usize {
        self.state.lock().hits.len()
    }

    fn admit_at(&self, client: &str, now: Instant) -> Admission {
        let mut state = self.state.lock();
        self.sweep(&mut state, now);

        let recent = state.hits.entry(client.to_string()).or_default();
        prune(recent, now, self.window);

        if recent.len() >= self.max_requests {
            let retry_after = recent
                .front()
                .map(|first| self.window.saturating_sub(now.saturating_duration_since(*first)))
                .unwrap_or(self.window);
            return Admission::Limited { retry_after };
        }

        recent.push_back(now);
        Admission::Allowed {
            remaining: self.max_requests - recent.len(),
        }
    }

    /// Drops clients whose hits have all aged out, at most once per window.
    fn sweep(&self, state: &mut LimiterState, now: Instant) {
        let due = state
            .last_sweep
            .map_or(true, |last| now.saturating_duration_since(last) >= self.window);
        if !due {
            return;
        }
        let window = self.window;
        state.hits.retain(|_, recent| {
            prune(recent, now, window);
            !recent.is_empty()
        });
        state.last_sweep = Some(now);
    }
}

fn prune(recent: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while recent
        .front()
        .is_some_and(|first| now.saturating_duration_since(*first) >= window)
    {
        recent.pop_front();
    }
}
