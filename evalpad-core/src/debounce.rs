/// Trailing-edge debounce over millisecond timestamps.
///
/// `Idle → Pending(deadline) → Idle`. Every [`touch`](Self::touch) while
/// pending pushes the deadline out; [`poll`](Self::poll) fires exactly once
/// when the deadline has passed. The caller supplies the clock, which keeps
/// the state machine identical in the browser, on the desktop and in tests.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay_ms: u64,
    deadline: Option<u64>,
}

impl Debouncer {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            deadline: None,
        }
    }

    /// Record an event at `now`, re-arming the timer.
    pub fn touch(&mut self, now: u64) {
        self.deadline = Some(now.saturating_add(self.delay_ms));
    }

    /// Returns `true` once when the quiet period has elapsed.
    pub fn poll(&mut self, now: u64) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }
}
