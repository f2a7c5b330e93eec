use parking_lot::{Condvar, Mutex};

/// What a woken worker does with the token it was woken for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token {
    /// A job was taken, or the wake-up was stale.
    Consume,
    /// Leave the count untouched.
    Keep,
    /// Leave the count untouched and wake everyone else to look.
    PassOn,
}

#[derive(Debug, Default)]
struct NotifierState {
    tokens: usize,
    closed: bool,
}

/// Counting semaphore that wakes as many workers as there are new jobs.
///
/// This lock is the outermost of the scheduler's three: code holding it may
/// take the registry and queue locks, never the other way round.
#[derive(Debug)]
pub(crate) struct Notifier {
    state: Mutex<NotifierState>,
    cond: Condvar,
    /// Signals at or above this many tokens wake every waiter at once.
    broadcast_at: usize,
}

impl Notifier {
    pub(crate) fn new(workers: usize) -> Self {
        Self {
            state: Mutex::new(NotifierState::default()),
            cond: Condvar::new(),
            broadcast_at: workers.max(1),
        }
    }

    /// Add `n` tokens and wake up to `n` waiting workers.
    pub(crate) fn signal(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut state = self.state.lock();
        state.tokens += n;
        if n >= self.broadcast_at {
            self.cond.notify_all();
        } else {
            for _ in 0..n {
                self.cond.notify_one();
            }
        }
    }

    /// Wake every waiter for good. Waiting no longer blocks after this.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.cond.notify_all();
    }

    /// Block until a token is available (or the notifier is closed), then run
    /// `take` with the notifier lock held.
    pub(crate) fn wait_for<T>(&self, take: impl FnOnce() -> (Token, T)) -> T {
        let mut state = self.state.lock();
        while state.tokens == 0 && !state.closed {
            self.cond.wait(&mut state);
        }

        let (token, value) = take();
        match token {
            Token::Consume => state.tokens = state.tokens.saturating_sub(1),
            Token::Keep => {}
            Token::PassOn => {
                self.cond.notify_all();
            }
        }
        value
    }

    /// Run `f` with the notifier lock held without waiting. If `f` reports
    /// that it removed a queued job, that job's token is consumed.
    pub(crate) fn locked<T>(&self, f: impl FnOnce() -> (bool, T)) -> T {
        let mut state = self.state.lock();
        let (consume, value) = f();
        if consume {
            state.tokens = state.tokens.saturating_sub(1);
        }
        value
    }

    #[cfg(test)]
    pub(crate) fn tokens(&self) -> usize {
        self.state.lock().tokens
    }
}
