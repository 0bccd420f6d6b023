//! Debounced input gate for the search box.
//!
//! Raw keystrokes restart a quiescence timer; only a value that survives the
//! whole window without being replaced, and that differs from the last
//! committed value, is emitted.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Default)]
struct GateState {
    committed: String,
    generation: u64,
    pending: Option<JoinHandle<()>>,
    disposed: bool,
}

impl GateState {
    fn cancel_pending(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

/// Rate-limits raw text input into committed values.
///
/// Must be driven from within a Tokio runtime. Dropping the gate disposes it.
#[derive(Debug)]
pub struct DebouncedInput {
    window: Duration,
    state: Arc<Mutex<GateState>>,
    tx: mpsc::UnboundedSender<String>,
}

impl DebouncedInput {
    /// Create a gate whose last committed value is `committed`
    pub fn new(
        window: Duration,
        committed: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let gate = Self {
            window,
            state: Arc::new(Mutex::new(GateState {
                committed: committed.into(),
                ..Default::default()
            })),
            tx,
        };
        (gate, rx)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Feed a raw value, cancelling any pending emission
    pub fn push(&self, value: impl Into<String>) {
        let value = value.into();
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        state.cancel_pending();

        let generation = state.generation;
        let deadline = Instant::now() + self.window;
        let shared = Arc::clone(&self.state);
        let tx = self.tx.clone();

        state.pending = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            let mut state = shared.lock();
            if state.disposed || state.generation != generation {
                return;
            }
            state.pending = None;
            if state.committed != value {
                debug!(search = %value, "Search input committed");
                state.committed = value.clone();
                let _ = tx.send(value);
            }
        }));
    }

    /// Adopt a value committed elsewhere (e.g. a cleared filter) without emitting
    pub fn sync(&self, committed: impl Into<String>) {
        let mut state = self.state.lock();
        state.cancel_pending();
        state.committed = committed.into();
    }

    pub fn committed(&self) -> String {
        self.state.lock().committed.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    /// Cancel the pending timer; later input is ignored
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        state.cancel_pending();
        state.disposed = true;
    }
}

impl Drop for DebouncedInput {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(400);

    #[tokio::test(start_paused = true)]
    async fn test_burst_commits_last_value_once() {
        let (gate, mut rx) = DebouncedInput::new(WINDOW, "");
        let start = Instant::now();

        gate.push("a");
        tokio::time::advance(Duration::from_millis(100)).await;
        gate.push("ab");
        tokio::time::advance(Duration::from_millis(100)).await;
        gate.push("abc");

        let committed = rx.recv().await.unwrap();
        let elapsed = start.elapsed();
        assert_eq!(committed, "abc");
        assert!(elapsed >= Duration::from_millis(600), "{:?}", elapsed);
        assert!(elapsed <= Duration::from_millis(601), "{:?}", elapsed);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(gate.committed(), "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_value_is_not_recommitted() {
        let (gate, mut rx) = DebouncedInput::new(WINDOW, "db");

        gate.push("dbx");
        tokio::time::advance(Duration::from_millis(100)).await;
        gate.push("db");
        tokio::time::advance(Duration::from_secs(1)).await;

        assert!(rx.try_recv().is_err());
        assert!(!gate.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_cancels_pending_emission() {
        let (gate, mut rx) = DebouncedInput::new(WINDOW, "");

        gate.push("outage");
        assert!(gate.is_pending());
        gate.dispose();

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());

        gate.push("ignored");
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sync_cancels_and_adopts_value() {
        let (gate, mut rx) = DebouncedInput::new(WINDOW, "old");

        gate.push("typed");
        gate.sync("");
        tokio::time::advance(Duration::from_secs(1)).await;

        assert!(rx.try_recv().is_err());
        assert_eq!(gate.committed(), "");
    }
}
