use serde::{Deserialize, Serialize};

/// Notification emitted by the [`Ticker`] on every step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Milliseconds elapsed since the ticker started.
    pub time: f64,
    /// Number of ticks emitted so far, this one included.
    pub frame: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(Tick)>;

/// Deterministic clock that is stepped explicitly by its host.
///
/// Listeners are notified in registration order, each tick running to
/// completion before the next one starts.
#[derive(Default)]
pub struct Ticker {
    current: Tick,
    next_listener: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

impl Ticker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: impl FnMut(Tick) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` when `id` was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _)| *listener != id);
        self.listeners.len() != before
    }

    /// Moves time forward by `delta_ms` and notifies every listener.
    pub fn advance(&mut self, delta_ms: f64) -> Tick {
        self.current = Tick {
            time: (self.current.time + delta_ms).max(0.0),
            frame: self.current.frame + 1,
        };
        tracing::trace!(time = self.current.time, frame = self.current.frame, "tick");

        let tick = self.current;
        for (_, listener) in &mut self.listeners {
            listener(tick);
        }
        tick
    }

    /// Rewinds to the origin without notifying listeners.
    pub fn reset(&mut self) {
        self.current = Tick::default();
    }

    pub fn current(&self) -> Tick {
        self.current
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for Ticker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticker")
            .field("current", &self.current)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
