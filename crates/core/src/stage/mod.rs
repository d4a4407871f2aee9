//! Process-scoped state: the ticker and the two root timelines it drives.

use std::rc::Rc;

use crate::{
    clock::{ListenerId, Tick, Ticker},
    Schedulable, StageConfig, Timeline, TimelineOptions,
};

/// Owns the ticker and the time and frame root timelines.
///
/// Build one with [`Stage::init`] at startup and pass it to whatever needs to
/// schedule events or drive time.
#[derive(Debug)]
pub struct Stage {
    ticker: Ticker,
    root: Rc<Timeline>,
    frame_root: Rc<Timeline>,
    listener: ListenerId,
}

impl Stage {
    /// Creates both roots and subscribes them to the ticker. On every tick
    /// the time root renders the elapsed time, then the frame root renders
    /// the frame count.
    pub fn init() -> Self {
        let mut ticker = Ticker::new();
        let root = Timeline::new(TimelineOptions::default());
        let frame_root = Timeline::new(TimelineOptions::in_frames());

        let time_target = root.clone();
        let frame_target = frame_root.clone();
        let listener = ticker.add_listener(move |tick| {
            time_target.render(tick.time);
            frame_target.render(tick.frame as f64);
        });

        tracing::info!("stage initialised");
        Self {
            ticker,
            root,
            frame_root,
            listener,
        }
    }

    /// Root timeline counting milliseconds.
    pub fn root(&self) -> &Rc<Timeline> {
        &self.root
    }

    /// Root timeline counting frames.
    pub fn frame_root(&self) -> &Rc<Timeline> {
        &self.frame_root
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    /// Exposes the ticker so hosts can register extra listeners.
    pub fn ticker_mut(&mut self) -> &mut Ticker {
        &mut self.ticker
    }

    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    pub fn tick(&mut self, delta_ms: f64) -> Tick {
        self.ticker.advance(delta_ms)
    }

    /// Emits `config.ticks` ticks spaced by `config.frame_interval_ms`.
    pub fn run(&mut self, config: &StageConfig) -> Tick {
        tracing::debug!(
            ticks = config.ticks,
            interval = config.frame_interval_ms,
            "running stage"
        );
        for _ in 0..config.ticks {
            self.tick(config.frame_interval_ms);
        }
        self.ticker.current()
    }
}
