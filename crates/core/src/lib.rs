//! Core library for the timetree scheduler.
//!
//! A tree of timelines, each owning an ordered set of time-positioned
//! events, is driven by a periodic tick. Every tick the playhead travels down
//! the tree: each timeline hands its children the time elapsed since their
//! own start, scaled by their playback rate, and nested timelines repeat the
//! process for their own children.
//!
//! Everything runs on a single thread. Events are shared through `Rc`
//! handles and keep only a weak link to the timeline that owns them.

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod stage;
pub mod timeline;

pub use clock::{ListenerId, Tick, Ticker};
pub use config::{StageConfig, TimelineOptions, UnitKind};
pub use error::{Result, SchedulerError};
pub use event::{validate, Attachment, EventPhase, EventRef, Schedulable, TimeEvent};
pub use stage::Stage;
pub use timeline::{summarize, EventSummary, Timeline};
