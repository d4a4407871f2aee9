use crate::config::UnitKind;

/// Result alias that carries the custom [`SchedulerError`] type.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The event reports values a timeline cannot place: a NaN duration, a
    /// negative leaf duration, or a non-finite scale.
    #[error("invalid time event: {0}")]
    InvalidEvent(&'static str),
    /// A time based event was offered to a frame based timeline or the
    /// other way around.
    #[error("cannot add a time event with {found} to a timeline with {expected}")]
    UnitKindMismatch { expected: UnitKind, found: UnitKind },
    /// The event already belongs to another timeline and has to be detached
    /// first.
    #[error("time event is already attached to another timeline")]
    AlreadyAttachedElsewhere,
    /// A playback rate of zero would give the event an unbounded length.
    #[error("time event scale must be non-zero")]
    DegenerateScale,
    /// The timeline would end up containing itself.
    #[error("a timeline cannot be added to itself or to one of its descendants")]
    CyclicAttachment,
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed configuration documents.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
