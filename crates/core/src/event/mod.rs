//! The contract every unit placed on a [`Timeline`] has to satisfy, plus a
//! general purpose leaf event.
//!
//! Events are shared between whoever authored them and the timeline that
//! owns them, so every method takes `&self` and implementors keep their
//! state behind cells. Identity is the address of the shared allocation:
//! two events with identical values are still distinct children.

use std::{
    cell::{Cell, RefCell},
    fmt,
    rc::{Rc, Weak},
};

use serde::{Deserialize, Serialize};

use crate::{config::UnitKind, Result, SchedulerError, Timeline, TimelineOptions};

/// Shared handle to anything that can sit on a timeline.
pub type EventRef = Rc<dyn Schedulable>;

/// Address used to compare events by identity.
pub(crate) fn address<T: ?Sized>(value: &T) -> *const () {
    value as *const T as *const ()
}

/// Non-owning link from an event back to the timeline holding it.
#[derive(Default)]
pub struct Attachment {
    owner: RefCell<Option<Weak<Timeline>>>,
}

impl Attachment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the owning timeline while it is still alive.
    pub fn owner(&self) -> Option<Rc<Timeline>> {
        self.owner.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn is_attached(&self) -> bool {
        self.owner().is_some()
    }

    /// Records `owner`, refusing to silently move away from a different live
    /// owner.
    pub fn attach(&self, owner: &Rc<Timeline>) -> Result<()> {
        if let Some(current) = self.owner() {
            if !Rc::ptr_eq(&current, owner) {
                return Err(SchedulerError::AlreadyAttachedElsewhere);
            }
        }
        *self.owner.borrow_mut() = Some(Rc::downgrade(owner));
        Ok(())
    }

    /// Clears the link and hands back the previous owner, if still alive.
    pub fn release(&self) -> Option<Rc<Timeline>> {
        self.owner.borrow_mut().take().and_then(|owner| owner.upgrade())
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Anything that can be positioned on a [`Timeline`] and rendered by it.
pub trait Schedulable {
    fn unit_kind(&self) -> UnitKind;

    /// Offset from the owning timeline's origin.
    fn start_point(&self) -> f64;

    fn set_start_point(&self, value: f64);

    /// Length in the event's own (unscaled) units.
    fn duration(&self) -> f64;

    /// Playback-rate multiplier applied to the elapsed value before rendering.
    fn scale(&self) -> f64;

    fn attachment(&self) -> &Attachment;

    /// Updates the event for `elapsed` units since its own start. Negative
    /// values mean the event has not started yet.
    fn render(&self, elapsed: f64);

    /// Returns the nested timeline when the event is one.
    fn as_timeline(&self) -> Option<&Timeline> {
        None
    }

    fn is_attached(&self) -> bool {
        self.attachment().is_attached()
    }

    fn timeline(&self) -> Option<Rc<Timeline>> {
        self.attachment().owner()
    }

    fn set_timeline(&self, owner: &Rc<Timeline>) -> Result<()> {
        self.attachment().attach(owner)
    }

    /// Leaves the owning timeline. Calling it on a detached event does nothing.
    fn detach(&self) {
        if let Some(owner) = self.attachment().release() {
            tracing::debug!(unit = %self.unit_kind(), "detaching time event");
            owner.remove_address(address(self));
        }
    }
}

/// Checks the values a timeline relies on when placing `event`.
///
/// Nested timelines may report a negative duration when all of their
/// children end before their origin, so only leaf events have to be
/// non-negative.
pub fn validate(event: &dyn Schedulable) -> Result<()> {
    let duration = event.duration();
    if duration.is_nan() {
        return Err(SchedulerError::InvalidEvent("duration must be a number"));
    }
    if duration < 0.0 && event.as_timeline().is_none() {
        return Err(SchedulerError::InvalidEvent(
            "duration must be a non-negative number",
        ));
    }
    check_scale(event.scale())
}

pub(crate) fn check_scale(scale: f64) -> Result<()> {
    if !scale.is_finite() {
        return Err(SchedulerError::InvalidEvent("scale must be finite"));
    }
    if scale == 0.0 {
        return Err(SchedulerError::DegenerateScale);
    }
    Ok(())
}

/// Where a leaf event stands relative to the last elapsed value it received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPhase {
    /// Never rendered.
    Idle,
    /// Rendered before its start.
    Pending,
    Running,
    /// Rendered at or past its duration.
    Finished,
}

type RenderHook = Box<dyn Fn(&TimeEvent, f64)>;

/// Plain schedulable unit with an optional render callback.
///
/// Payload behaviour (movement, fades, pauses...) is meant to live in the
/// callback or in a dedicated [`Schedulable`] implementation.
pub struct TimeEvent {
    unit_kind: UnitKind,
    start: Cell<f64>,
    duration: Cell<f64>,
    scale: Cell<f64>,
    attachment: Attachment,
    elapsed: Cell<Option<f64>>,
    render_count: Cell<u64>,
    hook: Option<RenderHook>,
}

impl TimeEvent {
    /// Creates a time based event lasting `duration` milliseconds.
    pub fn new(duration: f64) -> Self {
        Self::with_options(duration, TimelineOptions::default())
    }

    /// Creates a frame based event lasting `duration` frames.
    pub fn in_frames(duration: f64) -> Self {
        Self::with_options(duration, TimelineOptions::in_frames())
    }

    pub fn with_options(duration: f64, options: TimelineOptions) -> Self {
        Self {
            unit_kind: options.into(),
            start: Cell::new(0.0),
            duration: Cell::new(duration),
            scale: Cell::new(1.0),
            attachment: Attachment::new(),
            elapsed: Cell::new(None),
            render_count: Cell::new(0),
            hook: None,
        }
    }

    /// Sets the playback rate, rejecting zero and non-finite values.
    pub fn with_scale(self, scale: f64) -> Result<Self> {
        check_scale(scale)?;
        self.scale.set(scale);
        Ok(self)
    }

    /// Runs `hook` after every render with the event and the elapsed value.
    pub fn on_render(mut self, hook: impl Fn(&TimeEvent, f64) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn set_scale(&self, scale: f64) -> Result<()> {
        check_scale(scale)?;
        self.scale.set(scale);
        self.notify_owner();
        Ok(())
    }

    pub fn set_duration(&self, duration: f64) -> Result<()> {
        if duration.is_nan() || duration < 0.0 {
            return Err(SchedulerError::InvalidEvent(
                "duration must be a non-negative number",
            ));
        }
        self.duration.set(duration);
        self.notify_owner();
        Ok(())
    }

    /// Elapsed value received by the most recent render.
    pub fn elapsed(&self) -> Option<f64> {
        self.elapsed.get()
    }

    pub fn render_count(&self) -> u64 {
        self.render_count.get()
    }

    pub fn phase(&self) -> EventPhase {
        match self.elapsed.get() {
            None => EventPhase::Idle,
            Some(elapsed) if elapsed < 0.0 => EventPhase::Pending,
            Some(elapsed) if elapsed >= self.duration.get() => EventPhase::Finished,
            Some(_) => EventPhase::Running,
        }
    }

    /// Fraction of the event covered by the last render, clamped to `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let Some(elapsed) = self.elapsed.get() else {
            return 0.0;
        };
        let duration = self.duration.get();
        if duration <= 0.0 {
            return if elapsed >= 0.0 { 1.0 } else { 0.0 };
        }
        (elapsed / duration).clamp(0.0, 1.0)
    }

    fn notify_owner(&self) {
        if let Some(owner) = self.timeline() {
            owner.rearrange();
        }
    }
}

impl Schedulable for TimeEvent {
    fn unit_kind(&self) -> UnitKind {
        self.unit_kind
    }

    fn start_point(&self) -> f64 {
        self.start.get()
    }

    fn set_start_point(&self, value: f64) {
        self.start.set(value);
        self.notify_owner();
    }

    fn duration(&self) -> f64 {
        self.duration.get()
    }

    fn scale(&self) -> f64 {
        self.scale.get()
    }

    fn attachment(&self) -> &Attachment {
        &self.attachment
    }

    fn render(&self, elapsed: f64) {
        self.elapsed.set(Some(elapsed));
        self.render_count.set(self.render_count.get() + 1);
        if let Some(hook) = &self.hook {
            hook(self, elapsed);
        }
    }
}

impl fmt::Debug for TimeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeEvent")
            .field("unit_kind", &self.unit_kind)
            .field("start", &self.start.get())
            .field("duration", &self.duration.get())
            .field("scale", &self.scale.get())
            .field("elapsed", &self.elapsed.get())
            .field("attachment", &self.attachment)
            .finish()
    }
}
