//! Timelines: schedulable containers that fan a playhead out to their
//! children.
//!
//! A timeline owns its children through [`EventRef`] handles; children only
//! keep a weak link back. Every structural mutation recomputes the
//! timeline's duration and, when it changed, the durations of the timelines
//! above it.

use std::{
    cell::{Cell, RefCell},
    fmt, ptr,
    rc::{Rc, Weak},
};

use serde::Serialize;

use crate::{
    config::UnitKind,
    event::{address, check_scale, validate, Attachment, EventRef, Schedulable},
    Result, SchedulerError, TimelineOptions,
};

pub struct Timeline {
    unit_kind: UnitKind,
    start: Cell<f64>,
    scale: Cell<f64>,
    current_time: Cell<f64>,
    duration: Cell<f64>,
    children: RefCell<Vec<EventRef>>,
    last_added: RefCell<Option<Weak<dyn Schedulable>>>,
    attachment: Attachment,
}

impl Timeline {
    pub fn new(options: TimelineOptions) -> Rc<Self> {
        Rc::new(Self {
            unit_kind: options.into(),
            start: Cell::new(0.0),
            scale: Cell::new(1.0),
            current_time: Cell::new(0.0),
            duration: Cell::new(0.0),
            children: RefCell::new(Vec::new()),
            last_added: RefCell::new(None),
            attachment: Attachment::new(),
        })
    }

    /// Adds `event` so that it starts at the current playhead.
    ///
    /// An event owned by another timeline (or already by this one) is moved,
    /// never duplicated. Rejected events are left untouched. If the event
    /// refuses the new owner in [`Schedulable::set_timeline`], it has already
    /// left its previous one and ends up detached.
    pub fn add(self: &Rc<Self>, event: EventRef) -> Result<&Rc<Self>> {
        if let Err(err) = self.check_candidate(event.as_ref()) {
            tracing::warn!(%err, unit = %self.unit_kind, "rejected time event");
            return Err(err);
        }

        if event.is_attached() {
            event.detach();
        }
        if let Err(err) = event.set_timeline(self) {
            tracing::warn!(%err, "time event refused its new timeline");
            return Err(err);
        }
        event.set_start_point(self.current_time.get());
        *self.last_added.borrow_mut() = Some(Rc::downgrade(&event));
        self.children.borrow_mut().push(event);
        self.rearrange();

        tracing::debug!(
            start = self.current_time.get(),
            children = self.len(),
            duration = self.duration.get(),
            "added time event"
        );
        Ok(self)
    }

    /// Alias for [`Timeline::add`].
    pub fn play(self: &Rc<Self>, event: EventRef) -> Result<&Rc<Self>> {
        self.add(event)
    }

    /// Moves the most recently added event to `position`.
    pub fn at(self: &Rc<Self>, position: f64) -> &Rc<Self> {
        if let Some(event) = self.last_added() {
            event.set_start_point(position);
            self.rearrange();
            tracing::debug!(position, "repositioned last added time event");
        }
        self
    }

    /// Removes the first child that is `target` itself. Unknown targets are
    /// ignored.
    pub fn remove(self: &Rc<Self>, target: &dyn Schedulable) -> &Rc<Self> {
        self.remove_address(address(target));
        self
    }

    pub(crate) fn remove_address(&self, target: *const ()) -> Option<EventRef> {
        let removed = {
            let mut children = self.children.borrow_mut();
            let index = children
                .iter()
                .position(|child| Rc::as_ptr(child) as *const () == target)?;
            children.remove(index)
        };

        if removed
            .timeline()
            .is_some_and(|owner| ptr::eq(Rc::as_ptr(&owner), self))
        {
            removed.attachment().release();
        }

        let mut last_added = self.last_added.borrow_mut();
        if last_added
            .as_ref()
            .is_some_and(|last| last.as_ptr() as *const () == target)
        {
            *last_added = None;
        }
        drop(last_added);

        self.rearrange();
        tracing::debug!(children = self.len(), "removed time event");
        Some(removed)
    }

    /// Recomputes the duration from the children's relative end points.
    ///
    /// Owning timelines are updated as well when the value changes.
    pub fn rearrange(&self) -> &Self {
        let duration = {
            let children = self.children.borrow();
            if children.is_empty() {
                0.0
            } else {
                children
                    .iter()
                    .map(|child| relative_end(child.as_ref()))
                    .fold(f64::NEG_INFINITY, f64::max)
            }
        };

        let previous = self.duration.replace(duration);
        if previous != duration {
            if let Some(owner) = self.timeline() {
                owner.rearrange();
            }
        }
        self
    }

    /// Last playhead received by [`Schedulable::render`].
    pub fn current_time(&self) -> f64 {
        self.current_time.get()
    }

    pub fn len(&self) -> usize {
        self.children.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.borrow().is_empty()
    }

    /// Snapshot of the children in playback order.
    pub fn children(&self) -> Vec<EventRef> {
        self.children.borrow().clone()
    }

    pub fn contains(&self, target: &dyn Schedulable) -> bool {
        let target = address(target);
        self.children
            .borrow()
            .iter()
            .any(|child| Rc::as_ptr(child) as *const () == target)
    }

    /// The event [`Timeline::at`] would move.
    pub fn last_added(&self) -> Option<EventRef> {
        self.last_added.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub fn set_scale(&self, scale: f64) -> Result<()> {
        check_scale(scale)?;
        self.scale.set(scale);
        if let Some(owner) = self.timeline() {
            owner.rearrange();
        }
        Ok(())
    }

    pub fn summary(&self) -> EventSummary {
        summarize(self)
    }

    fn check_candidate(&self, event: &dyn Schedulable) -> Result<()> {
        validate(event)?;
        if event.unit_kind() != self.unit_kind {
            return Err(SchedulerError::UnitKindMismatch {
                expected: self.unit_kind,
                found: event.unit_kind(),
            });
        }
        if let Some(nested) = event.as_timeline() {
            if self.lineage_contains(nested) {
                return Err(SchedulerError::CyclicAttachment);
            }
        }
        Ok(())
    }

    /// Whether `candidate` is this timeline or one of its owners.
    fn lineage_contains(&self, candidate: &Timeline) -> bool {
        if ptr::eq(self, candidate) {
            return true;
        }
        let mut owner = self.timeline();
        while let Some(timeline) = owner {
            if ptr::eq(Rc::as_ptr(&timeline), candidate) {
                return true;
            }
            owner = timeline.timeline();
        }
        false
    }
}

/// End of `event` on its owner's axis. A zero scale never completes.
fn relative_end(event: &dyn Schedulable) -> f64 {
    let scale = event.scale();
    if scale == 0.0 {
        return f64::INFINITY;
    }
    event.start_point() + event.duration() / scale
}

impl Schedulable for Timeline {
    fn unit_kind(&self) -> UnitKind {
        self.unit_kind
    }

    fn start_point(&self) -> f64 {
        self.start.get()
    }

    fn set_start_point(&self, value: f64) {
        self.start.set(value);
        if let Some(owner) = self.timeline() {
            owner.rearrange();
        }
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

    /// Children are rendered in insertion order from a snapshot taken before
    /// the first one runs, so mutations made during the pass apply from the
    /// next pass on.
    fn render(&self, playhead: f64) {
        self.current_time.set(playhead);
        let children = self.children();
        tracing::trace!(playhead, children = children.len(), "rendering timeline");
        for child in children {
            let scaled_elapsed = (playhead - child.start_point()) * child.scale();
            child.render(scaled_elapsed);
        }
    }

    fn as_timeline(&self) -> Option<&Timeline> {
        Some(self)
    }
}

impl fmt::Debug for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeline")
            .field("unit_kind", &self.unit_kind)
            .field("start", &self.start.get())
            .field("scale", &self.scale.get())
            .field("current_time", &self.current_time.get())
            .field("duration", &self.duration.get())
            .field("children", &self.len())
            .finish()
    }
}

/// Diagnostic view of an event and, for timelines, everything below it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub unit_kind: UnitKind,
    pub start_point: f64,
    pub duration: f64,
    pub scale: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<EventSummary>,
}

pub fn summarize(event: &dyn Schedulable) -> EventSummary {
    let nested = event.as_timeline();
    EventSummary {
        unit_kind: event.unit_kind(),
        start_point: event.start_point(),
        duration: event.duration(),
        scale: event.scale(),
        current_time: nested.map(Timeline::current_time),
        children: nested
            .map(|timeline| {
                timeline
                    .children()
                    .iter()
                    .map(|child| summarize(child.as_ref()))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventPhase, TimeEvent};

    fn time_line() -> Rc<Timeline> {
        Timeline::new(TimelineOptions::default())
    }

    fn event(duration: f64) -> Rc<TimeEvent> {
        Rc::new(TimeEvent::new(duration))
    }

    #[test]
    fn empty_timeline_has_zero_duration() {
        let timeline = time_line();
        assert!(timeline.is_empty());
        assert_eq!(timeline.duration(), 0.0);
        assert_eq!(timeline.rearrange().duration(), 0.0);
    }

    #[test]
    fn unit_kind_must_match() {
        let frames = Timeline::new(TimelineOptions::in_frames());
        let err = frames.add(event(10.0)).unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::UnitKindMismatch {
                expected: UnitKind::Frame,
                found: UnitKind::Time
            }
        ));
        assert!(frames.is_empty());

        frames.add(Rc::new(TimeEvent::in_frames(10.0))).unwrap();
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn invalid_events_leave_timeline_untouched() {
        let timeline = time_line();
        let broken = event(-5.0);
        assert!(matches!(
            timeline.add(broken.clone()).unwrap_err(),
            SchedulerError::InvalidEvent(_)
        ));
        assert!(timeline.is_empty());
        assert!(!broken.is_attached());
        assert!(timeline.last_added().is_none());
    }

    #[test]
    fn added_events_start_at_current_time() {
        let timeline = time_line();
        timeline.render(250.0);

        let first = event(100.0);
        timeline.add(first.clone()).unwrap();
        assert_eq!(first.start_point(), 250.0);
        assert!(first.is_attached());
        assert_eq!(timeline.duration(), 350.0);
    }

    #[test]
    fn at_positions_only_the_last_added_event() {
        let timeline = time_line();
        let first = event(100.0);
        let second = event(100.0);

        timeline
            .add(first.clone())
            .unwrap()
            .at(10.0)
            .add(second.clone())
            .unwrap()
            .at(20.0);

        assert_eq!(first.start_point(), 10.0);
        assert_eq!(second.start_point(), 20.0);
        assert_eq!(timeline.duration(), 120.0);
    }

    #[test]
    fn at_without_children_is_a_no_op() {
        let timeline = time_line();
        timeline.at(42.0);
        assert_eq!(timeline.duration(), 0.0);
        assert!(timeline.is_empty());
    }

    #[test]
    fn duration_divides_by_scale() {
        let timeline = time_line();
        let slow = Rc::new(TimeEvent::new(2000.0).with_scale(2.0).unwrap());

        timeline.add(event(1000.0)).unwrap().at(0.0);
        timeline.add(slow).unwrap().at(500.0);

        assert_eq!(timeline.duration(), 1500.0);
    }

    #[test]
    fn duration_may_end_before_origin() {
        let timeline = time_line();
        timeline.add(event(10.0)).unwrap().at(-100.0);
        assert_eq!(timeline.duration(), -90.0);
    }

    #[test]
    fn render_fans_out_scaled_elapsed() {
        let timeline = time_line();
        let first = event(1000.0);
        let second = Rc::new(TimeEvent::new(1000.0).with_scale(2.0).unwrap());
        timeline.add(first.clone()).unwrap().at(100.0);
        timeline.add(second.clone()).unwrap().at(300.0);

        timeline.render(200.0);

        assert_eq!(timeline.current_time(), 200.0);
        assert_eq!(first.elapsed(), Some(100.0));
        assert_eq!(second.elapsed(), Some(-200.0));
        assert_eq!(second.phase(), EventPhase::Pending);
    }

    #[test]
    fn render_visits_children_in_insertion_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let timeline = time_line();
        for label in ["a", "b", "c"] {
            let sink = order.clone();
            let child = TimeEvent::new(10.0).on_render(move |_, _| sink.borrow_mut().push(label));
            timeline.add(Rc::new(child)).unwrap();
        }

        timeline.render(0.0);
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn readding_moves_event_between_timelines() {
        let a = time_line();
        let b = time_line();
        let shared = event(100.0);

        a.add(shared.clone()).unwrap();
        b.add(shared.clone()).unwrap();

        assert!(!a.contains(&*shared));
        assert!(a.is_empty());
        assert_eq!(a.duration(), 0.0);
        assert_eq!(b.len(), 1);
        assert!(Rc::ptr_eq(&shared.timeline().unwrap(), &b));
    }

    #[test]
    fn readding_to_same_timeline_moves_to_back() {
        let timeline = time_line();
        let first = event(10.0);
        let second = event(10.0);
        timeline.add(first.clone()).unwrap();
        timeline.add(second.clone()).unwrap();
        timeline.add(first.clone()).unwrap();

        let children = timeline.children();
        assert_eq!(children.len(), 2);
        assert_eq!(Rc::as_ptr(&children[1]) as *const (), Rc::as_ptr(&first) as *const ());
    }

    #[test]
    fn remove_takes_out_one_event_by_identity() {
        let timeline = time_line();
        let first = event(100.0);
        let twin = event(100.0);
        timeline.add(first.clone()).unwrap();
        timeline.add(twin.clone()).unwrap().at(50.0);

        timeline.remove(&*twin);

        assert_eq!(timeline.len(), 1);
        assert!(timeline.contains(&*first));
        assert!(!twin.is_attached());
        assert!(first.is_attached());
    }

    #[test]
    fn remove_recomputes_duration() {
        let timeline = time_line();
        let long = event(500.0);
        timeline.add(event(100.0)).unwrap();
        timeline.add(long.clone()).unwrap();
        assert_eq!(timeline.duration(), 500.0);

        timeline.remove(&*long);
        assert_eq!(timeline.duration(), 100.0);
    }

    #[test]
    fn remove_of_unknown_event_is_ignored() {
        let timeline = time_line();
        timeline.add(event(100.0)).unwrap();
        let stranger = event(100.0);

        timeline.remove(&*stranger);
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn removing_last_added_disables_at() {
        let timeline = time_line();
        let child = event(100.0);
        timeline.add(child.clone()).unwrap();
        timeline.remove(&*child).at(99.0);

        assert_eq!(child.start_point(), 0.0);
        assert!(timeline.last_added().is_none());
    }

    #[test]
    fn nested_timelines_offset_and_scale_playhead() {
        let root = time_line();
        let nested = time_line();
        nested.set_scale(2.0).unwrap();
        let leaf = event(100.0);

        nested.add(leaf.clone()).unwrap().at(10.0);
        root.add(nested.clone()).unwrap().at(100.0);

        root.render(150.0);

        assert_eq!(nested.current_time(), 100.0);
        assert_eq!(leaf.elapsed(), Some(90.0));
    }

    #[test]
    fn nested_duration_changes_reach_the_root() {
        let root = time_line();
        let nested = time_line();
        root.add(nested.clone()).unwrap().at(100.0);
        assert_eq!(root.duration(), 100.0);

        nested.add(event(50.0)).unwrap();
        assert_eq!(root.duration(), 150.0);

        nested.set_scale(2.0).unwrap();
        assert_eq!(root.duration(), 125.0);
    }

    #[test]
    fn cycles_are_rejected() {
        let root = time_line();
        let nested = time_line();
        root.add(nested.clone()).unwrap();

        assert!(matches!(
            root.add(root.clone()).unwrap_err(),
            SchedulerError::CyclicAttachment
        ));
        assert!(matches!(
            nested.add(root.clone()).unwrap_err(),
            SchedulerError::CyclicAttachment
        ));
        assert_eq!(root.len(), 1);
        assert!(nested.is_empty());
    }

    #[test]
    fn child_removing_sibling_mid_render_uses_snapshot() {
        let timeline = time_line();
        let victim = event(100.0);

        let owner = Rc::downgrade(&timeline);
        let target = victim.clone();
        let remover = TimeEvent::new(100.0).on_render(move |_, _| {
            if let Some(owner) = owner.upgrade() {
                owner.remove(&*target);
            }
        });

        timeline.add(Rc::new(remover)).unwrap();
        timeline.add(victim.clone()).unwrap();

        timeline.render(10.0);
        assert_eq!(victim.render_count(), 1);
        assert_eq!(timeline.len(), 1);

        timeline.render(20.0);
        assert_eq!(victim.render_count(), 1);
    }

    #[test]
    fn summary_describes_the_tree() {
        let root = time_line();
        let nested = time_line();
        nested.add(event(40.0)).unwrap();
        root.add(nested).unwrap().at(5.0);

        let summary = root.summary();
        assert_eq!(summary.duration, 45.0);
        assert_eq!(summary.children.len(), 1);
        assert_eq!(summary.children[0].start_point, 5.0);
        assert_eq!(summary.children[0].children[0].duration, 40.0);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["unit_kind"], "time");
    }

    #[test]
    fn play_behaves_like_add() {
        let timeline = time_line();
        timeline.render(30.0);
        let first = event(10.0);
        let second = event(10.0);

        timeline
            .play(first.clone())
            .unwrap()
            .play(second.clone())
            .unwrap()
            .at(100.0);

        assert_eq!(first.start_point(), 30.0);
        assert_eq!(second.start_point(), 100.0);
        let last = timeline.last_added().unwrap();
        assert_eq!(Rc::as_ptr(&last) as *const (), Rc::as_ptr(&second) as *const ());
        assert_eq!(timeline.duration(), 110.0);
    }

    #[test]
    fn timelines_ending_before_origin_can_be_nested() {
        let root = time_line();
        let nested = time_line();
        nested.add(event(10.0)).unwrap().at(-100.0);
        assert_eq!(nested.duration(), -90.0);

        root.add(nested.clone()).unwrap();
        assert!(root.contains(&*nested));
        assert_eq!(root.duration(), -90.0);

        let leaf = event(-1.0);
        assert!(matches!(
            root.add(leaf).unwrap_err(),
            SchedulerError::InvalidEvent(_)
        ));
    }

    #[test]
    fn moving_nested_start_updates_owner_duration() {
        let root = time_line();
        let nested = time_line();
        nested.add(event(20.0)).unwrap();
        root.add(nested.clone()).unwrap();
        assert_eq!(root.duration(), 20.0);

        nested.set_start_point(5.0);
        assert_eq!(root.duration(), 25.0);
    }

    struct Stubborn {
        attachment: Attachment,
        start: Cell<f64>,
    }

    impl Schedulable for Stubborn {
        fn unit_kind(&self) -> UnitKind {
            UnitKind::Time
        }

        fn start_point(&self) -> f64 {
            self.start.get()
        }

        fn set_start_point(&self, value: f64) {
            self.start.set(value);
        }

        fn duration(&self) -> f64 {
            10.0
        }

        fn scale(&self) -> f64 {
            1.0
        }

        fn attachment(&self) -> &Attachment {
            &self.attachment
        }

        fn render(&self, _elapsed: f64) {}

        fn set_timeline(&self, _owner: &Rc<Timeline>) -> Result<()> {
            Err(SchedulerError::AlreadyAttachedElsewhere)
        }
    }

    #[test]
    fn refused_attachment_leaves_event_detached() {
        let previous = time_line();
        let next = time_line();
        let stubborn = Rc::new(Stubborn {
            attachment: Attachment::new(),
            start: Cell::new(7.0),
        });
        stubborn.attachment().attach(&previous).unwrap();

        let err = next.add(stubborn.clone()).unwrap_err();
        assert!(matches!(err, SchedulerError::AlreadyAttachedElsewhere));
        assert!(next.is_empty());
        assert!(next.last_added().is_none());
        assert!(!stubborn.is_attached());
        assert_eq!(stubborn.start_point(), 7.0);
    }
}
