//! Consistency pass: keeps every anchor and its annotation in agreement
//!
//! The pass reacts to scene lifecycle events ([`SceneEvent`]) through an
//! explicit dispatch table instead of per-object callbacks. It is the only
//! code allowed to create annotations, bind them to anchors or erase them as
//! a side effect of another edit.
//!
//! Event handling:
//!
//! - `CommandStarted`: clear the transform batch
//! - `ObjectDuplicated`: record the pair in the duplication ledger
//! - `ObjectErased`: drop registry entries, cascade anchor erase to its
//!   annotation, downgrade an anchor whose annotation was erased
//! - `BeforeCommit`: resolve duplicates first, then refresh batched anchors
//!   not already handled, then erase annotations nobody claimed
//!
//! A failure while handling one anchor is logged and the pass moves on.

use crate::anchor::{Anchor, NoteKind};
use crate::annotation::{Annotation, AnnotationLayout};
use crate::config::LinkConfig;
use crate::error::{EditError, HookError};
use crate::geometry::{is_codirectional, line_projection, snap_half_turn};
use crate::record::referenced_note;
use crate::registry::{DuplicationLedger, LinkRegistry, TransformBatch};
use crate::scene::{ObjectId, ObjectKind, Scene, SceneEvent, SceneObject};
use std::collections::BTreeSet;
use tracing::{debug, trace, warn};

/// Counters accumulated by the pass during one command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Annotation refreshes performed
    pub refreshed: usize,
    /// Annotations created
    pub created: usize,
    /// Existing annotations bound to a new owner
    pub bound: usize,
    /// Stale references cleared
    pub cleared: usize,
    /// Annotations erased as a side effect
    pub erased: usize,
}

/// Mutable state the pass works on
pub struct PassContext<'a> {
    pub scene: &'a mut Scene,
    pub links: &'a mut LinkRegistry,
    pub ledger: &'a mut DuplicationLedger,
    pub batch: &'a mut TransformBatch,
    pub config: &'a LinkConfig,
    pub stats: &'a mut PassStats,
}

/// Route one scene event to its handler
pub fn dispatch(ctx: &mut PassContext<'_>, event: SceneEvent) {
    match event {
        SceneEvent::CommandStarted { name } => on_command_started(ctx, &name),
        SceneEvent::ObjectDuplicated { source, copy } => on_object_duplicated(ctx, source, copy),
        SceneEvent::ObjectErased { id, object, group } => {
            on_object_erased(ctx, id, &object, &group)
        }
        SceneEvent::BeforeCommit { appended } => on_before_commit(ctx, &appended),
    }
}

fn on_command_started(ctx: &mut PassContext<'_>, name: &str) {
    trace!(command = name, "command started");
    ctx.batch.clear();
}

fn on_object_duplicated(ctx: &mut PassContext<'_>, source: ObjectId, copy: ObjectId) {
    trace!(%source, %copy, "object duplicated");
    ctx.ledger.record(source, copy);
}

fn on_object_erased(
    ctx: &mut PassContext<'_>,
    id: ObjectId,
    object: &SceneObject,
    group: &BTreeSet<ObjectId>,
) {
    match object {
        SceneObject::Annotation(annotation) => {
            let owner = ctx.links.remove(id).or(annotation.owner());
            let Some(owner) = owner else {
                return;
            };
            let Some(anchor) = ctx.scene.anchor_mut(owner) else {
                return;
            };
            if anchor.note_ref() == Some(id) {
                anchor.clear_note_ref();
                anchor.set_note_kind(NoteKind::None);
                ctx.scene.mark_dirty(owner);
                debug!(anchor = %owner, annotation = %id, "annotation erased; anchor downgraded");
            }
        }
        SceneObject::Anchor(anchor) => {
            ctx.batch.remove(id);
            let Some(note_id) = anchor.note_ref() else {
                return;
            };
            if group.contains(&note_id) {
                return;
            }
            let owned = ctx
                .scene
                .annotation(note_id)
                .is_some_and(|annotation| annotation.is_owned_by(id));
            if owned {
                ctx.scene.erase(&[note_id]);
                ctx.stats.erased += 1;
                debug!(anchor = %id, annotation = %note_id, "anchor erased; cascading to annotation");
            }
        }
    }
}

fn on_before_commit(ctx: &mut PassContext<'_>, appended: &[ObjectId]) {
    let mut resolved = BTreeSet::new();

    for (source, copy) in ctx.ledger.drain() {
        if ctx.scene.anchor(copy).is_none() {
            trace!(%source, %copy, "duplicate is not a live anchor; skipping");
            continue;
        }
        if !resolved.insert(copy) {
            continue;
        }
        report("duplicate", copy, reconcile_anchor(ctx, copy, appended));
    }

    for id in ctx.batch.drain() {
        if resolved.contains(&id) || ctx.scene.anchor(id).is_none() {
            continue;
        }
        report("transform", id, reconcile_anchor(ctx, id, appended));
    }

    let orphans: Vec<ObjectId> = appended
        .iter()
        .copied()
        .filter(|id| ctx.scene.annotation(*id).is_some() && !ctx.links.is_claimed(*id))
        .collect();
    erase_orphans(ctx, &orphans);
}

/// Repair an anchor's link and refresh its annotation
pub(crate) fn reconcile_anchor(
    ctx: &mut PassContext<'_>,
    anchor_id: ObjectId,
    candidates: &[ObjectId],
) -> Result<(), HookError> {
    repair_link(ctx, anchor_id, candidates)?;
    refresh(ctx, anchor_id)?;
    Ok(())
}

/// Immediate reconciliation after a direct edit of one anchor
pub(crate) fn refresh_now(ctx: &mut PassContext<'_>, anchor_id: ObjectId) {
    report("update", anchor_id, reconcile_anchor(ctx, anchor_id, &[]));
}

/// Immediate shelf feedback after a direct edit of one annotation
///
/// Returns `false` when the owning anchor refused the change; the annotation
/// is then put back where its anchor wants it.
pub(crate) fn shelf_edited(ctx: &mut PassContext<'_>, annotation_id: ObjectId) -> bool {
    match shelf_feedback(ctx, annotation_id) {
        Ok(accepted) => accepted,
        Err(error) => {
            report("shelf", annotation_id, Err(error));
            true
        }
    }
}

/// Make an anchor's `note_ref` trustworthy
///
/// A reference to an annotation that does not list this anchor as owner is
/// cleared. An annotated anchor without a reference then claims the first
/// unclaimed candidate whose leader starts at its anchor point, or gets a
/// fresh annotation.
pub(crate) fn repair_link(
    ctx: &mut PassContext<'_>,
    anchor_id: ObjectId,
    candidates: &[ObjectId],
) -> Result<(), HookError> {
    let anchor = require_anchor(ctx.scene, anchor_id)?;
    let anchor_point = anchor.anchor_point();
    let note_kind = anchor.note_kind();

    if let Some(note_id) = anchor.note_ref() {
        let valid = ctx
            .scene
            .annotation(note_id)
            .is_some_and(|annotation| annotation.is_owned_by(anchor_id));
        if valid {
            if ctx.links.owner_of(note_id) != Some(anchor_id) {
                bind(ctx, anchor_id, note_id)?;
            }
            return Ok(());
        }
        require_anchor_mut(ctx.scene, anchor_id)?.clear_note_ref();
        ctx.stats.cleared += 1;
        debug!(anchor = %anchor_id, annotation = %note_id, "cleared stale annotation reference");
    }

    if note_kind != NoteKind::Annotated {
        return Ok(());
    }

    let tolerance = ctx.config.tolerance;
    let found = candidates.iter().copied().find(|id| {
        !ctx.links.is_claimed(*id)
            && !held_by_proxy(ctx.scene, *id)
            && ctx
                .scene
                .annotation(*id)
                .is_some_and(|annotation| tolerance.points_equal(annotation.first_point(), anchor_point))
    });

    match found {
        Some(note_id) => {
            bind(ctx, anchor_id, note_id)?;
            ctx.stats.bound += 1;
            debug!(anchor = %anchor_id, annotation = %note_id, "bound copied annotation");
        }
        None => {
            create_annotation(ctx, anchor_id)?;
        }
    }
    Ok(())
}

/// Bring an anchor's annotation in line with the anchor
///
/// Creates the annotation if an annotated anchor has none. Fields that
/// already match are not written. Returns `false` for anchors without an
/// annotation state.
pub(crate) fn refresh(ctx: &mut PassContext<'_>, anchor_id: ObjectId) -> Result<bool, HookError> {
    let anchor = require_anchor(ctx.scene, anchor_id)?;
    if anchor.note_kind() != NoteKind::Annotated {
        return Ok(false);
    }
    let layout = AnnotationLayout::for_anchor(anchor);
    let live_ref = anchor.note_ref().filter(|id| {
        ctx.scene
            .annotation(*id)
            .is_some_and(|annotation| annotation.is_owned_by(anchor_id))
    });

    let note_id = match live_ref {
        Some(id) => id,
        None => {
            if require_anchor_mut(ctx.scene, anchor_id)?.clear_note_ref().is_some() {
                ctx.stats.cleared += 1;
            }
            create_annotation(ctx, anchor_id)?
        }
    };

    let tolerance = ctx.config.tolerance;
    let angle_epsilon = ctx.config.angle_epsilon;
    let annotation = ctx
        .scene
        .annotation_mut(note_id)
        .ok_or(HookError::MissingObject(note_id))?;
    if annotation.apply_layout(&layout, &tolerance, angle_epsilon) {
        ctx.scene.mark_dirty(note_id);
    }
    ctx.stats.refreshed += 1;
    Ok(true)
}

/// Fold a user-edited shelf back into its anchor
///
/// The shelf angle is snapped to `0` or `PI` and written back to the
/// annotation only if it was off by more than the angle epsilon. The signed
/// distance is measured from the infinite anchor line, positive on the
/// perpendicular's side. A locked or read-only owner keeps its shelf and the
/// annotation is refreshed back to it; the result is then `false`.
pub(crate) fn shelf_feedback(
    ctx: &mut PassContext<'_>,
    annotation_id: ObjectId,
) -> Result<bool, HookError> {
    let annotation = ctx
        .scene
        .annotation(annotation_id)
        .ok_or(HookError::MissingObject(annotation_id))?;
    let rack = annotation.rack_point();
    let angle = annotation.angle();

    let Some(owner) = ctx.links.owner_of(annotation_id) else {
        trace!(annotation = %annotation_id, "shelf edit on unclaimed annotation");
        return Ok(true);
    };
    let anchor = require_anchor(ctx.scene, owner)?;
    if anchor.note_ref() != Some(annotation_id) {
        return Ok(true);
    }
    match ctx.scene.begin_modify(owner) {
        Ok(()) => {}
        Err(EditError::ModificationDenied { reason, .. }) => {
            debug!(anchor = %owner, annotation = %annotation_id, %reason, "owner refused shelf edit");
            refresh(ctx, owner)?;
            return Ok(false);
        }
        Err(error) => return Err(error.into()),
    }
    let anchor = require_anchor(ctx.scene, owner)?;

    let snapped = snap_half_turn(angle);
    let geometry = *anchor.geometry();
    let offset = rack - line_projection(&geometry, rack);
    let mut distance = offset.hypot();
    if !is_codirectional(offset, geometry.perpendicular()) {
        distance = -distance;
    }

    if angle.sin().abs() > ctx.config.angle_epsilon {
        if let Some(annotation) = ctx.scene.annotation_mut(annotation_id) {
            annotation.set_angle(snapped);
        }
    }
    require_anchor_mut(ctx.scene, owner)?.set_shelf(snapped, distance);
    ctx.scene.mark_dirty(owner);

    refresh(ctx, owner)?;
    Ok(true)
}

/// Re-establish every invariant from scratch
///
/// Used after a document load and after undo. Registry entries that no
/// longer match an anchor reference are pruned, valid references are
/// registered, every anchor is repaired and refreshed, and annotations left
/// unclaimed are erased.
pub fn reconcile_all(ctx: &mut PassContext<'_>) {
    let stale: Vec<ObjectId> = ctx
        .links
        .iter()
        .filter(|(note_id, owner)| {
            ctx.scene.annotation(*note_id).is_none()
                || ctx.scene.anchor(*owner).and_then(Anchor::note_ref) != Some(*note_id)
        })
        .map(|(note_id, _)| note_id)
        .collect();
    for note_id in stale {
        ctx.links.remove(note_id);
    }

    let anchors: Vec<ObjectId> = ctx.scene.anchors().map(|(id, _)| id).collect();

    // Register intact links first so the search below cannot steal them
    for &anchor_id in &anchors {
        let Some(note_id) = ctx.scene.anchor(anchor_id).and_then(Anchor::note_ref) else {
            continue;
        };
        let owned = ctx
            .scene
            .annotation(note_id)
            .is_some_and(|annotation| annotation.is_owned_by(anchor_id));
        if owned && !ctx.links.is_claimed(note_id) {
            ctx.links.register(note_id, anchor_id);
        }
    }

    let candidates: Vec<ObjectId> = ctx.scene.annotations().map(|(id, _)| id).collect();
    for anchor_id in anchors {
        report("reconcile", anchor_id, reconcile_anchor(ctx, anchor_id, &candidates));
    }

    let orphans: Vec<ObjectId> = ctx
        .scene
        .annotations()
        .map(|(id, _)| id)
        .filter(|id| !ctx.links.is_claimed(*id) && !held_by_proxy(ctx.scene, *id))
        .collect();
    erase_orphans(ctx, &orphans);
}

/// Whether a proxy record references this annotation
///
/// Such annotations belong to an anchor the engine cannot read; they are
/// left alone so the pair survives the next save.
pub fn held_by_proxy(scene: &Scene, note_id: ObjectId) -> bool {
    scene
        .proxies()
        .any(|(_, record)| referenced_note(record) == Some(note_id))
}

fn erase_orphans(ctx: &mut PassContext<'_>, orphans: &[ObjectId]) {
    if orphans.is_empty() {
        return;
    }
    let erased = ctx.scene.erase(orphans);
    ctx.stats.erased += erased.len();
    debug!(count = erased.len(), "erased orphan annotations");
}

fn create_annotation(ctx: &mut PassContext<'_>, anchor_id: ObjectId) -> Result<ObjectId, HookError> {
    let at = require_anchor(ctx.scene, anchor_id)?.anchor_point();
    let note_id = ctx
        .scene
        .insert(SceneObject::Annotation(Annotation::new(at, anchor_id)));
    bind(ctx, anchor_id, note_id)?;
    ctx.stats.created += 1;
    debug!(anchor = %anchor_id, annotation = %note_id, "created annotation");
    Ok(note_id)
}

/// Point anchor and annotation at each other and register the pair
fn bind(ctx: &mut PassContext<'_>, anchor_id: ObjectId, note_id: ObjectId) -> Result<(), HookError> {
    require_anchor_mut(ctx.scene, anchor_id)?.bind_note(note_id);
    ctx.scene
        .annotation_mut(note_id)
        .ok_or(HookError::MissingObject(note_id))?
        .set_owner(anchor_id);

    let displaced: Vec<ObjectId> = ctx
        .links
        .register(note_id, anchor_id)
        .into_iter()
        .filter(|id| ctx.scene.contains(*id))
        .collect();
    if !displaced.is_empty() {
        let erased = ctx.scene.erase(&displaced);
        ctx.stats.erased += erased.len();
    }
    ctx.scene.mark_dirty(anchor_id);
    ctx.scene.mark_dirty(note_id);
    Ok(())
}

fn require_anchor(scene: &Scene, id: ObjectId) -> Result<&Anchor, HookError> {
    match scene.get(id) {
        Some(SceneObject::Anchor(anchor)) => Ok(anchor),
        Some(SceneObject::Annotation(_)) => Err(HookError::WrongKind {
            id,
            expected: ObjectKind::Anchor,
        }),
        None => Err(HookError::MissingObject(id)),
    }
}

fn require_anchor_mut(scene: &mut Scene, id: ObjectId) -> Result<&mut Anchor, HookError> {
    match scene.get_mut(id) {
        Some(SceneObject::Anchor(anchor)) => Ok(anchor),
        Some(SceneObject::Annotation(_)) => Err(HookError::WrongKind {
            id,
            expected: ObjectKind::Anchor,
        }),
        None => Err(HookError::MissingObject(id)),
    }
}

fn report(hook: &'static str, object: ObjectId, result: Result<(), HookError>) {
    if let Err(error) = result {
        warn!(hook, object = %object, %error, "consistency pass skipped object");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Affine, Point};

    struct Fixture {
        scene: Scene,
        links: LinkRegistry,
        ledger: DuplicationLedger,
        batch: TransformBatch,
        config: LinkConfig,
        stats: PassStats,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                scene: Scene::new(),
                links: LinkRegistry::new(),
                ledger: DuplicationLedger::new(),
                batch: TransformBatch::new(),
                config: LinkConfig::default(),
                stats: PassStats::default(),
            }
        }

        fn ctx(&mut self) -> PassContext<'_> {
            PassContext {
                scene: &mut self.scene,
                links: &mut self.links,
                ledger: &mut self.ledger,
                batch: &mut self.batch,
                config: &self.config,
                stats: &mut self.stats,
            }
        }

        fn pump(&mut self) {
            let mut ctx = self.ctx();
            while let Some(event) = ctx.scene.pop_event() {
                dispatch(&mut ctx, event);
            }
        }

        fn add_anchor(&mut self, start: Point, end: Point) -> ObjectId {
            let anchor = Anchor::with_segment(start, end, &self.config);
            self.scene.insert(SceneObject::Anchor(anchor))
        }
    }

    #[test]
    fn test_refresh_creates_and_binds() {
        let mut fx = Fixture::new();
        let id = fx.add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0));

        assert!(refresh(&mut fx.ctx(), id).unwrap());
        let note_id = fx.scene.anchor(id).unwrap().note_ref().unwrap();
        assert_eq!(fx.links.owner_of(note_id), Some(id));
        let note = fx.scene.annotation(note_id).unwrap();
        assert_eq!(note.first_point(), Point::new(5.0, 0.0));
        assert_eq!(fx.stats.created, 1);
        assert_eq!(fx.stats.refreshed, 1);
    }

    #[test]
    fn test_refresh_skips_unannotated() {
        let mut fx = Fixture::new();
        let id = fx.add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        fx.scene.anchor_mut(id).unwrap().set_note_kind(NoteKind::None);
        assert!(!refresh(&mut fx.ctx(), id).unwrap());
        assert_eq!(fx.scene.len(), 1);
    }

    #[test]
    fn test_missing_anchor_is_an_error() {
        let mut fx = Fixture::new();
        assert_eq!(
            refresh(&mut fx.ctx(), ObjectId(77)),
            Err(HookError::MissingObject(ObjectId(77)))
        );
    }

    #[test]
    fn test_erasing_anchor_cascades() {
        let mut fx = Fixture::new();
        let id = fx.add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        refresh(&mut fx.ctx(), id).unwrap();

        fx.scene.erase(&[id]);
        fx.pump();
        assert!(fx.scene.is_empty());
        assert!(fx.links.is_empty());
    }

    #[test]
    fn test_erasing_annotation_downgrades_anchor() {
        let mut fx = Fixture::new();
        let id = fx.add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        refresh(&mut fx.ctx(), id).unwrap();
        let note_id = fx.scene.anchor(id).unwrap().note_ref().unwrap();

        fx.scene.erase(&[note_id]);
        fx.pump();
        let anchor = fx.scene.anchor(id).unwrap();
        assert_eq!(anchor.note_kind(), NoteKind::None);
        assert!(anchor.note_ref().is_none());
        assert!(fx.links.is_empty());
    }

    #[test]
    fn test_duplicate_binds_copied_annotation() {
        let mut fx = Fixture::new();
        let id = fx.add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        refresh(&mut fx.ctx(), id).unwrap();
        let note_id = fx.scene.anchor(id).unwrap().note_ref().unwrap();

        fx.scene.start_command("copy");
        let pairs = fx
            .scene
            .clone_objects(&[id, note_id], Affine::translate((0.0, 50.0)));
        fx.scene.finish_command();
        fx.pump();

        let copy = pairs[0].1;
        let copy_note = pairs[1].1;
        assert_eq!(fx.scene.anchor(copy).unwrap().note_ref(), Some(copy_note));
        assert_eq!(fx.links.owner_of(copy_note), Some(copy));
        assert_eq!(fx.links.owner_of(note_id), Some(id));
        assert_eq!(fx.stats.bound, 1);
        assert_eq!(fx.stats.created, 1);
    }

    #[test]
    fn test_duplicate_without_annotation_creates_one() {
        let mut fx = Fixture::new();
        let id = fx.add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        refresh(&mut fx.ctx(), id).unwrap();
        let note_id = fx.scene.anchor(id).unwrap().note_ref().unwrap();

        fx.scene.start_command("copy");
        let pairs = fx.scene.clone_objects(&[id], Affine::translate((0.0, 50.0)));
        fx.scene.finish_command();
        fx.pump();

        let copy = pairs[0].1;
        let copy_note = fx.scene.anchor(copy).unwrap().note_ref().unwrap();
        assert_ne!(copy_note, note_id);
        assert!(fx.scene.annotation(copy_note).unwrap().is_owned_by(copy));
        assert!(fx.scene.annotation(note_id).unwrap().is_owned_by(id));
    }

    #[test]
    fn test_lone_annotation_copy_is_swept() {
        let mut fx = Fixture::new();
        let id = fx.add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        refresh(&mut fx.ctx(), id).unwrap();
        let note_id = fx.scene.anchor(id).unwrap().note_ref().unwrap();

        fx.scene.start_command("copy");
        let pairs = fx.scene.clone_objects(&[note_id], Affine::translate((0.0, 5.0)));
        fx.scene.finish_command();
        fx.pump();

        assert!(!fx.scene.contains(pairs[0].1));
        assert_eq!(fx.scene.len(), 2);
    }

    #[test]
    fn test_shelf_feedback_snaps_and_signs() {
        let mut fx = Fixture::new();
        let id = fx.add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        refresh(&mut fx.ctx(), id).unwrap();
        let note_id = fx.scene.anchor(id).unwrap().note_ref().unwrap();

        fx.scene
            .annotation_mut(note_id)
            .unwrap()
            .set_shelf(Point::new(5.0, -12.0), 3.0);
        assert!(shelf_feedback(&mut fx.ctx(), note_id).unwrap());

        let anchor = fx.scene.anchor(id).unwrap();
        assert_eq!(anchor.note_angle(), std::f64::consts::PI);
        assert!((anchor.note_distance() + 12.0).abs() < 1e-9);
        let note = fx.scene.annotation(note_id).unwrap();
        assert_eq!(note.angle(), std::f64::consts::PI);
        assert!((note.rack_point().y + 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_shelf_feedback_respects_locked_owner() {
        let mut fx = Fixture::new();
        let id = fx.add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        refresh(&mut fx.ctx(), id).unwrap();
        let note_id = fx.scene.anchor(id).unwrap().note_ref().unwrap();
        fx.scene.lock(id);

        fx.scene
            .annotation_mut(note_id)
            .unwrap()
            .set_shelf(Point::new(5.0, -40.0), 3.0);
        assert!(!shelf_feedback(&mut fx.ctx(), note_id).unwrap());

        let anchor = fx.scene.anchor(id).unwrap();
        assert_eq!(anchor.note_angle(), 0.0);
        assert_eq!(anchor.note_distance(), 20.0);
        let note = fx.scene.annotation(note_id).unwrap();
        assert_eq!(note.rack_point(), Point::new(5.0, 20.0));
        assert_eq!(note.angle(), 0.0);
    }

    #[test]
    fn test_reconcile_all_rebuilds_registry() {
        let mut fx = Fixture::new();
        let id = fx.add_anchor(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        refresh(&mut fx.ctx(), id).unwrap();
        fx.links.clear();
        let stray = fx
            .scene
            .insert(SceneObject::Annotation(Annotation::new(Point::new(1.0, 1.0), ObjectId(99))));

        reconcile_all(&mut fx.ctx());
        fx.pump();

        assert_eq!(fx.links.len(), 1);
        assert!(!fx.scene.contains(stray));
    }
}
