//! Editing session
//!
//! A [`Session`] owns a scene together with the linkage engine's bookkeeping
//! (link registry, duplication ledger, transform batch) and is the single
//! entry point for edits. Every edit runs inside a command; edits issued
//! outside one are wrapped in an implicit command that commits immediately.
//!
//! Denied modifications are absorbed: the edit reports
//! [`EditOutcome::Denied`] and nothing changes. Missing objects and objects
//! of the wrong kind are caller errors and are returned as [`EditError`].

use crate::anchor::{Anchor, NoteKind, SegmentEnd};
use crate::annotation::{Annotation, AnnotationLayout};
use crate::config::LinkConfig;
use crate::consistency::{self, PassContext, PassStats};
use crate::error::{EditError, PropertyError};
use crate::geometry::{Segment, Tolerance};
use crate::grip::{self, Grip, GripKind};
use crate::properties::{self, PropertyEdit, PropertyValue};
use crate::registry::{DuplicationLedger, LinkRegistry, TransformBatch};
use crate::scene::{ObjectId, ObjectKind, Scene, SceneCheckpoint, SceneObject};
use kurbo::{Affine, Point, Vec2};
use std::collections::BTreeSet;
use tracing::debug;

/// Result of an edit that passed argument validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The object changed
    Applied,
    /// The edit was allowed but had no effect
    Unchanged,
    /// The modification gate refused the edit
    Denied,
}

impl EditOutcome {
    fn from_changed(changed: bool) -> Self {
        if changed {
            EditOutcome::Applied
        } else {
            EditOutcome::Unchanged
        }
    }
}

/// What the consistency pass did during one command
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CommandSummary {
    pub name: String,
    pub refreshed: usize,
    pub created: usize,
    pub bound: usize,
    pub cleared: usize,
    pub erased: usize,
}

impl CommandSummary {
    fn new(name: String, stats: PassStats) -> Self {
        Self {
            name,
            refreshed: stats.refreshed,
            created: stats.created,
            bound: stats.bound,
            cleared: stats.cleared,
            erased: stats.erased,
        }
    }
}

/// A broken linkage invariant found by [`Session::check_invariants`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("anchor {anchor} has kind None but references {annotation}")]
    ReferenceWithoutNote { anchor: ObjectId, annotation: ObjectId },
    #[error("anchor {anchor} references missing annotation {annotation}")]
    DanglingReference { anchor: ObjectId, annotation: ObjectId },
    #[error("annotation {annotation} is registered to {registered:?}, expected {anchor}")]
    RegistryMismatch {
        anchor: ObjectId,
        annotation: ObjectId,
        registered: Option<ObjectId>,
    },
    #[error("annotation {annotation} is not claimed by any anchor")]
    OrphanAnnotation { annotation: ObjectId },
    #[error("annotated anchor {anchor} has no annotation")]
    MissingAnnotation { anchor: ObjectId },
    #[error("annotation {annotation} does not match its anchor {anchor}")]
    StaleLayout { anchor: ObjectId, annotation: ObjectId },
    #[error("anchor point of {anchor} is off its segment")]
    AnchorOffSegment { anchor: ObjectId },
    #[error("shelf angle of {anchor} is {angle}, expected 0 or PI")]
    UnsnappedAngle { anchor: ObjectId, angle: f64 },
    #[error("anchor {anchor} was never initialized")]
    UndefinedKind { anchor: ObjectId },
}

struct ActiveCommand {
    name: String,
    checkpoint: SceneCheckpoint,
}

/// Scene plus linkage engine state
pub struct Session {
    scene: Scene,
    config: LinkConfig,
    links: LinkRegistry,
    ledger: DuplicationLedger,
    batch: TransformBatch,
    stats: PassStats,
    active: Option<ActiveCommand>,
    undo: Option<SceneCheckpoint>,
}

impl Session {
    /// Create a session over an empty scene
    pub fn new(config: LinkConfig) -> Self {
        Self::with_scene(Scene::new(), config)
    }

    /// Adopt a freshly loaded scene
    ///
    /// The link registry is rebuilt from the anchors' references and every
    /// invariant is re-established before the session is returned.
    pub fn from_loaded(scene: Scene, config: LinkConfig) -> Self {
        let mut session = Self::with_scene(scene, config);
        let stats = session.reconcile();
        debug!(
            anchors = session.scene.anchors().count(),
            created = stats.created,
            erased = stats.erased,
            "loaded scene reconciled"
        );
        session
    }

    fn with_scene(scene: Scene, config: LinkConfig) -> Self {
        Self {
            scene,
            config,
            links: LinkRegistry::new(),
            ledger: DuplicationLedger::new(),
            batch: TransformBatch::new(),
            stats: PassStats::default(),
            active: None,
            undo: None,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Host access to the scene (locking, read-only mode, redraw tracking)
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn links(&self) -> &LinkRegistry {
        &self.links
    }

    pub fn ledger(&self) -> &DuplicationLedger {
        &self.ledger
    }

    pub fn batch(&self) -> &TransformBatch {
        &self.batch
    }

    pub fn active_command(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.name.as_str())
    }

    pub fn can_undo(&self) -> bool {
        self.active.is_none() && self.undo.is_some()
    }

    fn pass(&mut self) -> PassContext<'_> {
        PassContext {
            scene: &mut self.scene,
            links: &mut self.links,
            ledger: &mut self.ledger,
            batch: &mut self.batch,
            config: &self.config,
            stats: &mut self.stats,
        }
    }

    /// Deliver queued scene events until none are left
    fn pump(&mut self) {
        let mut ctx = self.pass();
        while let Some(event) = ctx.scene.pop_event() {
            consistency::dispatch(&mut ctx, event);
        }
    }

    /// Run a full consistency pass over the whole scene
    pub fn reconcile(&mut self) -> PassStats {
        let before = self.stats;
        self.stats = PassStats::default();
        consistency::reconcile_all(&mut self.pass());
        self.pump();
        let stats = self.stats;
        self.stats = before;
        stats
    }

    // -- Commands --

    pub fn begin_command(&mut self, name: impl Into<String>) -> Result<(), EditError> {
        if let Some(active) = &self.active {
            return Err(EditError::CommandActive(active.name.clone()));
        }
        let name = name.into();
        self.stats = PassStats::default();
        self.scene.start_command(&name);
        self.active = Some(ActiveCommand {
            name,
            checkpoint: self.scene.checkpoint(),
        });
        self.pump();
        Ok(())
    }

    /// Commit the active command
    ///
    /// Runs the pre-commit pass (duplicate resolution, batched refreshes,
    /// orphan sweep) and records the command for undo.
    pub fn commit_command(&mut self) -> Result<CommandSummary, EditError> {
        let active = self.active.take().ok_or(EditError::NoActiveCommand)?;
        self.scene.finish_command();
        self.pump();
        self.undo = Some(active.checkpoint);

        let summary = CommandSummary::new(active.name, self.stats);
        debug!(
            command = %summary.name,
            refreshed = summary.refreshed,
            created = summary.created,
            bound = summary.bound,
            erased = summary.erased,
            "command committed"
        );
        Ok(summary)
    }

    /// Abandon the active command, discarding everything it did
    pub fn cancel_command(&mut self) -> Result<(), EditError> {
        let active = self.active.take().ok_or(EditError::NoActiveCommand)?;
        let appended = self.scene.take_appended();
        self.scene.restore(active.checkpoint);
        self.ledger.clear();
        self.batch.clear();
        self.reconcile();
        debug!(command = %active.name, discarded = appended.len(), "command cancelled");
        Ok(())
    }

    /// Revert the last committed command
    pub fn undo(&mut self) -> Result<(), EditError> {
        if let Some(active) = &self.active {
            return Err(EditError::CommandActive(active.name.clone()));
        }
        let checkpoint = self.undo.take().ok_or(EditError::NothingToUndo)?;
        self.scene.restore(checkpoint);
        self.ledger.clear();
        self.batch.clear();
        self.reconcile();
        debug!("last command undone");
        Ok(())
    }

    /// Run `edit` inside the active command, or inside an implicit one
    fn run<T>(
        &mut self,
        name: &str,
        edit: impl FnOnce(&mut Self) -> Result<T, EditError>,
    ) -> Result<T, EditError> {
        let implicit = self.active.is_none();
        if implicit {
            self.begin_command(name)?;
        }
        let result = edit(self);
        if implicit {
            match &result {
                Ok(_) => {
                    self.commit_command()?;
                }
                Err(_) => self.cancel_command()?,
            }
        }
        result
    }

    // -- Gating --

    /// Pass an object through the modification gate
    ///
    /// Returns `Ok(false)` for a denied edit.
    fn gate(&self, id: ObjectId) -> Result<bool, EditError> {
        match self.scene.begin_modify(id) {
            Ok(()) => Ok(true),
            Err(EditError::ModificationDenied { id, reason }) => {
                debug!(%id, %reason, "edit denied");
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    fn require_anchor(&self, id: ObjectId) -> Result<&Anchor, EditError> {
        match self.scene.get(id) {
            Some(SceneObject::Anchor(anchor)) => Ok(anchor),
            Some(_) => Err(EditError::WrongKind {
                id,
                expected: ObjectKind::Anchor,
            }),
            None => Err(EditError::NotFound(id)),
        }
    }

    /// Gate an anchor edit; `None` means denied
    fn anchor_for_edit(&mut self, id: ObjectId) -> Result<Option<&mut Anchor>, EditError> {
        self.require_anchor(id)?;
        if !self.gate(id)? {
            return Ok(None);
        }
        self.scene.anchor_mut(id).map(Some).ok_or(EditError::NotFound(id))
    }

    /// Gate and apply an anchor edit, then schedule or run the refresh
    fn edit_anchor(
        &mut self,
        name: &str,
        id: ObjectId,
        immediate: bool,
        edit: impl FnOnce(&mut Anchor) -> bool,
    ) -> Result<EditOutcome, EditError> {
        self.run(name, |session| {
            let Some(anchor) = session.anchor_for_edit(id)? else {
                return Ok(EditOutcome::Denied);
            };
            let changed = edit(anchor);
            if changed {
                session.scene.mark_dirty(id);
                if immediate {
                    consistency::refresh_now(&mut session.pass(), id);
                } else {
                    session.batch.insert(id);
                }
            }
            Ok(EditOutcome::from_changed(changed))
        })
    }

    // -- Anchor edits --

    /// Create an anchor on a segment
    ///
    /// Its annotation is created when the command commits.
    pub fn add_anchor(&mut self, start: Point, end: Point) -> Result<ObjectId, EditError> {
        self.run("add_anchor", |session| {
            let anchor = Anchor::with_segment(start, end, &session.config);
            Ok(session.insert_anchor(anchor))
        })
    }

    pub(crate) fn insert_anchor(&mut self, anchor: Anchor) -> ObjectId {
        let id = self.scene.insert(SceneObject::Anchor(anchor));
        self.batch.insert(id);
        id
    }

    /// Place an anchor on two points without re-deriving the anchor point
    pub(crate) fn place_segment(
        &mut self,
        id: ObjectId,
        start: Point,
        end: Point,
    ) -> Result<EditOutcome, EditError> {
        let Some(anchor) = self.anchor_for_edit(id)? else {
            return Ok(EditOutcome::Denied);
        };
        anchor.set_segment(start, end);
        self.scene.mark_dirty(id);
        self.batch.insert(id);
        Ok(EditOutcome::Applied)
    }

    /// Replace an anchor's segment, holding the anchor point's position
    pub fn set_geometry(&mut self, id: ObjectId, segment: Segment) -> Result<EditOutcome, EditError> {
        self.edit_anchor("set_geometry", id, false, |anchor| anchor.apply_geometry(segment))
    }

    pub fn move_endpoint(
        &mut self,
        id: ObjectId,
        end: SegmentEnd,
        offset: Vec2,
    ) -> Result<EditOutcome, EditError> {
        self.edit_anchor("move_endpoint", id, false, |anchor| anchor.move_endpoint(end, offset))
    }

    /// Slide the anchor point along its segment; the annotation follows at once
    pub fn move_anchor_point(&mut self, id: ObjectId, offset: Vec2) -> Result<EditOutcome, EditError> {
        self.edit_anchor("move_anchor_point", id, true, |anchor| {
            anchor.move_anchor_point(offset)
        })
    }

    pub fn grips(&self, id: ObjectId) -> Result<Vec<Grip>, EditError> {
        let anchor = self.require_anchor(id)?;
        Ok(grip::grips_for(anchor, &self.config.tolerance))
    }

    /// Drag one grip; see [`grip::drag_grip`]
    pub fn drag_grip(
        &mut self,
        id: ObjectId,
        kind: GripKind,
        offset: Vec2,
        stretch: bool,
    ) -> Result<EditOutcome, EditError> {
        let immediate = stretch && kind == GripKind::AnchorPoint;
        self.edit_anchor("drag_grip", id, immediate, |anchor| {
            grip::drag_grip(anchor, kind, offset, stretch)
        })
    }

    /// Set the segment length; non-positive lengths are ignored
    pub fn set_length(&mut self, id: ObjectId, length: f64) -> Result<EditOutcome, EditError> {
        if !length.is_finite() || length <= 0.0 {
            debug!(%id, length, "ignoring non-positive length");
            self.require_anchor(id)?;
            return Ok(EditOutcome::Unchanged);
        }
        self.edit_anchor("set_length", id, false, |anchor| {
            let before = *anchor.geometry();
            anchor.set_length(length) && *anchor.geometry() != before
        })
    }

    pub fn set_name(&mut self, id: ObjectId, name: &str) -> Result<EditOutcome, EditError> {
        self.edit_anchor("set_name", id, false, |anchor| anchor.set_name(name))
    }

    /// Switch the annotation state of an anchor
    ///
    /// `None` erases the annotation right away. `Annotated` defers creation
    /// to the end of the command.
    pub fn set_note_kind(&mut self, id: ObjectId, kind: NoteKind) -> Result<EditOutcome, EditError> {
        if kind == NoteKind::Undefined {
            return Err(PropertyError::OutOfDomain {
                name: "NoteKind",
                value: kind.label().to_string(),
            }
            .into());
        }
        self.run("set_note_kind", |session| {
            let Some(anchor) = session.anchor_for_edit(id)? else {
                return Ok(EditOutcome::Denied);
            };
            if anchor.note_kind() == kind {
                return Ok(EditOutcome::Unchanged);
            }
            let released = anchor.set_note_kind(kind);
            session.release_annotation(id, released);
            Ok(EditOutcome::Applied)
        })
    }

    /// Copy name and annotation state from another anchor
    pub fn copy_attributes(&mut self, id: ObjectId, from: ObjectId) -> Result<EditOutcome, EditError> {
        let source = self.require_anchor(from)?.clone();
        self.run("copy_attributes", |session| {
            let Some(anchor) = session.anchor_for_edit(id)? else {
                return Ok(EditOutcome::Denied);
            };
            if anchor.name() == source.name() && anchor.note_kind() == source.note_kind() {
                return Ok(EditOutcome::Unchanged);
            }
            let released = anchor.copy_attributes_from(&source);
            session.release_annotation(id, released);
            Ok(EditOutcome::Applied)
        })
    }

    /// Erase an annotation let go by its anchor and batch the anchor
    fn release_annotation(&mut self, id: ObjectId, released: Option<ObjectId>) {
        self.scene.mark_dirty(id);
        self.batch.insert(id);
        if let Some(note_id) = released {
            self.scene.erase(&[note_id]);
            self.pump();
        }
    }

    /// Write a property through the inspector surface
    pub fn set_property(
        &mut self,
        id: ObjectId,
        name: &str,
        value: PropertyValue,
    ) -> Result<EditOutcome, EditError> {
        self.require_anchor(id)?;
        match properties::parse_edit(name, value)? {
            PropertyEdit::Name(name) => self.set_name(id, &name),
            PropertyEdit::Length(length) => self.set_length(id, length),
            PropertyEdit::NoteKind(kind) => self.set_note_kind(id, kind),
        }
    }

    // -- Bulk edits --

    /// Transform objects; returns how many were allowed to change
    ///
    /// Anchors are batched for a refresh at commit. An annotation moved
    /// without its owner has its shelf folded back into the owner.
    pub fn transform(&mut self, ids: &[ObjectId], affine: Affine) -> Result<usize, EditError> {
        self.run("transform", |session| {
            let requested: BTreeSet<ObjectId> = ids.iter().copied().collect();
            let mut moved = BTreeSet::new();
            for id in requested {
                if session.gate(id)? {
                    moved.insert(id);
                }
            }

            let mut shelves = Vec::new();
            for &id in &moved {
                let Some(object) = session.scene.get_mut(id) else {
                    continue;
                };
                object.transform(affine);
                match object.kind() {
                    ObjectKind::Anchor => {
                        session.batch.insert(id);
                    }
                    ObjectKind::Annotation => {
                        let owner_moved = session
                            .links
                            .owner_of(id)
                            .is_some_and(|owner| moved.contains(&owner));
                        if !owner_moved {
                            shelves.push(id);
                        }
                    }
                }
                session.scene.mark_dirty(id);
            }
            for id in shelves {
                consistency::shelf_edited(&mut session.pass(), id);
            }
            session.pump();
            Ok(moved.len())
        })
    }

    /// Clone objects with an offset transform; returns the new ids
    pub fn duplicate(&mut self, ids: &[ObjectId], affine: Affine) -> Result<Vec<ObjectId>, EditError> {
        self.run("duplicate", |session| {
            let pairs = session.scene.clone_objects(ids, affine);
            session.pump();
            Ok(pairs.into_iter().map(|(_, copy)| copy).collect())
        })
    }

    /// Erase objects as one group; returns the ids actually erased
    ///
    /// Missing and denied objects are skipped.
    pub fn erase(&mut self, ids: &[ObjectId]) -> Result<Vec<ObjectId>, EditError> {
        self.run("erase", |session| {
            let mut allowed = Vec::with_capacity(ids.len());
            for &id in ids {
                match session.gate(id) {
                    Ok(true) => allowed.push(id),
                    Ok(false) => {}
                    Err(EditError::NotFound(_)) => debug!(%id, "erase skipped missing object"),
                    Err(error) => return Err(error),
                }
            }
            let erased = session.scene.erase(&allowed);
            session.pump();
            Ok(erased)
        })
    }

    /// Drag an annotation's shelf to `rack` with the given angle
    pub fn drag_shelf(
        &mut self,
        annotation_id: ObjectId,
        rack: Point,
        angle: f64,
    ) -> Result<EditOutcome, EditError> {
        self.run("drag_shelf", |session| {
            if session.scene.annotation(annotation_id).is_none() {
                return Err(match session.scene.get(annotation_id) {
                    Some(_) => EditError::WrongKind {
                        id: annotation_id,
                        expected: ObjectKind::Annotation,
                    },
                    None => EditError::NotFound(annotation_id),
                });
            }
            if !session.gate(annotation_id)? {
                return Ok(EditOutcome::Denied);
            }
            if let Some(annotation) = session.scene.annotation_mut(annotation_id) {
                annotation.set_shelf(rack, angle);
            }
            session.scene.mark_dirty(annotation_id);
            let accepted = consistency::shelf_edited(&mut session.pass(), annotation_id);
            session.pump();
            Ok(if accepted {
                EditOutcome::Applied
            } else {
                EditOutcome::Denied
            })
        })
    }

    // -- Diagnostics --

    /// Check every linkage invariant
    ///
    /// Layout and existence checks are skipped while a command is active,
    /// since refreshes are deferred to commit.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        let tolerance: Tolerance = self.config.tolerance;
        let settled = self.active.is_none();

        for (anchor_id, anchor) in self.scene.anchors() {
            if anchor.note_kind() == NoteKind::Undefined {
                violations.push(InvariantViolation::UndefinedKind { anchor: anchor_id });
            }
            if !anchor.anchor_on_geometry(&tolerance) {
                violations.push(InvariantViolation::AnchorOffSegment { anchor: anchor_id });
            }
            let angle = anchor.note_angle();
            if angle != 0.0 && angle != std::f64::consts::PI {
                violations.push(InvariantViolation::UnsnappedAngle {
                    anchor: anchor_id,
                    angle,
                });
            }

            match anchor.note_ref() {
                Some(note_id) if anchor.note_kind() == NoteKind::None => {
                    violations.push(InvariantViolation::ReferenceWithoutNote {
                        anchor: anchor_id,
                        annotation: note_id,
                    });
                }
                Some(note_id) => {
                    let Some(annotation) = self.scene.annotation(note_id) else {
                        violations.push(InvariantViolation::DanglingReference {
                            anchor: anchor_id,
                            annotation: note_id,
                        });
                        continue;
                    };
                    let registered = self.links.owner_of(note_id);
                    if registered != Some(anchor_id) || !annotation.is_owned_by(anchor_id) {
                        violations.push(InvariantViolation::RegistryMismatch {
                            anchor: anchor_id,
                            annotation: note_id,
                            registered,
                        });
                    }
                    if settled && !layout_matches(anchor, annotation, &self.config) {
                        violations.push(InvariantViolation::StaleLayout {
                            anchor: anchor_id,
                            annotation: note_id,
                        });
                    }
                }
                None if settled && anchor.note_kind() == NoteKind::Annotated => {
                    violations.push(InvariantViolation::MissingAnnotation { anchor: anchor_id });
                }
                None => {}
            }
        }

        for (note_id, _) in self.scene.annotations() {
            let claimed = self
                .links
                .owner_of(note_id)
                .and_then(|owner| self.scene.anchor(owner))
                .is_some_and(|anchor| anchor.note_ref() == Some(note_id));
            if !claimed && !consistency::held_by_proxy(&self.scene, note_id) {
                violations.push(InvariantViolation::OrphanAnnotation { annotation: note_id });
            }
        }
        violations
    }
}

fn layout_matches(anchor: &Anchor, annotation: &Annotation, config: &LinkConfig) -> bool {
    let layout = AnnotationLayout::for_anchor(anchor);
    let tolerance = &config.tolerance;
    let delta = annotation.angle() - layout.angle;
    tolerance.points_equal(annotation.first_point(), layout.first_point)
        && tolerance.points_equal(annotation.second_point(), layout.second_point)
        && tolerance.points_equal(annotation.rack_point(), layout.rack_point)
        && delta.sin().abs() <= config.angle_epsilon
        && delta.cos() > 0.0
        && annotation.label() == layout.label
}
