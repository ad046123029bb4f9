//! In-memory scene: the host side of the linkage engine
//!
//! Objects live in an id-indexed arena and refer to each other by
//! [`ObjectId`] only. The scene also provides the host facilities the engine
//! relies on: a modification gate, bulk erase, generic clone, command
//! bookkeeping and an ordered lifecycle event feed.

use crate::anchor::Anchor;
use crate::annotation::Annotation;
use crate::error::{DenyReason, EditError};
use kurbo::Affine;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Stable scene-wide object identifier
///
/// Allocated on insertion and never reused within a scene.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of a scene object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Anchor,
    Annotation,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Anchor => write!(f, "anchor"),
            ObjectKind::Annotation => write!(f, "annotation"),
        }
    }
}

/// Object stored in the scene
#[derive(Debug, Clone, PartialEq)]
pub enum SceneObject {
    Anchor(Anchor),
    Annotation(Annotation),
}

impl SceneObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            SceneObject::Anchor(_) => ObjectKind::Anchor,
            SceneObject::Annotation(_) => ObjectKind::Annotation,
        }
    }

    pub fn as_anchor(&self) -> Option<&Anchor> {
        match self {
            SceneObject::Anchor(anchor) => Some(anchor),
            SceneObject::Annotation(_) => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&Annotation> {
        match self {
            SceneObject::Annotation(annotation) => Some(annotation),
            SceneObject::Anchor(_) => None,
        }
    }

    /// Apply a transform to the object's own geometry
    pub(crate) fn transform(&mut self, affine: Affine) {
        match self {
            SceneObject::Anchor(anchor) => anchor.transform(affine),
            SceneObject::Annotation(annotation) => {
                let first = affine * annotation.first_point();
                let second = affine * annotation.second_point();
                let rack = affine * annotation.rack_point();
                annotation.move_points(first, second, rack);
            }
        }
    }
}

/// Lifecycle notification emitted by the scene
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// A new command began
    CommandStarted { name: String },

    /// `copy` was produced by cloning `source`
    ObjectDuplicated { source: ObjectId, copy: ObjectId },

    /// An object was erased; `object` is its last state and `group` every
    /// id erased in the same bulk operation
    ObjectErased {
        id: ObjectId,
        object: SceneObject,
        group: BTreeSet<ObjectId>,
    },

    /// The command is about to commit; `appended` lists objects it created
    BeforeCommit { appended: Vec<ObjectId> },
}

/// Point-in-time copy of the scene contents
#[derive(Debug, Clone)]
pub struct SceneCheckpoint {
    objects: BTreeMap<ObjectId, SceneObject>,
    proxies: BTreeMap<ObjectId, serde_json::Map<String, serde_json::Value>>,
}

/// Id-indexed object store with host lifecycle facilities
#[derive(Debug)]
pub struct Scene {
    objects: BTreeMap<ObjectId, SceneObject>,

    /// Records kept verbatim because they could not be instantiated
    proxies: BTreeMap<ObjectId, serde_json::Map<String, serde_json::Value>>,

    next_id: u64,
    locked: BTreeSet<ObjectId>,
    read_only: bool,

    /// Objects inserted since the current command started
    appended: Vec<ObjectId>,

    events: VecDeque<SceneEvent>,

    /// Objects needing redraw
    dirty: BTreeSet<ObjectId>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            proxies: BTreeMap::new(),
            next_id: 1,
            locked: BTreeSet::new(),
            read_only: false,
            appended: Vec::new(),
            events: VecDeque::new(),
            dirty: BTreeSet::new(),
        }
    }

    // -- Storage --

    /// Insert an object and return its new id
    pub fn insert(&mut self, object: SceneObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, object);
        self.appended.push(id);
        self.dirty.insert(id);
        id
    }

    /// Insert an object under a known id (document load)
    ///
    /// Returns `false` and leaves the scene untouched if the id is taken.
    pub(crate) fn insert_with_id(&mut self, id: ObjectId, object: SceneObject) -> bool {
        if self.id_taken(id) {
            return false;
        }
        self.next_id = self.next_id.max(id.0 + 1);
        self.objects.insert(id, object);
        true
    }

    /// Keep an unreadable record so it survives a save
    ///
    /// Returns `false` if the id is taken.
    pub(crate) fn insert_proxy(
        &mut self,
        id: ObjectId,
        record: serde_json::Map<String, serde_json::Value>,
    ) -> bool {
        if self.id_taken(id) {
            return false;
        }
        self.next_id = self.next_id.max(id.0 + 1);
        self.proxies.insert(id, record);
        true
    }

    fn id_taken(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id) || self.proxies.contains_key(&id)
    }

    pub fn proxies(&self) -> impl Iterator<Item = (ObjectId, &serde_json::Map<String, serde_json::Value>)> {
        self.proxies.iter().map(|(id, record)| (*id, record))
    }

    pub(crate) fn set_next_id(&mut self, next_id: u64) {
        self.next_id = self.next_id.max(next_id);
    }

    /// Next id that will be allocated
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn anchor(&self, id: ObjectId) -> Option<&Anchor> {
        self.objects.get(&id).and_then(SceneObject::as_anchor)
    }

    pub(crate) fn anchor_mut(&mut self, id: ObjectId) -> Option<&mut Anchor> {
        match self.objects.get_mut(&id) {
            Some(SceneObject::Anchor(anchor)) => Some(anchor),
            _ => None,
        }
    }

    pub fn annotation(&self, id: ObjectId) -> Option<&Annotation> {
        self.objects.get(&id).and_then(SceneObject::as_annotation)
    }

    pub(crate) fn annotation_mut(&mut self, id: ObjectId) -> Option<&mut Annotation> {
        match self.objects.get_mut(&id) {
            Some(SceneObject::Annotation(annotation)) => Some(annotation),
            _ => None,
        }
    }

    /// All object ids in ascending order
    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    pub fn anchors(&self) -> impl Iterator<Item = (ObjectId, &Anchor)> {
        self.objects
            .iter()
            .filter_map(|(id, object)| object.as_anchor().map(|anchor| (*id, anchor)))
    }

    pub fn annotations(&self) -> impl Iterator<Item = (ObjectId, &Annotation)> {
        self.objects
            .iter()
            .filter_map(|(id, object)| object.as_annotation().map(|a| (*id, a)))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    // -- Modification gate --

    /// Ask permission to modify an object
    pub fn begin_modify(&self, id: ObjectId) -> Result<(), EditError> {
        if !self.objects.contains_key(&id) {
            return Err(EditError::NotFound(id));
        }
        if self.read_only {
            return Err(EditError::ModificationDenied {
                id,
                reason: DenyReason::ReadOnly,
            });
        }
        if self.locked.contains(&id) {
            return Err(EditError::ModificationDenied {
                id,
                reason: DenyReason::Locked,
            });
        }
        Ok(())
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn lock(&mut self, id: ObjectId) {
        self.locked.insert(id);
    }

    pub fn unlock(&mut self, id: ObjectId) {
        self.locked.remove(&id);
    }

    // -- Bulk operations --

    /// Erase objects as one group
    ///
    /// Every object is removed before any `ObjectErased` event is queued, so
    /// handlers see the final state of the group. Returns the erased ids.
    pub fn erase(&mut self, ids: &[ObjectId]) -> Vec<ObjectId> {
        let group: BTreeSet<ObjectId> = ids
            .iter()
            .copied()
            .filter(|id| self.objects.contains_key(id))
            .collect();

        let mut removed = Vec::with_capacity(group.len());
        for id in &group {
            if let Some(object) = self.objects.remove(id) {
                self.dirty.remove(id);
                self.locked.remove(id);
                removed.push((*id, object));
            }
        }

        let erased: Vec<ObjectId> = removed.iter().map(|(id, _)| *id).collect();
        for (id, object) in removed {
            self.events.push_back(SceneEvent::ObjectErased {
                id,
                object,
                group: group.clone(),
            });
        }
        erased
    }

    /// Clone objects verbatim, transformed by `affine`
    ///
    /// Cross-references are copied as they are, exactly like a generic host
    /// clone; repairing them is the consistency pass's job. Returns
    /// `(source, copy)` pairs.
    pub fn clone_objects(&mut self, ids: &[ObjectId], affine: Affine) -> Vec<(ObjectId, ObjectId)> {
        let mut pairs = Vec::with_capacity(ids.len());
        for &source in ids {
            let Some(object) = self.objects.get(&source) else {
                continue;
            };
            let mut copy = object.clone();
            copy.transform(affine);
            let copy_id = self.insert(copy);
            self.events.push_back(SceneEvent::ObjectDuplicated {
                source,
                copy: copy_id,
            });
            pairs.push((source, copy_id));
        }
        pairs
    }

    // -- Command bookkeeping --

    /// Start tracking a new command
    pub(crate) fn start_command(&mut self, name: &str) {
        self.appended.clear();
        self.events.push_back(SceneEvent::CommandStarted {
            name: name.to_string(),
        });
    }

    /// Queue the pre-commit notification for the current command
    pub(crate) fn finish_command(&mut self) {
        let appended: Vec<ObjectId> = self
            .appended
            .drain(..)
            .filter(|id| self.objects.contains_key(id))
            .collect();
        self.events.push_back(SceneEvent::BeforeCommit { appended });
    }

    /// Objects inserted since the current command started
    pub fn appended_in_command(&self) -> &[ObjectId] {
        &self.appended
    }

    pub(crate) fn take_appended(&mut self) -> Vec<ObjectId> {
        std::mem::take(&mut self.appended)
    }

    pub(crate) fn pop_event(&mut self) -> Option<SceneEvent> {
        self.events.pop_front()
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }

    // -- Redraw --

    pub fn mark_dirty(&mut self, id: ObjectId) {
        if self.objects.contains_key(&id) {
            self.dirty.insert(id);
        }
    }

    pub fn is_dirty(&self, id: ObjectId) -> bool {
        self.dirty.contains(&id)
    }

    /// Take the set of objects needing redraw
    pub fn take_dirty(&mut self) -> BTreeSet<ObjectId> {
        std::mem::take(&mut self.dirty)
    }

    // -- Checkpoints --

    pub fn checkpoint(&self) -> SceneCheckpoint {
        SceneCheckpoint {
            objects: self.objects.clone(),
            proxies: self.proxies.clone(),
        }
    }

    /// Restore a checkpoint
    ///
    /// The id allocator keeps advancing so ids are never reused. Pending
    /// events and command tracking are discarded.
    pub fn restore(&mut self, checkpoint: SceneCheckpoint) {
        self.dirty = self
            .objects
            .keys()
            .chain(checkpoint.objects.keys())
            .copied()
            .collect();
        self.objects = checkpoint.objects;
        self.proxies = checkpoint.proxies;
        self.dirty.retain(|id| self.objects.contains_key(id));
        self.appended.clear();
        self.events.clear();
    }
}
