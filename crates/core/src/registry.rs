//! Scene-scoped bookkeeping used by the consistency pass
//!
//! - [`LinkRegistry`]: which anchor owns which annotation
//! - [`DuplicationLedger`]: clones awaiting link repair
//! - [`TransformBatch`]: anchors whose annotation needs a refresh at commit
//!
//! All three are plain data owned by the session; nothing here is global.

use crate::scene::ObjectId;
use std::collections::{BTreeMap, BTreeSet};

/// Annotation to owning anchor map
///
/// One-to-one in both directions: registering an annotation for an anchor
/// displaces any other annotation registered for it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkRegistry {
    owners: BTreeMap<ObjectId, ObjectId>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `annotation` as owned by `anchor`
    ///
    /// Returns annotations previously registered for the same anchor.
    pub fn register(&mut self, annotation: ObjectId, anchor: ObjectId) -> Vec<ObjectId> {
        let displaced: Vec<ObjectId> = self
            .owners
            .iter()
            .filter(|(note, owner)| **owner == anchor && **note != annotation)
            .map(|(note, _)| *note)
            .collect();
        for note in &displaced {
            self.owners.remove(note);
        }
        self.owners.insert(annotation, anchor);
        displaced
    }

    pub fn owner_of(&self, annotation: ObjectId) -> Option<ObjectId> {
        self.owners.get(&annotation).copied()
    }

    pub fn annotation_of(&self, anchor: ObjectId) -> Option<ObjectId> {
        self.owners
            .iter()
            .find(|(_, owner)| **owner == anchor)
            .map(|(note, _)| *note)
    }

    pub fn is_claimed(&self, annotation: ObjectId) -> bool {
        self.owners.contains_key(&annotation)
    }

    /// Drop the entry for an annotation, returning its owner
    pub fn remove(&mut self, annotation: ObjectId) -> Option<ObjectId> {
        self.owners.remove(&annotation)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, ObjectId)> + '_ {
        self.owners.iter().map(|(note, owner)| (*note, *owner))
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn clear(&mut self) {
        self.owners.clear();
    }
}

/// Clones recorded during a command, resolved at commit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DuplicationLedger {
    pending: Vec<(ObjectId, ObjectId)>,
}

impl DuplicationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, source: ObjectId, copy: ObjectId) {
        self.pending.push((source, copy));
    }

    /// Take every pending `(source, copy)` pair in recording order
    pub fn drain(&mut self) -> Vec<(ObjectId, ObjectId)> {
        std::mem::take(&mut self.pending)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Distinct anchors needing a refresh at commit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformBatch {
    anchors: BTreeSet<ObjectId>,
}

impl TransformBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an anchor; returns `false` if it was already batched
    pub fn insert(&mut self, anchor: ObjectId) -> bool {
        self.anchors.insert(anchor)
    }

    pub fn contains(&self, anchor: ObjectId) -> bool {
        self.anchors.contains(&anchor)
    }

    pub fn remove(&mut self, anchor: ObjectId) -> bool {
        self.anchors.remove(&anchor)
    }

    pub fn drain(&mut self) -> Vec<ObjectId> {
        std::mem::take(&mut self.anchors).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn clear(&mut self) {
        self.anchors.clear();
    }
}
