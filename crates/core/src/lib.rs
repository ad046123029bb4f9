//! Notelink Core Library
//!
//! Linkage engine keeping drawing anchors and their dependent leader
//! annotations consistent across edits, duplication, erasure, undo and
//! document round-trips.

pub mod anchor;
pub mod annotation;
pub mod config;
pub mod consistency;
pub mod error;
pub mod geometry;
pub mod grip;
pub mod persistence;
pub mod placement;
pub mod properties;
pub mod record;
pub mod registry;
pub mod scene;
pub mod session;

pub use anchor::{Anchor, NoteKind, SegmentEnd};
pub use annotation::{Annotation, AnnotationLayout};
pub use config::LinkConfig;
pub use consistency::PassStats;
pub use error::{DenyReason, EditError, HookError, PropertyError, RecordError};
pub use geometry::{Segment, Tolerance};
pub use grip::{Grip, GripKind};
pub use persistence::{
    load_scene, save_scene, LoadReport, PersistenceError, PersistenceResult, SceneFile,
};
pub use placement::{place_anchor, PointInput, PromptResult, ScriptedInput};
pub use properties::{PropertyDescriptor, PropertyValue, ANCHOR_PROPERTIES};
pub use record::{read_anchor, write_anchor, AnchorRecord, ANCHOR_CLASS_ID};
pub use registry::{DuplicationLedger, LinkRegistry, TransformBatch};
pub use scene::{ObjectId, ObjectKind, Scene, SceneEvent, SceneObject};
pub use session::{CommandSummary, EditOutcome, InvariantViolation, Session};
