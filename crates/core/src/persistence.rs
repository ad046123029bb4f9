//! Scene persistence
//!
//! Saves and loads a scene as a JSON document. Anchors are stored as
//! versioned records (see [`record`](crate::record)); annotations are
//! stored as plain serde structs. Records that cannot be instantiated are
//! kept as proxies and written back verbatim.

use crate::annotation::Annotation;
use crate::config::LinkConfig;
use crate::error::RecordError;
use crate::record::{read_anchor, write_anchor, AnchorRecord};
use crate::scene::{ObjectId, Scene, SceneObject};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Current scene file format version
pub const SCENE_FILE_VERSION: u32 = 1;

/// Error types for persistence operations
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record error: {0}")]
    Record(#[from] RecordError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported scene file version {0}")]
    UnsupportedVersion(u32),
}

/// Result type for persistence operations
pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAnchor {
    id: ObjectId,
    record: AnchorRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAnnotation {
    id: ObjectId,
    #[serde(flatten)]
    annotation: Annotation,
}

/// On-disk scene document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneFile {
    version: u32,
    next_id: u64,
    anchors: Vec<StoredAnchor>,
    annotations: Vec<StoredAnnotation>,
}

/// What happened while loading a scene
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub anchors: usize,
    pub annotations: usize,
    /// Records kept verbatim because their major version is unsupported
    pub proxies: Vec<ObjectId>,
    /// Entries dropped because they could not be read or reused an id
    pub skipped: Vec<(ObjectId, RecordError)>,
}

impl LoadReport {
    fn skip_duplicate(&mut self, id: ObjectId) {
        let error = RecordError::DuplicateId(id);
        warn!(%id, %error, "skipping entry with colliding id");
        self.skipped.push((id, error));
    }
}

impl SceneFile {
    /// Capture a scene
    pub fn from_scene(scene: &Scene) -> Self {
        let mut anchors: Vec<StoredAnchor> = scene
            .anchors()
            .map(|(id, anchor)| StoredAnchor {
                id,
                record: write_anchor(anchor),
            })
            .collect();
        anchors.extend(scene.proxies().map(|(id, record)| StoredAnchor {
            id,
            record: record.clone(),
        }));
        anchors.sort_by_key(|stored| stored.id);

        let annotations = scene
            .annotations()
            .map(|(id, annotation)| StoredAnnotation {
                id,
                annotation: annotation.clone(),
            })
            .collect();

        Self {
            version: SCENE_FILE_VERSION,
            next_id: scene.next_id(),
            anchors,
            annotations,
        }
    }

    /// Rebuild a scene
    ///
    /// The link registry is not part of the file; adopt the result with
    /// [`Session::from_loaded`](crate::session::Session::from_loaded) to
    /// rebuild it.
    pub fn into_scene(self, config: &LinkConfig) -> PersistenceResult<(Scene, LoadReport)> {
        if self.version != SCENE_FILE_VERSION {
            return Err(PersistenceError::UnsupportedVersion(self.version));
        }

        let mut scene = Scene::new();
        let mut report = LoadReport::default();

        for stored in self.anchors {
            match read_anchor(&stored.record, config) {
                Ok(anchor) => {
                    if scene.insert_with_id(stored.id, SceneObject::Anchor(anchor)) {
                        report.anchors += 1;
                    } else {
                        report.skip_duplicate(stored.id);
                    }
                }
                Err(error) if error.needs_proxy() => {
                    if scene.insert_proxy(stored.id, stored.record) {
                        debug!(id = %stored.id, %error, "keeping anchor record as proxy");
                        report.proxies.push(stored.id);
                    } else {
                        report.skip_duplicate(stored.id);
                    }
                }
                Err(error) => {
                    warn!(id = %stored.id, %error, "skipping unreadable anchor record");
                    report.skipped.push((stored.id, error));
                }
            }
        }

        for stored in self.annotations {
            if scene.insert_with_id(stored.id, SceneObject::Annotation(stored.annotation)) {
                report.annotations += 1;
            } else {
                report.skip_duplicate(stored.id);
            }
        }

        scene.set_next_id(self.next_id);
        Ok((scene, report))
    }
}

/// Save a scene to a JSON file
///
/// The file is written to a temporary sibling first and renamed into place.
pub fn save_scene(scene: &Scene, path: &Path) -> PersistenceResult<PathBuf> {
    let json = serde_json::to_string_pretty(&SceneFile::from_scene(scene))?;

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, json)?;
    fs::rename(&temp_path, path)?;

    Ok(path.to_path_buf())
}

/// Load a scene from a JSON file
pub fn load_scene(path: &Path, config: &LinkConfig) -> PersistenceResult<(Scene, LoadReport)> {
    let json = fs::read_to_string(path)?;
    let file: SceneFile = serde_json::from_str(&json)?;
    file.into_scene(config)
}
