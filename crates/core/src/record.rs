//! Versioned persisted form of an anchor
//!
//! A record is a flat key/value map. The current writer emits version 1.8.
//! Fields added after 1.0 are optional when reading and default when absent:
//!
//! | key            | since | default                         |
//! |----------------|-------|---------------------------------|
//! | `NodeGeometry` | 1.0   | required                        |
//! | `TextPoint`    | 1.0   | midpoint of the geometry        |
//! | `SNoteID`      | 1.0   | none                            |
//! | `Name`         | 1.0   | configured default name         |
//! | `NoteAngle`    | 1.2   | `0`                             |
//! | `NoteDistance` | 1.2   | configured default distance     |
//! | `NoteType`     | 1.5   | annotated                       |
//!
//! A record with a different major version, or without `Major`/`Minor`, is
//! not read at all; the caller keeps it as a proxy.

use crate::anchor::{Anchor, NoteKind};
use crate::config::LinkConfig;
use crate::error::RecordError;
use crate::geometry::Segment;
use crate::scene::ObjectId;
use kurbo::Point;
use serde_json::{json, Map, Value};
use tracing::warn;
use uuid::{uuid, Uuid};

pub const RECORD_MAJOR: i64 = 1;
pub const RECORD_MINOR: i64 = 8;

/// Class identifier stamped on every anchor record
pub const ANCHOR_CLASS_ID: Uuid = uuid!("6e0f3c1a-52d4-4b8e-9a7f-1c2d3e4f5a60");

pub type AnchorRecord = Map<String, Value>;

const KEY_CLASS: &str = "ClassId";
const KEY_MAJOR: &str = "Major";
const KEY_MINOR: &str = "Minor";
const KEY_GEOMETRY: &str = "NodeGeometry";
const KEY_TEXT_POINT: &str = "TextPoint";
const KEY_NOTE_ID: &str = "SNoteID";
const KEY_NAME: &str = "Name";
const KEY_NOTE_ANGLE: &str = "NoteAngle";
const KEY_NOTE_DISTANCE: &str = "NoteDistance";
const KEY_NOTE_TYPE: &str = "NoteType";

/// Serialize an anchor at the current version
pub fn write_anchor(anchor: &Anchor) -> AnchorRecord {
    let geometry = anchor.geometry();
    let mut record = Map::new();
    record.insert(KEY_CLASS.into(), json!(ANCHOR_CLASS_ID.to_string()));
    record.insert(KEY_MAJOR.into(), json!(RECORD_MAJOR));
    record.insert(KEY_MINOR.into(), json!(RECORD_MINOR));
    record.insert(
        KEY_GEOMETRY.into(),
        json!({
            "start": point_value(geometry.start()),
            "end": point_value(geometry.end()),
        }),
    );
    record.insert(KEY_TEXT_POINT.into(), point_value(anchor.anchor_point()));
    record.insert(
        KEY_NOTE_ID.into(),
        anchor.note_ref().map_or(Value::Null, |id| json!(id.0)),
    );
    record.insert(KEY_NAME.into(), json!(anchor.name()));
    record.insert(KEY_NOTE_ANGLE.into(), json!(anchor.note_angle()));
    record.insert(KEY_NOTE_DISTANCE.into(), json!(anchor.note_distance()));
    record.insert(KEY_NOTE_TYPE.into(), json!(anchor.note_kind().code()));
    record
}

/// Read an anchor record
///
/// Unknown keys are ignored, so records from a newer minor version load.
pub fn read_anchor(record: &AnchorRecord, config: &LinkConfig) -> Result<Anchor, RecordError> {
    if let Some(class) = record.get(KEY_CLASS) {
        let class = class.as_str().ok_or_else(|| invalid(KEY_CLASS, "expected a string"))?;
        if Uuid::parse_str(class).ok() != Some(ANCHOR_CLASS_ID) {
            return Err(RecordError::WrongClass(class.to_string()));
        }
    }

    let major = get_i64(record, KEY_MAJOR)?;
    let minor = get_i64(record, KEY_MINOR)?;
    let (Some(RECORD_MAJOR), Some(minor)) = (major, minor) else {
        return Err(RecordError::NeedsProxy { major, minor });
    };

    let geometry = record
        .get(KEY_GEOMETRY)
        .filter(|value| !value.is_null())
        .ok_or(RecordError::MissingField(KEY_GEOMETRY))
        .and_then(|value| segment_from_value(KEY_GEOMETRY, value))?;

    let anchor_point = match record.get(KEY_TEXT_POINT) {
        Some(value) if !value.is_null() => point_from_value(KEY_TEXT_POINT, value)?,
        _ => geometry.midpoint(),
    };

    let note_ref = match record.get(KEY_NOTE_ID) {
        None | Some(Value::Null) => None,
        Some(value) => Some(ObjectId(
            value
                .as_u64()
                .ok_or_else(|| invalid(KEY_NOTE_ID, "expected an object id"))?,
        )),
    };

    let name = match record.get(KEY_NAME) {
        None | Some(Value::Null) => config.default_name.clone(),
        Some(value) => value
            .as_str()
            .ok_or_else(|| invalid(KEY_NAME, "expected a string"))?
            .to_string(),
    };

    let (note_angle, note_distance) = if minor >= 2 {
        (
            get_f64(record, KEY_NOTE_ANGLE)?.unwrap_or(0.0),
            get_f64(record, KEY_NOTE_DISTANCE)?.unwrap_or_else(|| config.default_note_distance()),
        )
    } else {
        (0.0, config.default_note_distance())
    };

    let note_kind = if minor >= 5 {
        match get_i64(record, KEY_NOTE_TYPE)? {
            None => NoteKind::Annotated,
            Some(code) => NoteKind::from_code(code).unwrap_or_else(|| {
                warn!(code, "unknown note type code; treating anchor as annotated");
                NoteKind::Annotated
            }),
        }
    } else {
        NoteKind::Annotated
    };

    Ok(Anchor::restore(
        geometry,
        anchor_point,
        name,
        note_kind,
        note_angle,
        note_distance,
        note_ref,
    ))
}

/// Annotation id a raw record points at, read without instantiating it
///
/// Used for proxy records, whose version is otherwise not understood.
pub fn referenced_note(record: &AnchorRecord) -> Option<ObjectId> {
    record.get(KEY_NOTE_ID).and_then(Value::as_u64).map(ObjectId)
}

fn invalid(field: &'static str, reason: &str) -> RecordError {
    RecordError::InvalidField {
        field,
        reason: reason.to_string(),
    }
}

fn get_i64(record: &AnchorRecord, key: &'static str) -> Result<Option<i64>, RecordError> {
    match record.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| invalid(key, "expected an integer")),
    }
}

fn get_f64(record: &AnchorRecord, key: &'static str) -> Result<Option<f64>, RecordError> {
    match record.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| invalid(key, "expected a finite number")),
    }
}

fn point_value(point: Point) -> Value {
    json!([point.x, point.y])
}

fn point_from_value(field: &'static str, value: &Value) -> Result<Point, RecordError> {
    let coords = value
        .as_array()
        .filter(|coords| coords.len() == 2)
        .ok_or_else(|| invalid(field, "expected [x, y]"))?;
    let x = coords[0].as_f64().ok_or_else(|| invalid(field, "x is not a number"))?;
    let y = coords[1].as_f64().ok_or_else(|| invalid(field, "y is not a number"))?;
    if !x.is_finite() || !y.is_finite() {
        return Err(invalid(field, "coordinates must be finite"));
    }
    Ok(Point::new(x, y))
}

fn segment_from_value(field: &'static str, value: &Value) -> Result<Segment, RecordError> {
    let start = value
        .get("start")
        .ok_or_else(|| invalid(field, "missing start"))?;
    let end = value.get("end").ok_or_else(|| invalid(field, "missing end"))?;
    Ok(Segment::new(
        point_from_value(field, start)?,
        point_from_value(field, end)?,
    ))
}
