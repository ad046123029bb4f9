//! Inspector-facing property surface of an anchor
//!
//! Properties are described by a static table. Reading goes through each
//! descriptor's getter; writing parses a [`PropertyValue`] into a typed
//! [`PropertyEdit`] that the session applies through its normal edit path.

use crate::anchor::{Anchor, NoteKind};
use crate::error::PropertyError;

/// Value shown in or entered into the inspector
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Number(value) => write!(f, "{value}"),
            PropertyValue::Text(value) => write!(f, "{value}"),
        }
    }
}

/// Static description of one anchor property
#[derive(Debug, Clone, Copy)]
pub struct PropertyDescriptor {
    /// Stable key used by scripts and `set_property`
    pub name: &'static str,
    /// Label shown to the user
    pub label: &'static str,
    /// Allowed text values, if the property is an enumeration
    pub domain: Option<&'static [&'static str]>,
    getter: fn(&Anchor) -> PropertyValue,
}

impl PropertyDescriptor {
    pub fn get(&self, anchor: &Anchor) -> PropertyValue {
        (self.getter)(anchor)
    }
}

const NOTE_KIND_DOMAIN: &[&str] = &["None", "Has annotation"];

/// Properties exposed by every anchor, in display order
pub static ANCHOR_PROPERTIES: &[PropertyDescriptor] = &[
    PropertyDescriptor {
        name: "Name",
        label: "Name",
        domain: None,
        getter: |anchor| PropertyValue::Text(anchor.name().to_string()),
    },
    PropertyDescriptor {
        name: "Length",
        label: "Length, mm",
        domain: None,
        getter: |anchor| PropertyValue::Number(anchor.length()),
    },
    PropertyDescriptor {
        name: "NoteKind",
        label: "Annotation",
        domain: Some(NOTE_KIND_DOMAIN),
        getter: |anchor| PropertyValue::Text(anchor.note_kind().label().to_string()),
    },
];

/// Look up a descriptor by name
pub fn descriptor(name: &str) -> Option<&'static PropertyDescriptor> {
    ANCHOR_PROPERTIES.iter().find(|d| d.name == name)
}

/// Current values of every property of an anchor
pub fn describe(anchor: &Anchor) -> Vec<(&'static PropertyDescriptor, PropertyValue)> {
    ANCHOR_PROPERTIES
        .iter()
        .map(|descriptor| (descriptor, descriptor.get(anchor)))
        .collect()
}

/// Typed edit parsed from a property write
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyEdit {
    Name(String),
    Length(f64),
    NoteKind(NoteKind),
}

/// Parse a property write
pub fn parse_edit(name: &str, value: PropertyValue) -> Result<PropertyEdit, PropertyError> {
    let descriptor = descriptor(name).ok_or_else(|| PropertyError::Unknown(name.to_string()))?;
    match descriptor.name {
        "Name" => Ok(PropertyEdit::Name(value.to_string())),
        "Length" => {
            let length = match value {
                PropertyValue::Number(length) => length,
                PropertyValue::Text(text) => {
                    text.trim()
                        .parse::<f64>()
                        .map_err(|_| PropertyError::TypeMismatch {
                            name: descriptor.name,
                            expected: "a number",
                        })?
                }
            };
            if !length.is_finite() || length <= 0.0 {
                return Err(PropertyError::NonPositiveLength(length));
            }
            Ok(PropertyEdit::Length(length))
        }
        "NoteKind" => {
            let PropertyValue::Text(label) = value else {
                return Err(PropertyError::TypeMismatch {
                    name: descriptor.name,
                    expected: "one of the listed labels",
                });
            };
            NoteKind::from_label(&label)
                .map(PropertyEdit::NoteKind)
                .ok_or(PropertyError::OutOfDomain {
                    name: descriptor.name,
                    value: label,
                })
        }
        _ => Err(PropertyError::Unknown(name.to_string())),
    }
}
