//! Annotation targets, selectors and their flattening into descriptors.
//!
//! # Responsibility
//! - Parse loosely-shaped JSON targets once into strict tagged variants.
//! - Flatten a target and its selector chain into `{id, type}` descriptors.
//!
//! # Invariants
//! - Object targets always carry a type after parsing.
//! - `SubresourceSelector` appends one descriptor per nesting level.
//! - `NestedPIDSelector` replaces previously accumulated descriptors when
//!   resolving info, but appends when resolving bare ids.
//! - Subresource chains are walked iteratively; parsing depth is bounded by
//!   the authored document only.

use crate::model::validation::as_list;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

const ANNOTATION_LABEL: &str = "Annotation";
const SUBRESOURCE_SELECTOR: &str = "SubresourceSelector";
const NESTED_PID_SELECTOR: &str = "NestedPIDSelector";

/// Shape error raised while parsing a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// Object target lacks a usable `type`.
    MissingType,
    /// Target is neither a string nor an object with `id` or `source`+`selector`.
    MissingIdOrSource,
    /// `id` or `source` is present but not a string.
    NonStringIdentifier(&'static str),
    /// A selector object lacks its `type` tag.
    SelectorMissingType,
    /// A subresource level is missing a required property.
    InvalidSubresource(&'static str),
    /// A `NestedPIDSelector` entry has no string `id`.
    NestedPidWithoutId,
}

impl Display for TargetError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingType => write!(f, "target requires a type property"),
            Self::MissingIdOrSource => write!(f, "target requires an id or source property"),
            Self::NonStringIdentifier(field) => write!(f, "target {field} MUST be a string"),
            Self::SelectorMissingType => write!(f, "selector requires a type property"),
            Self::InvalidSubresource(field) => {
                write!(f, "subresource selector requires a {field} property")
            }
            Self::NestedPidWithoutId => {
                write!(f, "nested PID selector entries require an id property")
            }
        }
    }
}

impl Error for TargetError {}

/// `type` of a target or descriptor: one label or a list of labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeLabels {
    One(String),
    Many(Vec<String>),
}

impl TypeLabels {
    /// Reads a JSON `type` value; non-string list entries are dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(label) => Some(Self::One(label.clone())),
            Value::Array(items) => Some(Self::Many(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
            )),
            _ => None,
        }
    }

    /// Returns whether `label` is one of the labels.
    pub fn contains(&self, label: &str) -> bool {
        match self {
            Self::One(value) => value == label,
            Self::Many(values) => values.iter().any(|value| value == label),
        }
    }
}

impl From<&str> for TypeLabels {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

/// Flat `{id, type}` reference produced by target resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TypeLabels>,
}

impl TargetDescriptor {
    /// Descriptor for an untyped resource.
    pub fn untyped(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: None,
        }
    }

    /// Descriptor with explicit type labels.
    pub fn typed(id: impl Into<String>, kind: impl Into<TypeLabels>) -> Self {
        Self {
            id: id.into(),
            kind: Some(kind.into()),
        }
    }

    /// Returns whether this descriptor references another annotation.
    pub fn is_annotation(&self) -> bool {
        self.kind
            .as_ref()
            .is_some_and(|labels| labels.contains(ANNOTATION_LABEL))
    }
}

/// Selector attached to a specific-resource target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Nested subresource chain, outermost level first.
    Subresource(Vec<TargetDescriptor>),
    /// Explicit flat list of persistent identifiers.
    NestedPid(Vec<TargetDescriptor>),
    /// Any other selector; opaque to resolution.
    Other(String),
}

impl Selector {
    /// Parses one selector object.
    pub fn parse(value: &Value) -> Result<Self, TargetError> {
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(TargetError::SelectorMissingType)?;
        match tag {
            SUBRESOURCE_SELECTOR => parse_subresource_chain(value.get("value")).map(Self::Subresource),
            NESTED_PID_SELECTOR => parse_nested_pids(value.get("value")).map(Self::NestedPid),
            other => Ok(Self::Other(other.to_string())),
        }
    }
}

/// Target of an annotation, parsed into a strict shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Bare IRI string.
    Iri(String),
    /// External or internal resource referenced by `id`.
    Resource { id: String, kind: TypeLabels },
    /// Part of a `source` resource addressed by selectors.
    Specific {
        source: String,
        kind: TypeLabels,
        selectors: Vec<Selector>,
    },
}

impl Target {
    /// Parses one JSON target value.
    ///
    /// # Errors
    /// - `MissingType` when an object target carries no type.
    /// - `MissingIdOrSource` when no `id` and no `source`+`selector` pair exist.
    pub fn parse(value: &Value) -> Result<Self, TargetError> {
        let object = match value {
            Value::String(iri) => return Ok(Self::Iri(iri.clone())),
            Value::Object(object) => object,
            _ => return Err(TargetError::MissingIdOrSource),
        };

        if let Some(id) = object.get("id") {
            let id = id.as_str().ok_or(TargetError::NonStringIdentifier("id"))?;
            return Ok(Self::Resource {
                id: id.to_string(),
                kind: required_type(object.get("type"))?,
            });
        }

        match (object.get("source"), object.get("selector")) {
            (Some(source), Some(selector)) => {
                let source = source
                    .as_str()
                    .ok_or(TargetError::NonStringIdentifier("source"))?;
                let kind = required_type(object.get("type"))?;
                let selectors = match selector {
                    Value::Null => Vec::new(),
                    other => as_list(other)
                        .into_iter()
                        .map(Selector::parse)
                        .collect::<Result<Vec<_>, _>>()?,
                };
                Ok(Self::Specific {
                    source: source.to_string(),
                    kind,
                    selectors,
                })
            }
            _ => Err(TargetError::MissingIdOrSource),
        }
    }

    /// Returns the identifier the target is anchored on (`id` or `source`).
    pub fn primary_id(&self) -> &str {
        match self {
            Self::Iri(id) | Self::Resource { id, .. } => id,
            Self::Specific { source, .. } => source,
        }
    }

    /// Flattens the target into `{id, type}` descriptors.
    pub fn info(&self) -> Vec<TargetDescriptor> {
        match self {
            Self::Iri(id) => vec![TargetDescriptor::untyped(id.clone())],
            Self::Resource { id, kind } => vec![TargetDescriptor {
                id: id.clone(),
                kind: Some(kind.clone()),
            }],
            Self::Specific {
                source,
                kind,
                selectors,
            } => {
                let mut info = vec![TargetDescriptor {
                    id: source.clone(),
                    kind: Some(kind.clone()),
                }];
                for selector in selectors {
                    match selector {
                        Selector::Subresource(chain) => info.extend(chain.iter().cloned()),
                        Selector::NestedPid(pids) => info = pids.clone(),
                        Selector::Other(_) => {}
                    }
                }
                info
            }
        }
    }

    /// Flattens the target into bare identifiers.
    pub fn ids(&self) -> Vec<String> {
        match self {
            Self::Iri(id) | Self::Resource { id, .. } => vec![id.clone()],
            Self::Specific {
                source, selectors, ..
            } => {
                let mut ids = vec![source.clone()];
                for selector in selectors {
                    match selector {
                        Selector::Subresource(descriptors) | Selector::NestedPid(descriptors) => {
                            ids.extend(descriptors.iter().map(|d| d.id.clone()));
                        }
                        Selector::Other(_) => {}
                    }
                }
                ids
            }
        }
    }
}

/// Parses a `target` property value (single target or list).
pub fn parse_targets(value: &Value) -> Result<Vec<Target>, TargetError> {
    as_list(value).into_iter().map(Target::parse).collect()
}

/// Resolves a raw `target` property value into flattened descriptors.
pub fn resolve_target_info(value: &Value) -> Result<Vec<TargetDescriptor>, TargetError> {
    Ok(parse_targets(value)?
        .iter()
        .flat_map(Target::info)
        .collect())
}

/// Resolves a raw `target` property value into flattened identifiers.
pub fn resolve_target_ids(value: &Value) -> Result<Vec<String>, TargetError> {
    Ok(parse_targets(value)?
        .iter()
        .flat_map(Target::ids)
        .collect())
}

fn required_type(value: Option<&Value>) -> Result<TypeLabels, TargetError> {
    value
        .and_then(TypeLabels::from_value)
        .ok_or(TargetError::MissingType)
}

fn parse_subresource_chain(value: Option<&Value>) -> Result<Vec<TargetDescriptor>, TargetError> {
    let mut cursor = value
        .and_then(|value| value.get("subresource"))
        .ok_or(TargetError::InvalidSubresource("value.subresource"))?;

    let mut chain = Vec::new();
    loop {
        let id = cursor
            .get("id")
            .and_then(Value::as_str)
            .ok_or(TargetError::InvalidSubresource("id"))?;
        let kind = cursor
            .get("type")
            .and_then(TypeLabels::from_value)
            .ok_or(TargetError::InvalidSubresource("type"))?;
        chain.push(TargetDescriptor {
            id: id.to_string(),
            kind: Some(kind),
        });
        match cursor.get("subresource") {
            Some(next) => cursor = next,
            None => return Ok(chain),
        }
    }
}

fn parse_nested_pids(value: Option<&Value>) -> Result<Vec<TargetDescriptor>, TargetError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    as_list(value)
        .into_iter()
        .map(|entry| {
            let id = entry
                .get("id")
                .and_then(Value::as_str)
                .ok_or(TargetError::NestedPidWithoutId)?;
            Ok(TargetDescriptor {
                id: id.to_string(),
                kind: entry.get("type").and_then(TypeLabels::from_value),
            })
        })
        .collect()
}
