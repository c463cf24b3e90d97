//! Primary document kinds of the Web Annotation model.
//!
//! # Invariants
//! - A valid document carries exactly one primary kind in its `type`.
//! - The wire label of each kind doubles as the store type key.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Mutually exclusive primary types of a Web Annotation document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentKind {
    Annotation,
    AnnotationPage,
    AnnotationCollection,
}

impl DocumentKind {
    /// All primary kinds in declaration order.
    pub const ALL: [DocumentKind; 3] = [
        DocumentKind::Annotation,
        DocumentKind::AnnotationPage,
        DocumentKind::AnnotationCollection,
    ];

    /// Returns the `type` label used on the wire and as store key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Annotation => "Annotation",
            Self::AnnotationPage => "AnnotationPage",
            Self::AnnotationCollection => "AnnotationCollection",
        }
    }

    /// Parses a wire label; returns `None` for non-primary labels.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == label)
    }
}

impl Display for DocumentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
