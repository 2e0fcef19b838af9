//! Labels that attach secondary source locations to a diagnostic.

use corvid_source::SourceLoc;
use serde::{Deserialize, Serialize};

/// The visual style of a label.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum LabelStyle {
    /// The main error location.
    Primary,
    /// Extra context, e.g. a caller in the virtual call chain.
    Secondary,
}

/// A location in user source with an explanatory message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Label {
    /// The annotated location.
    pub loc: SourceLoc,
    /// The message shown next to the location.
    pub message: String,
    /// Primary or secondary.
    pub style: LabelStyle,
}

impl Label {
    /// Creates a primary label.
    pub fn primary(loc: SourceLoc, message: impl Into<String>) -> Self {
        Self {
            loc,
            message: message.into(),
            style: LabelStyle::Primary,
        }
    }

    /// Creates a secondary label.
    pub fn secondary(loc: SourceLoc, message: impl Into<String>) -> Self {
        Self {
            loc,
            message: message.into(),
            style: LabelStyle::Secondary,
        }
    }
}
