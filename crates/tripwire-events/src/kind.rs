use serde::{Deserialize, Serialize};
use std::fmt;

use crate::EventConfig;

/// The fixed set of event kinds a trigger can listen for.
///
/// Kind names that are not recognised deserialize to [`EventKind::Unknown`],
/// an empty kind to [`EventKind::None`]. Neither produces a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    /// No event chosen yet
    #[default]
    #[serde(rename = "")]
    None,
    /// A field (or any field) received a selection
    SelectField,
    /// A field (or all fields) lost its selection
    ClearField,
    /// A live expression became true
    MatchExpression,
    /// A variable changed value
    SetVariable,
    /// The active theme changed
    ChangeTheme,
    /// The owning container became active
    OpenSheet,
    /// Time passed on the shared timer
    RegisterTimer,
    #[serde(other)]
    Unknown,
}

impl EventKind {
    /// All kinds that can produce a listener, in catalogue order.
    pub const LISTENABLE: [EventKind; 7] = [
        EventKind::SelectField,
        EventKind::ClearField,
        EventKind::MatchExpression,
        EventKind::SetVariable,
        EventKind::ChangeTheme,
        EventKind::OpenSheet,
        EventKind::RegisterTimer,
    ];

    /// Identifier used in configuration files
    pub fn id(self) -> &'static str {
        match self {
            EventKind::None => "",
            EventKind::SelectField => "selectField",
            EventKind::ClearField => "clearField",
            EventKind::MatchExpression => "matchExpression",
            EventKind::SetVariable => "setVariable",
            EventKind::ChangeTheme => "changeTheme",
            EventKind::OpenSheet => "openSheet",
            EventKind::RegisterTimer => "registerTimer",
            EventKind::Unknown => "unknown",
        }
    }

    /// Human readable name
    pub fn label(self) -> &'static str {
        match self {
            EventKind::None => "None",
            EventKind::SelectField => "Field Selected",
            EventKind::ClearField => "Field Cleared",
            EventKind::MatchExpression => "Expression Matched",
            EventKind::SetVariable => "Variable Set",
            EventKind::ChangeTheme => "Theme Changed",
            EventKind::OpenSheet => "Sheet Opened",
            EventKind::RegisterTimer => "Time Passed",
            EventKind::Unknown => "Unknown",
        }
    }

    /// Labels of the `eitherOr` toggle as `(false, true)`.
    ///
    /// The meaning of the toggle depends on the kind and, for field
    /// selection, on whether values are configured.
    pub fn either_or_labels(self, event: &EventConfig) -> Option<(&'static str, &'static str)> {
        match self {
            EventKind::SelectField => {
                if event.field().is_some() && event.value().is_none() {
                    Some(("Once", "Continuous"))
                } else {
                    Some(("Many", "Exact"))
                }
            }
            EventKind::ClearField => Some(("This", "Other")),
            EventKind::RegisterTimer => Some(("Once", "Continuous")),
            _ => None,
        }
    }

    pub fn is_listenable(self) -> bool {
        !matches!(self, EventKind::None | EventKind::Unknown)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
