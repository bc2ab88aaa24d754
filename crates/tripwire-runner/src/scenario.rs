//! Scenario files: a trigger list plus a timeline of host state changes.
//!
//! ```toml
//! name = "Region tour"
//! theme = "light"
//!
//! [engine]
//! default_state = "$"
//!
//! [[triggers]]
//! id = "t1"
//! label = "North picked"
//! [triggers.event]
//! kind = "selectField"
//! field = "Region"
//! value = "North"
//!
//! [[steps]]
//! action = "select"
//! field = "Region"
//! values = ["North"]
//! ```

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::{fs, io};

use tripwire_engine::{EngineConfig, EventKind, Trigger, TriggerId};

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Scenario file not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error reading scenario: {0}")]
    IoError(#[from] io::Error),
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Trigger id {0} is used more than once")]
    DuplicateTrigger(TriggerId),
    #[error("Step {index} refers to unknown trigger {trigger}")]
    UnknownTrigger { index: usize, trigger: TriggerId },
}

fn default_domain() -> String {
    "scenario".to_string()
}

fn default_count() -> u32 {
    1
}

/// One change to the host state or the owning scope
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Step {
    /// Replace the selection of a field
    Select {
        field: String,
        values: Vec<String>,
        #[serde(default)]
        state: Option<String>,
    },
    ClearField {
        field: String,
        #[serde(default)]
        state: Option<String>,
    },
    ClearAll {
        #[serde(default)]
        state: Option<String>,
    },
    SetVariable { name: String, value: String },
    SetTheme { theme: String },
    /// Set the evaluated value of a trigger's event expression
    SetExpression { trigger: TriggerId, value: String },
    SetActiveState {
        #[serde(default)]
        state: Option<String>,
    },
    /// Advance the shared timer
    Tick {
        #[serde(default = "default_count")]
        count: u32,
    },
    SetEditing { editing: bool },
    /// Replace the trigger list
    UpdateTriggers { triggers: Vec<Trigger> },
    Reset,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Select { field, values, .. } => {
                write!(f, "select {} = {}", field, values.join("|"))
            }
            Step::ClearField { field, .. } => write!(f, "clear {}", field),
            Step::ClearAll { .. } => f.write_str("clear all"),
            Step::SetVariable { name, value } => write!(f, "set {} = {}", name, value),
            Step::SetTheme { theme } => write!(f, "theme {}", theme),
            Step::SetExpression { trigger, value } => {
                write!(f, "expression of {} = {}", trigger, value)
            }
            Step::SetActiveState { state } => {
                write!(f, "active state {}", state.as_deref().unwrap_or("(none)"))
            }
            Step::Tick { count } => write!(f, "tick x{}", count),
            Step::SetEditing { editing } => write!(f, "editing {}", editing),
            Step::UpdateTriggers { triggers } => write!(f, "update {} trigger(s)", triggers.len()),
            Step::Reset => f.write_str("reset"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: Option<String>,
    /// Domain the triggers are mounted under
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Theme active before the first step
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = toml::from_str(content)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        if !path.exists() {
            return Err(ScenarioError::NotFound(path.to_path_buf()));
        }
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("unnamed scenario")
    }

    /// Check trigger ids are unique, in the initial list and in every
    /// replacement list, and that expression steps name a known trigger
    fn validate(&self) -> Result<(), ScenarioError> {
        check_unique(&self.triggers)?;

        let mut known: HashSet<&TriggerId> = self.triggers.iter().map(|t| &t.id).collect();
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Step::UpdateTriggers { triggers } => {
                    check_unique(triggers)?;
                    known = triggers.iter().map(|t| &t.id).collect();
                }
                Step::SetExpression { trigger, .. } if !known.contains(trigger) => {
                    return Err(ScenarioError::UnknownTrigger {
                        index: i + 1,
                        trigger: trigger.clone(),
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Short description of the trigger list
    pub fn summary(&self) -> Vec<String> {
        self.triggers
            .iter()
            .map(|trigger| {
                let kind = trigger.event.kind;
                let listens = match kind {
                    EventKind::None => "no event".to_string(),
                    EventKind::Unknown => "unknown event".to_string(),
                    _ if self.engine.disabled_events.contains(&kind) => {
                        format!("{} (disabled)", kind.label())
                    }
                    _ => match kind.either_or_labels(&trigger.event) {
                        Some((off, on)) => format!(
                            "{} [{}]",
                            kind.label(),
                            if trigger.event.either_or { on } else { off }
                        ),
                        None => kind.label().to_string(),
                    },
                };
                format!(
                    "{} \"{}\": {}{}, {} action(s)",
                    trigger.id,
                    trigger.label,
                    listens,
                    if trigger.enabled { "" } else { ", disabled" },
                    trigger.actions.len()
                )
            })
            .collect()
    }
}

fn check_unique(triggers: &[Trigger]) -> Result<(), ScenarioError> {
    let mut seen = HashSet::new();
    for trigger in triggers {
        if !seen.insert(&trigger.id) {
            return Err(ScenarioError::DuplicateTrigger(trigger.id.clone()));
        }
    }
    Ok(())
}
