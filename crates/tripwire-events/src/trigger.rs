use serde::{Deserialize, Serialize};

use crate::{EventKind, TriggerId};

/// Event settings of a trigger: the kind plus its kind-specific parameters.
///
/// String parameters hold already-evaluated host expressions. Empty strings
/// are treated the same as absent values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventConfig {
    /// Which event to listen for
    pub kind: EventKind,
    /// Field name for selection events
    pub field: Option<String>,
    /// Semicolon delimited value list, live expression, or timer interval
    pub value: Option<String>,
    /// Variable name for `setVariable`
    pub variable: Option<String>,
    /// Theme id for `changeTheme`
    pub theme: Option<String>,
    /// Selection state; empty means inherit from the owning scope
    pub state: Option<String>,
    /// Kind-specific mode toggle (continuous, exact, other fields)
    pub either_or: bool,
    /// Seconds to wait before a continuous timer starts counting
    pub time_passed_start_after: Option<String>,
    /// Seconds after which a continuous timer stops
    pub time_passed_duration: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl EventConfig {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn field(&self) -> Option<&str> {
        non_empty(&self.field)
    }

    pub fn value(&self) -> Option<&str> {
        non_empty(&self.value)
    }

    pub fn variable(&self) -> Option<&str> {
        non_empty(&self.variable)
    }

    pub fn theme(&self) -> Option<&str> {
        non_empty(&self.theme)
    }

    pub fn state(&self) -> Option<&str> {
        non_empty(&self.state)
    }

    /// Builder: set the field name
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Builder: set the value
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Builder: set the variable name
    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    /// Builder: set the theme id
    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    /// Builder: set the selection state
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Builder: set the mode toggle
    pub fn with_either_or(mut self, either_or: bool) -> Self {
        self.either_or = either_or;
        self
    }

    /// Builder: set timer start-after and duration
    pub fn with_time_window(
        mut self,
        start_after: impl Into<String>,
        duration: impl Into<String>,
    ) -> Self {
        self.time_passed_start_after = Some(start_after.into());
        self.time_passed_duration = Some(duration.into());
        self
    }
}

fn default_enabled() -> bool {
    true
}

/// A configured (event, run condition, actions) tuple.
///
/// Owned by whoever persists the layout; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trigger {
    pub id: TriggerId,
    #[serde(default)]
    pub label: String,
    /// Disabled triggers never run their actions
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Evaluated expression gating activation; absent means always
    #[serde(default)]
    pub run_condition: Option<String>,
    #[serde(default)]
    pub event: EventConfig,
    /// Opaque to the engine, handed to the action dispatcher
    #[serde(default)]
    pub actions: Vec<toml::Value>,
    /// Opaque to the engine, evaluated after the actions ran
    #[serde(default)]
    pub navigation: Option<toml::Value>,
}

impl Trigger {
    /// Create an enabled trigger with no event
    pub fn new(id: impl Into<TriggerId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            enabled: true,
            run_condition: None,
            event: EventConfig::default(),
            actions: Vec::new(),
            navigation: None,
        }
    }

    /// Builder: set the event
    pub fn with_event(mut self, event: EventConfig) -> Self {
        self.event = event;
        self
    }

    /// Builder: set the run condition
    pub fn with_run_condition(mut self, condition: impl Into<String>) -> Self {
        self.run_condition = Some(condition.into());
        self
    }

    /// Builder: enable or disable
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builder: append an action
    pub fn with_action(mut self, action: toml::Value) -> Self {
        self.actions.push(action);
        self
    }
}

impl From<String> for TriggerId {
    fn from(id: String) -> Self {
        TriggerId::new(id)
    }
}

/// Label given to the n-th trigger added to a list (1-based)
pub fn default_label(n: usize) -> String {
    format!("Trigger {}", n)
}

/// Trigger list of a freshly created object
pub fn initial_triggers() -> Vec<Trigger> {
    vec![Trigger::new("trigger-1", default_label(1))]
}

/// Status line describing how many triggers are registered
pub fn trigger_count_message(count: usize) -> String {
    match count {
        0 => "There are no triggers registered.".to_string(),
        1 => "There is 1 trigger registered.".to_string(),
        n => format!("There are {} triggers registered.", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_from_toml() {
        let trigger: Trigger = toml::from_str(
            r#"
            id = "t1"
            label = "Region picked"
            runCondition = "1"

            [event]
            kind = "selectField"
            field = "Region"
            value = "North;South"
            eitherOr = true

            [[actions]]
            type = "applyBookmark"
            bookmark = "b1"
            "#,
        )
        .unwrap();

        assert_eq!(trigger.id, TriggerId::new("t1"));
        assert!(trigger.enabled);
        assert_eq!(trigger.event.kind, EventKind::SelectField);
        assert_eq!(trigger.event.field(), Some("Region"));
        assert_eq!(trigger.event.value(), Some("North;South"));
        assert!(trigger.event.either_or);
        assert_eq!(trigger.actions.len(), 1);
        assert!(trigger.navigation.is_none());
    }

    #[test]
    fn test_empty_parameters_read_as_absent() {
        let event = EventConfig::new(EventKind::ClearField)
            .with_field("")
            .with_state("");
        assert_eq!(event.field(), None);
        assert_eq!(event.state(), None);
    }

    #[test]
    fn test_initial_triggers() {
        let triggers = initial_triggers();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].label, "Trigger 1");
        assert!(triggers[0].enabled);
        assert_eq!(triggers[0].event.kind, EventKind::None);
    }

    #[test]
    fn test_trigger_count_message() {
        assert_eq!(trigger_count_message(0), "There are no triggers registered.");
        assert_eq!(trigger_count_message(1), "There is 1 trigger registered.");
        assert_eq!(trigger_count_message(4), "There are 4 triggers registered.");
    }
}
