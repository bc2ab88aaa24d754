//! `selectField` and `clearField`.

use std::sync::Arc;

use tripwire_events::{EventConfig, EventKind};

use super::{Baseline, FireCallback};
use crate::coerce::{as_number, values_from_delimited, Value};
use crate::error::EngineError;
use crate::host::{Host, Query, Snapshot, Subscription, SubscriptionDef, UpdateCallback};
use crate::predicates::{contains_all, contains_none, exact_match};

/// Slot holding the watched selection (text, values or count)
pub const SELECTED_SLOT: &str = "selected";
/// Slot holding every selection in the state, for other-field checks
pub const OTHER_SLOT: &str = "other";

/// How a `selectField` event decides it fired
#[derive(Debug, Clone, PartialEq)]
pub enum SelectRule {
    /// Any field in the state received a selection; the mode toggle does
    /// not apply
    AnyField,
    /// The field received a selection
    Field { continuous: bool },
    /// The field's selection covers the values, or equals them when exact
    Values { values: Vec<Value>, exact: bool },
}

/// How a `clearField` event decides it fired
#[derive(Debug, Clone, PartialEq)]
pub enum ClearRule {
    /// Every selection in the state was cleared
    AllFields,
    /// Other fields were cleared while the field kept its selection
    OtherFields { field: String },
    /// The field lost its selection
    Field,
    /// All of the values were selected and now none of them is
    Values { values: Vec<Value> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionRule {
    Select(SelectRule),
    Clear(ClearRule),
}

/// Whether a selection text means "nothing selected"
fn is_blank(selection: &str) -> bool {
    let trimmed = selection.trim();
    trimmed.is_empty() || trimmed == "-"
}

/// Values of a `|` delimited field selection
pub fn selected_values(selection: &str) -> Vec<Value> {
    if is_blank(selection) {
        return Vec::new();
    }
    selection.split('|').map(Value::parse).collect()
}

/// Whether a `Field: values|Field: values` selection text names any field
/// other than `field`
pub fn other_fields_selected(selection: &str, field: &str) -> bool {
    if is_blank(selection) {
        return false;
    }
    selection.split('|').any(|record| {
        let name = record.split_once(':').map_or(record, |(name, _)| name);
        name.trim() != field
    })
}

fn selected_count(snapshot: &Snapshot) -> i64 {
    as_number(Some(snapshot.get(SELECTED_SLOT)))
}

impl SelectRule {
    fn is_transition(&self, previous: &Snapshot, current: &Snapshot) -> bool {
        let prev = previous.get(SELECTED_SLOT);
        let cur = current.get(SELECTED_SLOT);

        match self {
            SelectRule::AnyField => is_blank(prev) && !is_blank(cur),
            SelectRule::Field { continuous } => {
                let first_selection = is_blank(prev) && !is_blank(cur);
                let changed = *continuous && !is_blank(cur) && prev != cur;
                first_selection || changed
            }
            SelectRule::Values { values, exact } => {
                let prev = selected_values(prev);
                let cur = selected_values(cur);
                if *exact {
                    !exact_match(&prev, values) && exact_match(&cur, values)
                } else {
                    !contains_all(&prev, values) && contains_all(&cur, values)
                }
            }
        }
    }
}

impl ClearRule {
    fn is_transition(&self, previous: &Snapshot, current: &Snapshot) -> bool {
        match self {
            ClearRule::AllFields => {
                !is_blank(previous.get(SELECTED_SLOT)) && is_blank(current.get(SELECTED_SLOT))
            }
            ClearRule::OtherFields { field } => {
                selected_count(previous) > 0
                    && other_fields_selected(previous.get(OTHER_SLOT), field)
                    && selected_count(current) > 0
                    && !other_fields_selected(current.get(OTHER_SLOT), field)
            }
            ClearRule::Field => selected_count(previous) > 0 && selected_count(current) == 0,
            ClearRule::Values { values } => {
                let prev = selected_values(previous.get(SELECTED_SLOT));
                let cur = selected_values(current.get(SELECTED_SLOT));
                contains_all(&prev, values) && contains_none(&cur, values)
            }
        }
    }
}

impl SelectionRule {
    /// Pick the rule for a selection event, `None` for other kinds
    pub fn for_event(event: &EventConfig) -> Option<Self> {
        let values = values_from_delimited(event.value());

        match event.kind {
            EventKind::SelectField => Some(SelectionRule::Select(match event.field() {
                None => SelectRule::AnyField,
                Some(_) if values.is_empty() => SelectRule::Field {
                    continuous: event.either_or,
                },
                Some(_) => SelectRule::Values {
                    values,
                    exact: event.either_or,
                },
            })),
            EventKind::ClearField => Some(SelectionRule::Clear(match event.field() {
                None => ClearRule::AllFields,
                Some(field) if event.either_or => ClearRule::OtherFields {
                    field: field.to_string(),
                },
                Some(_) if values.is_empty() => ClearRule::Field,
                Some(_) => ClearRule::Values { values },
            })),
            _ => None,
        }
    }

    /// Host queries the rule needs, for `field` in `state`
    pub fn subscription(&self, field: Option<&str>, state: &str) -> SubscriptionDef {
        let state = state.to_string();
        let field = field.unwrap_or_default().to_string();
        let current = || Query::CurrentSelections {
            state: state.clone(),
        };
        let values = || Query::FieldSelections {
            field: field.clone(),
            state: state.clone(),
        };
        let count = || Query::SelectedCount {
            field: field.clone(),
            state: state.clone(),
        };

        let def = SubscriptionDef::new();
        match self {
            SelectionRule::Select(SelectRule::AnyField)
            | SelectionRule::Clear(ClearRule::AllFields) => def.slot(SELECTED_SLOT, current()),
            SelectionRule::Select(_) | SelectionRule::Clear(ClearRule::Values { .. }) => {
                def.slot(SELECTED_SLOT, values())
            }
            SelectionRule::Clear(ClearRule::OtherFields { .. }) => def
                .slot(SELECTED_SLOT, count())
                .slot(OTHER_SLOT, current()),
            SelectionRule::Clear(ClearRule::Field) => def.slot(SELECTED_SLOT, count()),
        }
    }

    /// The transition predicate
    pub fn is_transition(&self, previous: &Snapshot, current: &Snapshot) -> bool {
        match self {
            SelectionRule::Select(rule) => rule.is_transition(previous, current),
            SelectionRule::Clear(rule) => rule.is_transition(previous, current),
        }
    }
}

/// Watches selection state through a host subscription
pub struct SelectionListener {
    rule: SelectionRule,
    def: SubscriptionDef,
}

impl SelectionListener {
    pub fn new(rule: SelectionRule, def: SubscriptionDef) -> Self {
        Self { rule, def }
    }

    pub fn rule(&self) -> &SelectionRule {
        &self.rule
    }

    /// Selection state the listener watches
    pub fn state(&self) -> Option<&str> {
        self.def.queries().find_map(|query| match query {
            Query::CurrentSelections { state }
            | Query::FieldSelections { state, .. }
            | Query::SelectedCount { state, .. } => Some(state.as_str()),
            _ => None,
        })
    }

    pub(crate) async fn establish(
        &self,
        host: &dyn Host,
        fire: FireCallback,
    ) -> Result<Subscription, EngineError> {
        let rule = self.rule.clone();
        let baseline = Baseline::new(Snapshot::new());
        let on_update: UpdateCallback = Arc::new(move |current: &Snapshot| {
            if baseline.observe(current, |prev, cur| rule.is_transition(prev, cur)) {
                fire();
            }
        });

        Ok(host.subscribe(self.def.clone(), on_update).await?)
    }
}
