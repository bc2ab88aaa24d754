use std::collections::HashMap;

use tripwire_events::{EventConfig, Trigger, TriggerId};

/// Triggers whose listeners must be torn down and remounted after an edit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerDiff {
    /// Ids to mount, in the new list's order
    pub to_add: Vec<TriggerId>,
    /// Ids to tear down, in the old list's order
    pub to_remove: Vec<TriggerId>,
}

impl TriggerDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Whether the parameters that shape a listener's baseline differ.
///
/// Labels, actions and run conditions are read at activation time and
/// never force a remount.
fn monitored_changed(a: &EventConfig, b: &EventConfig) -> bool {
    a.kind != b.kind
        || a.field() != b.field()
        || a.value() != b.value()
        || a.state() != b.state()
        || a.either_or != b.either_or
}

/// Compare two trigger lists by id.
///
/// New ids are added, vanished ids removed, and ids whose monitored event
/// parameters changed appear in both lists.
pub fn diff(new: &[Trigger], old: &[Trigger]) -> TriggerDiff {
    let old_by_id: HashMap<&TriggerId, &Trigger> = old.iter().map(|t| (&t.id, t)).collect();
    let new_by_id: HashMap<&TriggerId, &Trigger> = new.iter().map(|t| (&t.id, t)).collect();

    let changed = |trigger: &Trigger| {
        old_by_id
            .get(&trigger.id)
            .is_some_and(|previous| monitored_changed(&previous.event, &trigger.event))
    };

    let to_add = new
        .iter()
        .filter(|t| !old_by_id.contains_key(&t.id) || changed(t))
        .map(|t| t.id.clone())
        .collect();

    let to_remove = old
        .iter()
        .filter(|t| match new_by_id.get(&t.id) {
            None => true,
            Some(current) => monitored_changed(&t.event, &current.event),
        })
        .map(|t| t.id.clone())
        .collect();

    TriggerDiff { to_add, to_remove }
}
