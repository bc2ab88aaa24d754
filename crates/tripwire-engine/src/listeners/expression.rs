//! `matchExpression`: fires when the trigger's expression turns true.

use std::sync::Arc;

use tripwire_events::TriggerId;

use super::{Baseline, FireCallback};
use crate::coerce::as_boolean;
use crate::error::EngineError;
use crate::host::{Host, Subscription, ValueCallback};

/// Whether an evaluated expression counts as matching.
///
/// Unlike run conditions, a missing or empty result does not match.
pub fn expression_matches(value: Option<&str>) -> bool {
    matches!(value, Some(v) if !v.is_empty() && as_boolean(Some(v)))
}

pub struct ExpressionListener;

impl ExpressionListener {
    pub(crate) fn establish(
        &self,
        host: &dyn Host,
        trigger: &TriggerId,
        fire: FireCallback,
    ) -> Result<Subscription, EngineError> {
        let baseline = Baseline::new(false);
        let on_change: ValueCallback = Arc::new(move |value: Option<&str>| {
            let current = expression_matches(value);
            if baseline.observe(&current, |prev, cur| !*prev && *cur) {
                fire();
            }
        });

        Ok(host.watch_value(trigger, on_change)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_host::MemoryHost;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_expression_matches() {
        assert!(!expression_matches(None));
        assert!(!expression_matches(Some("")));
        assert!(!expression_matches(Some("0")));
        assert!(expression_matches(Some("1")));
        assert!(expression_matches(Some("true")));
    }

    #[test]
    fn test_fires_on_rising_edge_only() {
        let host = MemoryHost::new();
        let trigger = TriggerId::new("t1");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let _watch = ExpressionListener
            .establish(
                &host,
                &trigger,
                Arc::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        for value in ["0", "1", "1", "2", "0", "", "1"] {
            host.set_expression(&trigger, value);
        }
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_already_true_at_mount_fires_once() {
        let host = MemoryHost::new();
        let trigger = TriggerId::new("t1");
        host.set_expression(&trigger, "1");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let _watch = ExpressionListener
            .establish(
                &host,
                &trigger,
                Arc::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        host.set_expression(&trigger, "1");

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
