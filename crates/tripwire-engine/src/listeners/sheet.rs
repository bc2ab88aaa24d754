//! `openSheet`: the listener is created when the owning sheet opens, so
//! mounting it is the event.

use tracing::debug;

use super::FireCallback;

pub(crate) fn open(fire: FireCallback) {
    debug!(target: "listeners", "Sheet opened");
    fire();
}
