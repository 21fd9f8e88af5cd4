//! Condition transitions that pair a status mutation with an
//! operator-visible notification.

use sdc_api::{Resource, READY_CONDITION};

use crate::traits::{EventRecorder, Severity};

/// Record a failed attempt: Ready goes False and the failure is
/// surfaced as an error event.
pub(crate) fn mark_not_ready(
    recorder: &dyn EventRecorder,
    object: &mut Resource,
    reason: &str,
    message: &str,
) {
    object
        .status
        .conditions
        .mark_false(READY_CONDITION, reason, message);
    recorder.event(object, Severity::Error, message, None);
}

/// Record a terminal failure: the object stalls and the retry loop
/// stops until the spec changes.
pub(crate) fn mark_as_stalled(
    recorder: &dyn EventRecorder,
    object: &mut Resource,
    reason: &str,
    message: &str,
) {
    object
        .status
        .conditions
        .mark_false(READY_CONDITION, reason, message);
    object.status.conditions.mark_stalled(reason, message);
    recorder.event(object, Severity::Error, message, None);
}
