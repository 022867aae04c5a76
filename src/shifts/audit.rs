use chrono::{DateTime, Utc};

use crate::model::shift::Shift;
use crate::model::shift_audit::ShiftAudit;

/// Audit row for a save that turned `previous` into `current`.
///
/// `None` for creations (no prior state) and for saves that leave every
/// tracked field as it was. Owner references are copied from `previous`.
pub fn capture(previous: Option<&Shift>, current: &Shift, at: DateTime<Utc>) -> Option<ShiftAudit> {
    let previous = previous?;
    if previous.tracked() == current.tracked() {
        return None;
    }
    Some(ShiftAudit::of_previous(previous, at))
}
