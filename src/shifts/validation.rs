use rust_decimal::Decimal;

use crate::error::{FieldErrors, NON_FIELD_ERRORS};
use crate::model::shift::{Shift, ShiftStatus};

/// DECIMAL(5,2): three integer digits.
const MAX_HOURS: Decimal = Decimal::ONE_THOUSAND;

/// Checks the record-level invariants in a fixed order: ownership,
/// status/absence agreement, hours, then required fields.
pub fn validate_shift(shift: &Shift) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    match (shift.recorded_by_worker_id, shift.recorded_by_staff_id) {
        (Some(_), Some(_)) => errors.add(
            NON_FIELD_ERRORS,
            "Attendance can be linked to a worker or staff, not both.",
        ),
        (None, None) => errors.add(
            NON_FIELD_ERRORS,
            "Attendance must be linked to a worker or staff.",
        ),
        _ => {}
    }

    match (shift.status, shift.absence_reason) {
        (ShiftStatus::Present, Some(_)) => {
            errors.add("absence_reason", "Absence reason requires absent status.")
        }
        (ShiftStatus::Absent, None) => errors.add(
            "absence_reason",
            "Absence reason is required for absent status.",
        ),
        _ => {}
    }

    if let Some(hours) = shift.hours {
        check_hours(hours, &mut errors);
    }

    if shift.shift_type.is_none() {
        errors.add("shift_type", "This field is required.");
    }

    errors.into_result()
}

fn check_hours(hours: Decimal, errors: &mut FieldErrors) {
    if hours.is_sign_negative() && !hours.is_zero() {
        errors.add("hours", "Ensure this value is greater than or equal to 0.");
    }
    if hours.normalize().scale() > 2 {
        errors.add(
            "hours",
            "Ensure that there are no more than 2 decimal places.",
        );
    }
    if hours.abs() >= MAX_HOURS {
        errors.add(
            "hours",
            "Ensure that there are no more than 3 digits before the decimal point.",
        );
    }
}
