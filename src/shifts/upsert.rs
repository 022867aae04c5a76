use chrono::NaiveDate;

use crate::error::AppError;
use crate::model::identity::ShiftOwner;
use crate::model::shift::Shift;
use crate::model::shift_audit::ShiftAudit;
use crate::shifts::audit;
use crate::shifts::command::ShiftCommand;
use crate::shifts::validation::validate_shift;

/// Everything a backend has to write for one upsert, computed from the row
/// it read under lock.
#[derive(Debug, Clone)]
pub struct PreparedSave {
    pub previous: Option<Shift>,
    pub next: Shift,
    pub audit: Option<ShiftAudit>,
}

impl PreparedSave {
    pub fn is_creation(&self) -> bool {
        self.previous.is_none()
    }
}

/// Loads-or-constructs the (owner, date) record, applies `command`,
/// validates the result and works out the audit row.
pub fn prepare_save(
    existing: Option<Shift>,
    owner: ShiftOwner,
    date: NaiveDate,
    command: &ShiftCommand,
) -> Result<PreparedSave, AppError> {
    if let Some(shift) = &existing {
        if shift.owner() != Some(owner) || shift.attendance_date != date {
            return Err(AppError::forbidden("Shift belongs to another actor"));
        }
    }

    let mut next = existing
        .clone()
        .unwrap_or_else(|| Shift::new_for(owner, date, command.now()));
    command.apply(&mut next, existing.is_none())?;
    validate_shift(&next)?;

    let audit = audit::capture(existing.as_ref(), &next, command.now());
    Ok(PreparedSave {
        previous: existing,
        next,
        audit,
    })
}
