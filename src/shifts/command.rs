use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{FieldErrors, NON_FIELD_ERRORS};
use crate::model::identity::ActorKind;
use crate::model::shift::{AbsenceReason, Shift, ShiftStatus, ShiftType};

const SECONDS_PER_HOUR: i64 = 3600;

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClockAction {
    #[default]
    Start,
    End,
    Location,
}

/// A clock-in, clock-out or location ping from the actor owning the shift.
#[derive(Debug, Clone)]
pub struct ClockCommand {
    pub actor: ActorKind,
    pub action: ClockAction,
    pub now: DateTime<Utc>,
    pub shift_type: Option<ShiftType>,
    pub status: Option<ShiftStatus>,
    pub absence_reason: Option<AbsenceReason>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub start_location: Option<Value>,
    pub end_location: Option<Value>,
}

/// Direct field edit. Outer `None` leaves a field alone, `Some(None)` clears it.
#[derive(Debug, Clone)]
pub struct ShiftEdit {
    pub now: DateTime<Utc>,
    pub shift_type: Option<ShiftType>,
    pub status: Option<ShiftStatus>,
    pub absence_reason: Option<Option<AbsenceReason>>,
    pub hours: Option<Option<Decimal>>,
    pub start_date_time: Option<Option<DateTime<Utc>>>,
    pub end_date_time: Option<Option<DateTime<Utc>>>,
    pub staff_start_date_time: Option<Option<DateTime<Utc>>>,
    pub staff_end_date_time: Option<Option<DateTime<Utc>>>,
}

impl ShiftEdit {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            shift_type: None,
            status: None,
            absence_reason: None,
            hours: None,
            start_date_time: None,
            end_date_time: None,
            staff_start_date_time: None,
            staff_end_date_time: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ShiftCommand {
    Clock(ClockCommand),
    Edit(ShiftEdit),
}

impl ShiftCommand {
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            ShiftCommand::Clock(c) => c.now,
            ShiftCommand::Edit(e) => e.now,
        }
    }

    /// Merges the command into `shift`. Only fields carried by the command
    /// are written; everything else keeps its stored value.
    pub fn apply(&self, shift: &mut Shift, is_new: bool) -> Result<(), FieldErrors> {
        match self {
            ShiftCommand::Clock(c) => c.apply(shift),
            ShiftCommand::Edit(e) => e.apply(shift, is_new),
        }?;
        shift.modified = self.now();
        Ok(())
    }
}

impl ClockCommand {
    fn apply(&self, shift: &mut Shift) -> Result<(), FieldErrors> {
        self.apply_locations(shift)?;

        if self.action == ClockAction::Location {
            return Ok(());
        }

        if let Some(shift_type) = self.shift_type {
            shift.shift_type = Some(shift_type);
        }
        if let Some(status) = self.status {
            shift.status = status;
        }
        if let Some(reason) = self.absence_reason {
            shift.absence_reason = Some(reason);
        }

        match self.action {
            ClockAction::Start => {
                // A non-present day has no clock-in.
                let at = (shift.status == ShiftStatus::Present)
                    .then(|| self.start_at.unwrap_or(self.now));
                set_start(shift, self.actor, at);
            }
            ClockAction::End => {
                let at = self.end_at.unwrap_or(self.now);
                set_end(shift, self.actor, at);
                if let Some(start) = actor_start(shift, self.actor) {
                    shift.hours = Some(hours_between(start, at));
                }
            }
            ClockAction::Location => {}
        }

        Ok(())
    }

    fn apply_locations(&self, shift: &mut Shift) -> Result<(), FieldErrors> {
        if self.actor == ActorKind::Staff {
            let mut errors = FieldErrors::new();
            if self.start_location.is_some() {
                errors.add("worker_start_location", "Location is only recorded for workers.");
            }
            if self.end_location.is_some() {
                errors.add("worker_end_location", "Location is only recorded for workers.");
            }
            return errors.into_result();
        }

        if let Some(location) = &self.start_location {
            shift.worker_start_location = Some(location.clone());
        }
        if let Some(location) = &self.end_location {
            shift.worker_end_location = Some(location.clone());
        }
        Ok(())
    }
}

impl ShiftEdit {
    fn apply(&self, shift: &mut Shift, is_new: bool) -> Result<(), FieldErrors> {
        if is_new && (self.shift_type.is_none() || self.status.is_none()) {
            return Err(FieldErrors::single(
                NON_FIELD_ERRORS,
                "shift_type and status are required to create a shift",
            ));
        }

        if let Some(shift_type) = self.shift_type {
            shift.shift_type = Some(shift_type);
        }
        if let Some(status) = self.status {
            shift.status = status;
        }
        if let Some(reason) = self.absence_reason {
            shift.absence_reason = reason;
        }
        if let Some(hours) = self.hours {
            shift.hours = hours;
        }
        if let Some(at) = self.start_date_time {
            shift.start_date_time = at;
        }
        if let Some(at) = self.end_date_time {
            shift.end_date_time = at;
        }
        if let Some(at) = self.staff_start_date_time {
            shift.staff_start_date_time = at;
        }
        if let Some(at) = self.staff_end_date_time {
            shift.staff_end_date_time = at;
        }
        Ok(())
    }
}

fn set_start(shift: &mut Shift, actor: ActorKind, at: Option<DateTime<Utc>>) {
    match actor {
        ActorKind::Worker => shift.worker_start_date_time = at,
        ActorKind::Staff => shift.staff_start_date_time = at,
    }
    shift.start_date_time = at;
}

fn set_end(shift: &mut Shift, actor: ActorKind, at: DateTime<Utc>) {
    match actor {
        ActorKind::Worker => shift.worker_end_date_time = Some(at),
        ActorKind::Staff => shift.staff_end_date_time = Some(at),
    }
    shift.end_date_time = Some(at);
}

fn actor_start(shift: &Shift, actor: ActorKind) -> Option<DateTime<Utc>> {
    match actor {
        ActorKind::Worker => shift.worker_start_date_time,
        ActorKind::Staff => shift.staff_start_date_time,
    }
}

/// Elapsed hours rounded to two places.
pub fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Decimal {
    let seconds = Decimal::new((end - start).num_milliseconds(), 3);
    let mut hours = (seconds / Decimal::from(SECONDS_PER_HOUR)).round_dp(2);
    hours.rescale(2);
    hours
}
