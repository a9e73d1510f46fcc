/// Doctor schedule rules for the slot allocator.
///
/// This module turns a doctor's weekly availability and consultation hours
/// into a daily grid of slot times, and checks a requested slot against it.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::{BookingError, BookingResult};
use crate::models::{weekday_names, Doctor, SlotTime};

/// One entry of a doctor's daily slot grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotAvailability {
    pub slot_time: SlotTime,
    pub available: bool,
}

/// A doctor's schedule viewed through a fixed slot length.
pub struct DoctorCalendar<'a> {
    doctor: &'a Doctor,
    slot_minutes: i64,
}

impl<'a> DoctorCalendar<'a> {
    pub fn new(doctor: &'a Doctor, slot_minutes: i64) -> BookingResult<Self> {
        if slot_minutes <= 0 {
            return Err(BookingError::validation("Slot duration must be positive"));
        }
        Ok(DoctorCalendar {
            doctor,
            slot_minutes,
        })
    }

    /// Generate the slot grid for a single day.
    ///
    /// Empty when the doctor does not work on the date's weekday.
    pub fn daily_slots(&self, date: NaiveDate) -> Vec<SlotTime> {
        if !self.doctor.works_on(date.weekday()) {
            return Vec::new();
        }

        let hours = self.doctor.consultation_hours;
        let mut slots = Vec::new();
        let mut current = Some(hours.start);

        while let Some(slot) = current {
            if !hours.fits(slot, self.slot_minutes) {
                break;
            }
            slots.push(slot);
            current = slot.add_minutes(self.slot_minutes);
        }

        slots
    }

    /// Check that `time` on `date` is a bookable slot no earlier than `today`.
    pub fn check_bookable(&self, date: NaiveDate, time: SlotTime, today: NaiveDate) -> BookingResult<()> {
        if date < today {
            return Err(BookingError::validation(format!(
                "Cannot book an appointment in the past ({})",
                date
            )));
        }

        if !self.doctor.works_on(date.weekday()) {
            let days: Vec<&str> = self
                .doctor
                .available_days
                .iter()
                .map(|d| weekday_names::full_name(*d))
                .collect();
            return Err(BookingError::validation(format!(
                "{} is not available on {}. Available days: {}",
                self.doctor.name,
                weekday_names::full_name(date.weekday()),
                days.join(", ")
            )));
        }

        let hours = self.doctor.consultation_hours;
        if !hours.fits(time, self.slot_minutes) {
            return Err(BookingError::validation(format!(
                "{} is outside consultation hours ({})",
                time, hours
            )));
        }

        if (time.minutes() - hours.start.minutes()) % self.slot_minutes != 0 {
            return Err(BookingError::validation(format!(
                "{} is not a valid slot start; slots are {} minutes from {}",
                time, self.slot_minutes, hours.start
            )));
        }

        Ok(())
    }

    /// Mark each slot of the day as free or taken.
    pub fn availability(&self, date: NaiveDate, booked: &[SlotTime]) -> Vec<SlotAvailability> {
        self.daily_slots(date)
            .into_iter()
            .map(|slot_time| SlotAvailability {
                slot_time,
                available: !booked.contains(&slot_time),
            })
            .collect()
    }
}
