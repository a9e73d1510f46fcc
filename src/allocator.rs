/// Slot allocation for doctor appointments.
///
/// The allocator validates a requested (doctor, date, time) against the
/// doctor's calendar and reserves it through the store's atomic
/// reserve-or-fail operation. A conflict fails fast and is never retried.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::calendar::{DoctorCalendar, SlotAvailability};
use crate::clock::Clock;
use crate::error::{BookingError, BookingResult};
use crate::models::{Appointment, Doctor, Principal, Reservation, SlotTime};
use crate::store::Store;

/// A successful reservation and the doctor it was made with.
#[derive(Debug, Clone)]
pub struct Reserved {
    pub appointment: Appointment,
    pub doctor: Doctor,
}

pub struct SlotAllocator {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    slot_minutes: i64,
}

impl SlotAllocator {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, slot_minutes: i64) -> Self {
        SlotAllocator {
            store,
            clock,
            slot_minutes,
        }
    }

    fn doctor(&self, doctor_id: Uuid) -> BookingResult<Doctor> {
        self.store
            .doctor(doctor_id)?
            .ok_or_else(|| BookingError::not_found("Doctor not found"))
    }

    /// Reserve a slot for `patient`, assigning the next slot number for the day.
    pub fn reserve(
        &self,
        patient: &Principal,
        doctor_id: Uuid,
        date: NaiveDate,
        slot_time: SlotTime,
    ) -> BookingResult<Reserved> {
        let doctor = self.doctor(doctor_id)?;
        DoctorCalendar::new(&doctor, self.slot_minutes)?.check_bookable(
            date,
            slot_time,
            self.clock.today(),
        )?;

        let reservation = Reservation {
            patient_id: patient.account_id,
            patient_name: patient.full_name.clone(),
            doctor_id,
            doctor_name: doctor.name.clone(),
            appointment_date: date,
            slot_time,
            created_at: self.clock.now(),
        };

        match self.store.reserve(reservation) {
            Ok(appointment) => {
                info!(
                    "Reserved slot #{} with {} on {} at {} for {}",
                    appointment.slot_number, doctor.name, date, slot_time, patient.account_id
                );
                Ok(Reserved { appointment, doctor })
            }
            Err(err) => {
                if matches!(err, BookingError::SlotConflict { .. }) {
                    warn!("Slot conflict: {} on {} at {}", doctor.name, date, slot_time);
                }
                Err(err)
            }
        }
    }

    /// The doctor's slot grid for `date` with availability flags.
    pub fn available_slots(&self, doctor_id: Uuid, date: NaiveDate) -> BookingResult<Vec<SlotAvailability>> {
        let doctor = self.doctor(doctor_id)?;
        let booked = self.store.booked_times(doctor_id, date)?;
        Ok(DoctorCalendar::new(&doctor, self.slot_minutes)?.availability(date, &booked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{AppointmentStatus, DoctorDraft, Role};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, SlotAllocator, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let draft: DoctorDraft = serde_json::from_value(serde_json::json!({
            "name": "Dr. A",
            "specialization": "Cardiologist",
            "consultation_fee": 1500.0,
            "available_days": ["Monday"],
            "consultation_hours": "9:00 AM - 5:00 PM"
        }))
        .unwrap();
        let doctor = draft.into_doctor(Uuid::new_v4(), Utc::now()).unwrap();
        let doctor_id = doctor.id;
        store.insert_doctor(doctor).unwrap();

        let allocator = SlotAllocator::new(store.clone(), Arc::new(FixedClock::on(monday())), 30);
        (store, allocator, doctor_id)
    }

    fn patient() -> Principal {
        Principal {
            account_id: Uuid::new_v4(),
            role: Role::Patient,
            full_name: "John Doe".into(),
        }
    }

    fn at(value: &str) -> SlotTime {
        value.parse().unwrap()
    }

    #[test]
    fn reserve_example_sequence() {
        let (_, allocator, doctor_id) = setup();

        let first = allocator.reserve(&patient(), doctor_id, monday(), at("9:00 AM")).unwrap();
        assert_eq!(first.appointment.slot_number, 1);
        assert_eq!(first.appointment.status, AppointmentStatus::Confirmed);
        assert_eq!(first.appointment.doctor_name, "Dr. A");

        let clash = allocator.reserve(&patient(), doctor_id, monday(), at("9:00 AM"));
        assert!(matches!(clash, Err(BookingError::SlotConflict { .. })));

        let second = allocator.reserve(&patient(), doctor_id, monday(), at("9:30 AM")).unwrap();
        assert_eq!(second.appointment.slot_number, 2);
    }

    #[test]
    fn unknown_doctor_and_invalid_requests() {
        let (store, allocator, doctor_id) = setup();

        assert!(matches!(
            allocator.reserve(&patient(), Uuid::new_v4(), monday(), at("9:00 AM")),
            Err(BookingError::NotFound(_))
        ));
        let last_week = NaiveDate::from_ymd_opt(2025, 2, 24).unwrap();
        assert!(matches!(
            allocator.reserve(&patient(), doctor_id, last_week, at("9:00 AM")),
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            allocator.reserve(&patient(), doctor_id, monday(), at("6:00 PM")),
            Err(BookingError::Validation(_))
        ));
        assert!(store.appointments().unwrap().is_empty());
    }

    #[test]
    fn concurrent_reservations_yield_one_winner() {
        let (store, allocator, doctor_id) = setup();
        let successes = AtomicUsize::new(0);
        let conflicts = AtomicUsize::new(0);
        let callers = 16;

        std::thread::scope(|scope| {
            for _ in 0..callers {
                scope.spawn(|| match allocator.reserve(&patient(), doctor_id, monday(), at("10:00 AM")) {
                    Ok(_) => {
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(BookingError::SlotConflict { .. }) => {
                        conflicts.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(other) => panic!("unexpected error: {other}"),
                });
            }
        });

        assert_eq!(successes.load(Ordering::SeqCst), 1);
        assert_eq!(conflicts.load(Ordering::SeqCst), callers - 1);
        assert_eq!(store.appointments().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_distinct_slots_get_unique_sequential_numbers() {
        let (store, allocator, doctor_id) = setup();
        let times: Vec<SlotTime> = DoctorCalendar::new(&store.doctor(doctor_id).unwrap().unwrap(), 30)
            .unwrap()
            .daily_slots(monday());

        std::thread::scope(|scope| {
            for time in &times {
                let allocator = &allocator;
                scope.spawn(move || allocator.reserve(&patient(), doctor_id, monday(), *time).unwrap());
            }
        });

        let mut numbers: Vec<u32> = store
            .appointments()
            .unwrap()
            .iter()
            .map(|a| a.slot_number)
            .collect();
        numbers.sort_unstable();
        let expected: Vec<u32> = (1..=times.len() as u32).collect();
        assert_eq!(numbers, expected);
    }

    #[test]
    fn available_slots_reflect_reservations() {
        let (_, allocator, doctor_id) = setup();
        allocator.reserve(&patient(), doctor_id, monday(), at("9:00 AM")).unwrap();

        let grid = allocator.available_slots(doctor_id, monday()).unwrap();
        assert_eq!(grid.len(), 16);
        assert!(!grid[0].available);
        assert!(grid[1..].iter().all(|s| s.available));
    }
}
