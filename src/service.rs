/// The booking service: every component wired to one store and clock.
///
/// `Hospital` is what the HTTP layer and the demo talk to. It owns the
/// booking workflow (reserve a slot, then open the bill) and the admin
/// statistics that read across ledgers.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::allocator::SlotAllocator;
use crate::appointments::AppointmentLedger;
use crate::billing::BillingLedger;
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::directory::DoctorDirectory;
use crate::error::{BookingError, BookingResult};
use crate::identity::IdentityService;
use crate::models::{Appointment, Bill, Principal, Role, SlotTime};
use crate::store::{MemoryStore, Store};

/// Counts shown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminStats {
    pub total_patients: usize,
    pub total_doctors: usize,
    pub total_appointments: usize,
    pub pending_bills: usize,
}

/// A confirmed booking and its pending bill.
#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub appointment: Appointment,
    pub bill: Bill,
}

pub struct Hospital {
    store: Arc<dyn Store>,
    pub identity: IdentityService,
    pub directory: DoctorDirectory,
    pub allocator: SlotAllocator,
    pub appointments: AppointmentLedger,
    pub billing: BillingLedger,
}

impl Hospital {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Hospital {
            identity: IdentityService::new(
                store.clone(),
                clock.clone(),
                config.token_ttl_minutes,
                config.bcrypt_cost,
            ),
            directory: DoctorDirectory::new(store.clone(), clock.clone()),
            allocator: SlotAllocator::new(store.clone(), clock.clone(), config.slot_minutes),
            appointments: AppointmentLedger::new(store.clone()),
            billing: BillingLedger::new(store.clone(), clock),
            store,
        }
    }

    /// An in-memory hospital on the system clock.
    pub fn in_memory(config: &Config) -> Self {
        Hospital::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock), config)
    }

    /// Book a slot for a patient and open the consultation bill.
    pub fn book(
        &self,
        principal: &Principal,
        doctor_id: Uuid,
        date: NaiveDate,
        slot_time: SlotTime,
    ) -> BookingResult<Booking> {
        if principal.role != Role::Patient {
            return Err(BookingError::forbidden("Only patients can book appointments"));
        }

        let reserved = self.allocator.reserve(principal, doctor_id, date, slot_time)?;
        let bill = match self
            .billing
            .create_for_appointment(&reserved.appointment, reserved.doctor.consultation_fee)
        {
            Ok(bill) => bill,
            Err(err) => {
                warn!(
                    "Billing failed for appointment {}, releasing slot: {}",
                    reserved.appointment.id, err
                );
                self.store.discard_appointment(reserved.appointment.id)?;
                return Err(err);
            }
        };
        info!(
            "Booking confirmed: appointment {} bill {}",
            reserved.appointment.id, bill.id
        );

        Ok(Booking {
            appointment: reserved.appointment,
            bill,
        })
    }

    pub fn stats(&self, principal: &Principal) -> BookingResult<AdminStats> {
        principal.require_admin()?;
        Ok(AdminStats {
            total_patients: self.store.count_accounts(Role::Patient)?,
            total_doctors: self.directory.count()?,
            total_appointments: self.appointments.count()?,
            pending_bills: self.billing.pending_count()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{AppointmentStatus, DoctorDraft, Language, PaymentStatus, RegisterRequest};

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    fn hospital() -> Hospital {
        let config = Config {
            bcrypt_cost: 4,
            ..Config::default()
        };
        Hospital::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FixedClock::on(monday())),
            &config,
        )
    }

    fn sign_up(hospital: &Hospital, username: &str, role: Role) -> Principal {
        let account = hospital
            .identity
            .create_account(
                RegisterRequest {
                    username: username.into(),
                    password: "secret123".into(),
                    full_name: format!("{} user", username),
                    phone: String::new(),
                    email: String::new(),
                    language_preference: Language::En,
                },
                role,
            )
            .unwrap();
        Principal {
            account_id: account.id,
            role: account.role,
            full_name: account.full_name,
        }
    }

    fn add_doctor(hospital: &Hospital, admin: &Principal) -> Uuid {
        let draft: DoctorDraft = serde_json::from_value(serde_json::json!({
            "name": "Dr. A",
            "specialization": "Cardiologist",
            "consultation_fee": 1500.0,
            "available_days": ["Monday"],
            "consultation_hours": "9:00 AM - 5:00 PM"
        }))
        .unwrap();
        hospital.directory.create(admin, draft).unwrap().id
    }

    #[test]
    fn booking_opens_a_pending_bill_for_the_fee() {
        let hospital = hospital();
        let admin = sign_up(&hospital, "admin", Role::Admin);
        let patient = sign_up(&hospital, "patient", Role::Patient);
        let doctor_id = add_doctor(&hospital, &admin);

        let booking = hospital
            .book(&patient, doctor_id, monday(), "9:00 AM".parse().unwrap())
            .unwrap();
        assert_eq!(booking.appointment.slot_number, 1);
        assert_eq!(booking.bill.appointment_id, booking.appointment.id);
        assert_eq!(booking.bill.amount, 1500.0);
        assert_eq!(booking.bill.payment_status, PaymentStatus::Pending);
        assert_eq!(booking.bill.patient_name, "patient user");
    }

    #[test]
    fn failed_booking_leaves_no_bill() {
        let hospital = hospital();
        let admin = sign_up(&hospital, "admin", Role::Admin);
        let patient = sign_up(&hospital, "patient", Role::Patient);
        let doctor_id = add_doctor(&hospital, &admin);
        let at = "9:00 AM".parse().unwrap();

        hospital.book(&patient, doctor_id, monday(), at).unwrap();
        assert!(hospital.book(&patient, doctor_id, monday(), at).is_err());
        assert_eq!(hospital.billing.list_for_patient(&patient).unwrap().len(), 1);

        assert!(matches!(
            hospital.book(&admin, doctor_id, monday(), "10:00 AM".parse().unwrap()),
            Err(BookingError::Forbidden(_))
        ));
    }

    #[test]
    fn stats_count_across_ledgers() {
        let hospital = hospital();
        let admin = sign_up(&hospital, "admin", Role::Admin);
        let patient = sign_up(&hospital, "patient", Role::Patient);
        sign_up(&hospital, "another", Role::Patient);
        let doctor_id = add_doctor(&hospital, &admin);

        let first = hospital
            .book(&patient, doctor_id, monday(), "9:00 AM".parse().unwrap())
            .unwrap();
        hospital
            .book(&patient, doctor_id, monday(), "9:30 AM".parse().unwrap())
            .unwrap();
        hospital.billing.pay(&patient, first.bill.id).unwrap();

        assert_eq!(
            hospital.stats(&admin).unwrap(),
            AdminStats {
                total_patients: 2,
                total_doctors: 1,
                total_appointments: 2,
                pending_bills: 1,
            }
        );
        assert!(hospital.stats(&patient).is_err());
    }

    #[test]
    fn cancelled_slot_can_be_rebooked_with_new_number() {
        let hospital = hospital();
        let admin = sign_up(&hospital, "admin", Role::Admin);
        let patient = sign_up(&hospital, "patient", Role::Patient);
        let doctor_id = add_doctor(&hospital, &admin);
        let at = "11:00 AM".parse().unwrap();

        let first = hospital.book(&patient, doctor_id, monday(), at).unwrap();
        let cancelled = hospital
            .appointments
            .cancel(&patient, first.appointment.id)
            .unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);

        let again = hospital.book(&patient, doctor_id, monday(), at).unwrap();
        assert_eq!(again.appointment.slot_number, 2);
        assert_eq!(
            hospital
                .appointments
                .get(&patient, first.appointment.id)
                .unwrap()
                .slot_number,
            1
        );
    }

    /// Delegates to a `MemoryStore` but refuses to store bills.
    struct BillsOffline(MemoryStore);

    impl Store for BillsOffline {
        fn insert_account(&self, account: crate::models::Account) -> BookingResult<()> {
            self.0.insert_account(account)
        }
        fn account(&self, id: Uuid) -> BookingResult<Option<crate::models::Account>> {
            self.0.account(id)
        }
        fn account_by_username(&self, username: &str) -> BookingResult<Option<crate::models::Account>> {
            self.0.account_by_username(username)
        }
        fn update_account(&self, account: crate::models::Account) -> BookingResult<()> {
            self.0.update_account(account)
        }
        fn count_accounts(&self, role: Role) -> BookingResult<usize> {
            self.0.count_accounts(role)
        }
        fn insert_session(&self, session: crate::models::Session) -> BookingResult<()> {
            self.0.insert_session(session)
        }
        fn session(&self, token: &str) -> BookingResult<Option<crate::models::Session>> {
            self.0.session(token)
        }
        fn remove_session(&self, token: &str) -> BookingResult<bool> {
            self.0.remove_session(token)
        }
        fn purge_expired_sessions(&self, now: chrono::DateTime<chrono::Utc>) -> BookingResult<usize> {
            self.0.purge_expired_sessions(now)
        }
        fn insert_doctor(&self, doctor: crate::models::Doctor) -> BookingResult<()> {
            self.0.insert_doctor(doctor)
        }
        fn doctor(&self, id: Uuid) -> BookingResult<Option<crate::models::Doctor>> {
            self.0.doctor(id)
        }
        fn update_doctor(&self, doctor: crate::models::Doctor) -> BookingResult<()> {
            self.0.update_doctor(doctor)
        }
        fn doctors(&self) -> BookingResult<Vec<crate::models::Doctor>> {
            self.0.doctors()
        }
        fn reserve(&self, reservation: crate::models::Reservation) -> BookingResult<Appointment> {
            self.0.reserve(reservation)
        }
        fn appointment(&self, id: Uuid) -> BookingResult<Option<Appointment>> {
            self.0.appointment(id)
        }
        fn appointments(&self) -> BookingResult<Vec<Appointment>> {
            self.0.appointments()
        }
        fn booked_times(&self, doctor_id: Uuid, date: NaiveDate) -> BookingResult<Vec<SlotTime>> {
            self.0.booked_times(doctor_id, date)
        }
        fn transition_appointment(&self, id: Uuid, next: AppointmentStatus) -> BookingResult<Appointment> {
            self.0.transition_appointment(id, next)
        }
        fn discard_appointment(&self, id: Uuid) -> BookingResult<()> {
            self.0.discard_appointment(id)
        }
        fn insert_bill(&self, _bill: Bill) -> BookingResult<()> {
            Err(BookingError::Storage("bills table unavailable".into()))
        }
        fn bill(&self, id: Uuid) -> BookingResult<Option<Bill>> {
            self.0.bill(id)
        }
        fn bills(&self) -> BookingResult<Vec<Bill>> {
            self.0.bills()
        }
        fn settle_bill(&self, id: Uuid, paid_at: chrono::DateTime<chrono::Utc>) -> BookingResult<Bill> {
            self.0.settle_bill(id, paid_at)
        }
    }

    #[test]
    fn billing_failure_releases_the_reservation() {
        let config = Config {
            bcrypt_cost: 4,
            ..Config::default()
        };
        let store = Arc::new(BillsOffline(MemoryStore::new()));
        let hospital = Hospital::new(store.clone(), Arc::new(FixedClock::on(monday())), &config);
        let admin = sign_up(&hospital, "admin", Role::Admin);
        let patient = sign_up(&hospital, "patient", Role::Patient);
        let doctor_id = add_doctor(&hospital, &admin);
        let at: SlotTime = "9:00 AM".parse().unwrap();

        let err = hospital.book(&patient, doctor_id, monday(), at).unwrap_err();
        assert!(matches!(err, BookingError::Storage(_)));
        assert!(store.appointments().unwrap().is_empty());
        assert!(store.booked_times(doctor_id, monday()).unwrap().is_empty());
        assert!(store.bills().unwrap().is_empty());
    }
}
