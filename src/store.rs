/// Persistence interface for the booking service.
///
/// Every component talks to an injected `Store`. The store owns the two
/// operations that must be atomic: reserving a slot (check-then-insert with
/// slot numbering) and status transitions (check-then-write).

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};
use crate::models::{
    Account, Appointment, AppointmentStatus, Bill, Doctor, PaymentStatus, Reservation, Role,
    Session, SlotKey, SlotTime,
};

pub trait Store: Send + Sync {
    /// Insert an account; fails with `Validation` if the username is taken.
    fn insert_account(&self, account: Account) -> BookingResult<()>;
    fn account(&self, id: Uuid) -> BookingResult<Option<Account>>;
    fn account_by_username(&self, username: &str) -> BookingResult<Option<Account>>;
    fn update_account(&self, account: Account) -> BookingResult<()>;
    fn count_accounts(&self, role: Role) -> BookingResult<usize>;

    fn insert_session(&self, session: Session) -> BookingResult<()>;
    fn session(&self, token: &str) -> BookingResult<Option<Session>>;
    fn remove_session(&self, token: &str) -> BookingResult<bool>;
    /// Drop every session that has expired at `now`; returns how many went.
    fn purge_expired_sessions(&self, now: DateTime<Utc>) -> BookingResult<usize>;

    fn insert_doctor(&self, doctor: Doctor) -> BookingResult<()>;
    fn doctor(&self, id: Uuid) -> BookingResult<Option<Doctor>>;
    fn update_doctor(&self, doctor: Doctor) -> BookingResult<()>;
    fn doctors(&self) -> BookingResult<Vec<Doctor>>;

    /// Atomically reserve the reservation's slot key.
    ///
    /// Fails with `SlotConflict` when a non-cancelled appointment already holds
    /// the key. On success the appointment is stored as `Confirmed` with the
    /// next slot number for its (doctor, date).
    fn reserve(&self, reservation: Reservation) -> BookingResult<Appointment>;
    fn appointment(&self, id: Uuid) -> BookingResult<Option<Appointment>>;
    fn appointments(&self) -> BookingResult<Vec<Appointment>>;
    /// Times on `date` held by non-cancelled appointments of `doctor_id`.
    fn booked_times(&self, doctor_id: Uuid, date: NaiveDate) -> BookingResult<Vec<SlotTime>>;
    /// Atomically move an appointment to `next`, releasing its slot key on cancel.
    fn transition_appointment(&self, id: Uuid, next: AppointmentStatus) -> BookingResult<Appointment>;
    /// Remove an appointment and free its slot key. Its slot number is not reissued.
    fn discard_appointment(&self, id: Uuid) -> BookingResult<()>;

    fn insert_bill(&self, bill: Bill) -> BookingResult<()>;
    fn bill(&self, id: Uuid) -> BookingResult<Option<Bill>>;
    fn bills(&self) -> BookingResult<Vec<Bill>>;
    /// Atomically mark a pending bill paid; a paid bill fails with `AlreadyPaid`.
    fn settle_bill(&self, id: Uuid, paid_at: DateTime<Utc>) -> BookingResult<Bill>;
}

#[derive(Default)]
struct AccountTable {
    rows: HashMap<Uuid, Account>,
    by_username: HashMap<String, Uuid>,
}

#[derive(Default)]
struct AppointmentTable {
    rows: HashMap<Uuid, Appointment>,
    held: HashMap<SlotKey, Uuid>,
    last_slot_number: HashMap<(Uuid, NaiveDate), u32>,
}

/// In-memory store. Each table has its own lock; reservations and
/// transitions serialize on the appointment table's write lock.
#[derive(Default)]
pub struct MemoryStore {
    accounts: RwLock<AccountTable>,
    sessions: RwLock<HashMap<String, Session>>,
    doctors: RwLock<HashMap<Uuid, Doctor>>,
    appointments: RwLock<AppointmentTable>,
    bills: RwLock<HashMap<Uuid, Bill>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

fn read<'a, T>(lock: &'a RwLock<T>, table: &str) -> BookingResult<RwLockReadGuard<'a, T>> {
    lock.read()
        .map_err(|_| BookingError::Storage(format!("{} table lock poisoned", table)))
}

fn write<'a, T>(lock: &'a RwLock<T>, table: &str) -> BookingResult<RwLockWriteGuard<'a, T>> {
    lock.write()
        .map_err(|_| BookingError::Storage(format!("{} table lock poisoned", table)))
}

fn username_key(username: &str) -> String {
    username.trim().to_lowercase()
}

impl Store for MemoryStore {
    fn insert_account(&self, account: Account) -> BookingResult<()> {
        let mut table = write(&self.accounts, "accounts")?;
        let key = username_key(&account.username);
        if table.by_username.contains_key(&key) {
            return Err(BookingError::validation("Username already registered"));
        }
        table.by_username.insert(key, account.id);
        table.rows.insert(account.id, account);
        Ok(())
    }

    fn account(&self, id: Uuid) -> BookingResult<Option<Account>> {
        Ok(read(&self.accounts, "accounts")?.rows.get(&id).cloned())
    }

    fn account_by_username(&self, username: &str) -> BookingResult<Option<Account>> {
        let table = read(&self.accounts, "accounts")?;
        Ok(table
            .by_username
            .get(&username_key(username))
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    fn update_account(&self, account: Account) -> BookingResult<()> {
        let mut table = write(&self.accounts, "accounts")?;
        match table.rows.get_mut(&account.id) {
            Some(existing) => {
                *existing = account;
                Ok(())
            }
            None => Err(BookingError::not_found("Account not found")),
        }
    }

    fn count_accounts(&self, role: Role) -> BookingResult<usize> {
        let table = read(&self.accounts, "accounts")?;
        Ok(table.rows.values().filter(|a| a.role == role).count())
    }

    fn insert_session(&self, session: Session) -> BookingResult<()> {
        write(&self.sessions, "sessions")?.insert(session.token.clone(), session);
        Ok(())
    }

    fn session(&self, token: &str) -> BookingResult<Option<Session>> {
        Ok(read(&self.sessions, "sessions")?.get(token).cloned())
    }

    fn remove_session(&self, token: &str) -> BookingResult<bool> {
        Ok(write(&self.sessions, "sessions")?.remove(token).is_some())
    }

    fn purge_expired_sessions(&self, now: DateTime<Utc>) -> BookingResult<usize> {
        let mut sessions = write(&self.sessions, "sessions")?;
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        Ok(before - sessions.len())
    }

    fn insert_doctor(&self, doctor: Doctor) -> BookingResult<()> {
        write(&self.doctors, "doctors")?.insert(doctor.id, doctor);
        Ok(())
    }

    fn doctor(&self, id: Uuid) -> BookingResult<Option<Doctor>> {
        Ok(read(&self.doctors, "doctors")?.get(&id).cloned())
    }

    fn update_doctor(&self, doctor: Doctor) -> BookingResult<()> {
        let mut doctors = write(&self.doctors, "doctors")?;
        match doctors.get_mut(&doctor.id) {
            Some(existing) => {
                *existing = doctor;
                Ok(())
            }
            None => Err(BookingError::not_found("Doctor not found")),
        }
    }

    fn doctors(&self) -> BookingResult<Vec<Doctor>> {
        Ok(read(&self.doctors, "doctors")?.values().cloned().collect())
    }

    fn reserve(&self, reservation: Reservation) -> BookingResult<Appointment> {
        let mut table = write(&self.appointments, "appointments")?;
        let key = reservation.slot_key();
        if table.held.contains_key(&key) {
            return Err(BookingError::SlotConflict {
                doctor_id: key.doctor_id,
                date: key.date,
                slot_time: key.slot_time,
            });
        }

        let counter = table
            .last_slot_number
            .entry((reservation.doctor_id, reservation.appointment_date))
            .or_insert(0);
        *counter += 1;
        let slot_number = *counter;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: reservation.patient_id,
            patient_name: reservation.patient_name,
            doctor_id: reservation.doctor_id,
            doctor_name: reservation.doctor_name,
            appointment_date: reservation.appointment_date,
            slot_time: reservation.slot_time,
            slot_number,
            status: AppointmentStatus::Confirmed,
            created_at: reservation.created_at,
        };
        table.held.insert(key, appointment.id);
        table.rows.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    fn appointment(&self, id: Uuid) -> BookingResult<Option<Appointment>> {
        Ok(read(&self.appointments, "appointments")?.rows.get(&id).cloned())
    }

    fn appointments(&self) -> BookingResult<Vec<Appointment>> {
        Ok(read(&self.appointments, "appointments")?
            .rows
            .values()
            .cloned()
            .collect())
    }

    fn booked_times(&self, doctor_id: Uuid, date: NaiveDate) -> BookingResult<Vec<SlotTime>> {
        let table = read(&self.appointments, "appointments")?;
        Ok(table
            .held
            .keys()
            .filter(|key| key.doctor_id == doctor_id && key.date == date)
            .map(|key| key.slot_time)
            .collect())
    }

    fn transition_appointment(&self, id: Uuid, next: AppointmentStatus) -> BookingResult<Appointment> {
        let mut table = write(&self.appointments, "appointments")?;
        let appointment = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| BookingError::not_found("Appointment not found"))?;
        appointment.status = appointment.status.transition(next)?;
        let updated = appointment.clone();

        if next == AppointmentStatus::Cancelled {
            let key = updated.slot_key();
            if table.held.get(&key) == Some(&id) {
                table.held.remove(&key);
            }
        }
        Ok(updated)
    }

    fn discard_appointment(&self, id: Uuid) -> BookingResult<()> {
        let mut table = write(&self.appointments, "appointments")?;
        let appointment = table
            .rows
            .remove(&id)
            .ok_or_else(|| BookingError::not_found("Appointment not found"))?;
        let key = appointment.slot_key();
        if table.held.get(&key) == Some(&id) {
            table.held.remove(&key);
        }
        Ok(())
    }

    fn insert_bill(&self, bill: Bill) -> BookingResult<()> {
        write(&self.bills, "bills")?.insert(bill.id, bill);
        Ok(())
    }

    fn bill(&self, id: Uuid) -> BookingResult<Option<Bill>> {
        Ok(read(&self.bills, "bills")?.get(&id).cloned())
    }

    fn bills(&self) -> BookingResult<Vec<Bill>> {
        Ok(read(&self.bills, "bills")?.values().cloned().collect())
    }

    fn settle_bill(&self, id: Uuid, paid_at: DateTime<Utc>) -> BookingResult<Bill> {
        let mut bills = write(&self.bills, "bills")?;
        let bill = bills
            .get_mut(&id)
            .ok_or_else(|| BookingError::not_found("Bill not found"))?;
        if bill.payment_status == PaymentStatus::Paid {
            return Err(BookingError::AlreadyPaid(id));
        }
        bill.payment_status = PaymentStatus::Paid;
        bill.paid_at = Some(paid_at);
        Ok(bill.clone())
    }
}
