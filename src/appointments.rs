/// Appointment ledger: listing and status transitions.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};
use crate::models::{Appointment, AppointmentStatus, Principal};
use crate::store::Store;

/// Offset/limit window for admin listings. No limit means everything.
#[derive(Debug, Clone, Copy, Default, serde::Deserialize)]
pub struct Page {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl Page {
    fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let offset = self.offset.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        items.into_iter().skip(offset).take(limit).collect()
    }
}

pub struct AppointmentLedger {
    store: Arc<dyn Store>,
}

impl AppointmentLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        AppointmentLedger { store }
    }

    fn find(&self, id: Uuid) -> BookingResult<Appointment> {
        self.store
            .appointment(id)?
            .ok_or_else(|| BookingError::not_found("Appointment not found"))
    }

    pub fn get(&self, principal: &Principal, id: Uuid) -> BookingResult<Appointment> {
        let appointment = self.find(id)?;
        principal.require_owner_or_admin(appointment.patient_id)?;
        Ok(appointment)
    }

    /// The caller's appointments, earliest date and slot first.
    pub fn list_for_patient(&self, principal: &Principal) -> BookingResult<Vec<Appointment>> {
        let mut appointments: Vec<Appointment> = self
            .store
            .appointments()?
            .into_iter()
            .filter(|a| a.patient_id == principal.account_id)
            .collect();
        appointments.sort_by_key(|a| (a.appointment_date, a.slot_time, a.slot_number));
        Ok(appointments)
    }

    /// Every appointment, most recently booked first.
    pub fn list_all(&self, principal: &Principal, page: Page) -> BookingResult<Vec<Appointment>> {
        principal.require_admin()?;
        let mut appointments = self.store.appointments()?;
        appointments.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.slot_number.cmp(&a.slot_number))
        });
        Ok(page.apply(appointments))
    }

    /// Cancel a confirmed appointment. Owners and admins only.
    pub fn cancel(&self, principal: &Principal, id: Uuid) -> BookingResult<Appointment> {
        let appointment = self.find(id)?;
        principal.require_owner_or_admin(appointment.patient_id)?;
        let cancelled = self
            .store
            .transition_appointment(id, AppointmentStatus::Cancelled)?;
        info!(
            "Appointment {} (slot #{} with {}) cancelled",
            id, cancelled.slot_number, cancelled.doctor_name
        );
        Ok(cancelled)
    }

    /// Mark a confirmed appointment as completed. Admins only.
    pub fn complete(&self, principal: &Principal, id: Uuid) -> BookingResult<Appointment> {
        principal.require_admin()?;
        self.find(id)?;
        let completed = self
            .store
            .transition_appointment(id, AppointmentStatus::Completed)?;
        info!("Appointment {} completed", id);
        Ok(completed)
    }

    pub fn count(&self) -> BookingResult<usize> {
        Ok(self.store.appointments()?.len())
    }
}
