/// Billing ledger: one consultation charge per appointment.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{BookingError, BookingResult};
use crate::models::{Appointment, Bill, PaymentStatus, Principal};
use crate::store::Store;

pub struct BillingLedger {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

fn newest_first(mut bills: Vec<Bill>) -> Vec<Bill> {
    bills.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    bills
}

impl BillingLedger {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        BillingLedger { store, clock }
    }

    /// Open a pending bill for the doctor's fee at booking time.
    pub fn create_for_appointment(&self, appointment: &Appointment, consultation_fee: f64) -> BookingResult<Bill> {
        let bill = Bill {
            id: Uuid::new_v4(),
            appointment_id: appointment.id,
            patient_id: appointment.patient_id,
            patient_name: appointment.patient_name.clone(),
            amount: consultation_fee,
            description: format!("Consultation fee - {}", appointment.doctor_name),
            payment_status: PaymentStatus::Pending,
            created_at: self.clock.now(),
            paid_at: None,
        };
        self.store.insert_bill(bill.clone())?;
        info!("Created bill {} for appointment {}", bill.id, appointment.id);
        Ok(bill)
    }

    /// Pay one of the caller's own bills.
    pub fn pay(&self, principal: &Principal, id: Uuid) -> BookingResult<Bill> {
        let bill = self.find(id)?;
        if bill.patient_id != principal.account_id {
            return Err(BookingError::forbidden("Only the patient can pay this bill"));
        }

        match self.store.settle_bill(id, self.clock.now()) {
            Ok(paid) => {
                info!("Bill {} paid ({:.2})", paid.id, paid.amount);
                Ok(paid)
            }
            Err(err) => {
                if matches!(err, BookingError::AlreadyPaid(_)) {
                    warn!("Repeated payment attempt for bill {}", id);
                }
                Err(err)
            }
        }
    }

    fn find(&self, id: Uuid) -> BookingResult<Bill> {
        self.store
            .bill(id)?
            .ok_or_else(|| BookingError::not_found("Bill not found"))
    }

    pub fn get(&self, principal: &Principal, id: Uuid) -> BookingResult<Bill> {
        let bill = self.find(id)?;
        principal.require_owner_or_admin(bill.patient_id)?;
        Ok(bill)
    }

    pub fn list_for_patient(&self, principal: &Principal) -> BookingResult<Vec<Bill>> {
        let bills = self
            .store
            .bills()?
            .into_iter()
            .filter(|b| b.patient_id == principal.account_id)
            .collect();
        Ok(newest_first(bills))
    }

    pub fn list_all(&self, principal: &Principal) -> BookingResult<Vec<Bill>> {
        principal.require_admin()?;
        Ok(newest_first(self.store.bills()?))
    }

    pub fn pending_count(&self) -> BookingResult<usize> {
        Ok(self
            .store
            .bills()?
            .iter()
            .filter(|b| b.payment_status == PaymentStatus::Pending)
            .count())
    }
}
