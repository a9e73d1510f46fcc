/// Doctor directory: search for everyone, writes for admins.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{BookingError, BookingResult};
use crate::models::{Doctor, DoctorDraft, Principal};
use crate::store::Store;

/// Optional filters for listing doctors.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct DoctorQuery {
    pub search: Option<String>,
    pub specialization: Option<String>,
}

impl DoctorQuery {
    fn matches(&self, doctor: &Doctor) -> bool {
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = doctor.name.to_lowercase().contains(&needle)
                || doctor.specialization.to_lowercase().contains(&needle)
                || doctor.name_bengali.contains(search)
                || doctor.specialization_bengali.contains(search);
            if !hit {
                return false;
            }
        }

        match self.specialization.as_deref().map(str::trim) {
            None | Some("") | Some("all") => true,
            Some(wanted) => {
                doctor.specialization.eq_ignore_ascii_case(wanted)
                    || doctor.specialization_bengali == wanted
            }
        }
    }
}

pub struct DoctorDirectory {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl DoctorDirectory {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        DoctorDirectory { store, clock }
    }

    pub fn create(&self, principal: &Principal, draft: DoctorDraft) -> BookingResult<Doctor> {
        principal.require_admin()?;
        let doctor = draft.into_doctor(Uuid::new_v4(), self.clock.now())?;
        self.store.insert_doctor(doctor.clone())?;
        info!("Added doctor {} ({})", doctor.name, doctor.id);
        Ok(doctor)
    }

    /// Replace a doctor's details, keeping its id and creation time.
    pub fn update(&self, principal: &Principal, id: Uuid, draft: DoctorDraft) -> BookingResult<Doctor> {
        principal.require_admin()?;
        let existing = self.get(id)?;
        let doctor = draft.into_doctor(existing.id, existing.created_at)?;
        self.store.update_doctor(doctor.clone())?;
        info!("Updated doctor {} ({})", doctor.name, doctor.id);
        Ok(doctor)
    }

    pub fn get(&self, id: Uuid) -> BookingResult<Doctor> {
        self.store
            .doctor(id)?
            .ok_or_else(|| BookingError::not_found("Doctor not found"))
    }

    /// Doctors matching the query, ordered by name.
    pub fn list(&self, query: &DoctorQuery) -> BookingResult<Vec<Doctor>> {
        let mut doctors: Vec<Doctor> = self
            .store
            .doctors()?
            .into_iter()
            .filter(|d| query.matches(d))
            .collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(doctors)
    }

    pub fn count(&self) -> BookingResult<usize> {
        Ok(self.store.doctors()?.len())
    }
}
