/// Data models for the hospital booking service.
///
/// This module defines the core records shared by every component:
/// - Account: patient and admin identities
/// - Doctor: directory entries with their weekly schedule
/// - SlotTime / ConsultationHours: wall-clock slot times and working hours
/// - Appointment: a reserved slot and its status
/// - Bill: the consultation charge tied to an appointment

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};

/// Account roles. Admins manage the directory and see every ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Admin,
}

impl Role {
    pub fn name(&self) -> &str {
        match self {
            Role::Patient => "patient",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Bn,
}

/// A bookable wall-clock time such as `9:30 AM`.
///
/// Parses both `h:mm AM/PM` and 24-hour `HH:MM`; always displays in the
/// 12-hour form the booking page offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotTime(NaiveTime);

impl SlotTime {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(SlotTime)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// Minutes since midnight.
    pub fn minutes(&self) -> i64 {
        i64::from(self.0.num_seconds_from_midnight() / 60)
    }

    pub fn add_minutes(&self, minutes: i64) -> Option<Self> {
        let (time, wrapped) = self
            .0
            .overflowing_add_signed(Duration::minutes(minutes));
        if wrapped == 0 {
            Some(SlotTime(time))
        } else {
            None
        }
    }
}

impl FromStr for SlotTime {
    type Err = BookingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let upper = trimmed.to_uppercase();
        NaiveTime::parse_from_str(&upper, "%I:%M %p")
            .or_else(|_| NaiveTime::parse_from_str(&upper, "%I:%M%p"))
            .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
            .map(SlotTime)
            .map_err(|_| {
                BookingError::validation(format!(
                    "Invalid slot time: '{}'. Expected a time like '9:30 AM'",
                    value
                ))
            })
    }
}

impl TryFrom<String> for SlotTime {
    type Error = BookingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SlotTime> for String {
    fn from(value: SlotTime) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%-I:%M %p"))
    }
}

/// Daily consultation window, e.g. `9:00 AM - 5:00 PM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConsultationHours {
    pub start: SlotTime,
    pub end: SlotTime,
}

impl ConsultationHours {
    pub fn new(start: SlotTime, end: SlotTime) -> BookingResult<Self> {
        if end <= start {
            return Err(BookingError::validation(
                "Consultation hours must end after they start",
            ));
        }
        Ok(ConsultationHours { start, end })
    }

    /// Check that a slot of `length_minutes` starting at `time` fits inside the window.
    pub fn fits(&self, time: SlotTime, length_minutes: i64) -> bool {
        time >= self.start && time.minutes() + length_minutes <= self.end.minutes()
    }
}

impl FromStr for ConsultationHours {
    type Err = BookingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (start, end) = value.split_once('-').ok_or_else(|| {
            BookingError::validation(format!(
                "Invalid consultation hours: '{}'. Expected '9:00 AM - 5:00 PM'",
                value
            ))
        })?;
        ConsultationHours::new(start.parse()?, end.parse()?)
    }
}

impl TryFrom<String> for ConsultationHours {
    type Error = BookingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConsultationHours> for String {
    fn from(value: ConsultationHours) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ConsultationHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Serialises weekdays by their full English name (`"Monday"`).
pub mod weekday_names {
    use chrono::Weekday;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn full_name(day: Weekday) -> &'static str {
        match day {
            Weekday::Mon => "Monday",
            Weekday::Tue => "Tuesday",
            Weekday::Wed => "Wednesday",
            Weekday::Thu => "Thursday",
            Weekday::Fri => "Friday",
            Weekday::Sat => "Saturday",
            Weekday::Sun => "Sunday",
        }
    }

    pub fn serialize<S: Serializer>(days: &[Weekday], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(days.iter().map(|d| full_name(*d)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Weekday>, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        names
            .iter()
            .map(|name| {
                name.trim()
                    .parse::<Weekday>()
                    .map_err(|_| D::Error::custom(format!("Invalid weekday: '{}'", name)))
            })
            .collect()
    }
}

/// A registered user. The password hash never leaves the service.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub language_preference: Language,
    pub created_at: DateTime<Utc>,
}

/// A directory entry for a doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub name_bengali: String,
    pub specialization: String,
    pub specialization_bengali: String,
    pub qualifications: String,
    pub experience_years: u32,
    pub consultation_fee: f64,
    #[serde(with = "weekday_names")]
    pub available_days: Vec<Weekday>,
    pub consultation_hours: ConsultationHours,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Doctor {
    pub fn works_on(&self, day: Weekday) -> bool {
        self.available_days.contains(&day)
    }
}

/// Admin input for creating or replacing a doctor record.
#[derive(Debug, Clone, Deserialize)]
pub struct DoctorDraft {
    pub name: String,
    #[serde(default)]
    pub name_bengali: String,
    pub specialization: String,
    #[serde(default)]
    pub specialization_bengali: String,
    #[serde(default)]
    pub qualifications: String,
    #[serde(default)]
    pub experience_years: u32,
    pub consultation_fee: f64,
    #[serde(with = "weekday_names")]
    pub available_days: Vec<Weekday>,
    pub consultation_hours: ConsultationHours,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl DoctorDraft {
    /// Validate the draft and build a doctor record with the given identity.
    pub fn into_doctor(self, id: Uuid, created_at: DateTime<Utc>) -> BookingResult<Doctor> {
        if self.name.trim().is_empty() {
            return Err(BookingError::validation("Doctor name cannot be empty"));
        }
        if self.specialization.trim().is_empty() {
            return Err(BookingError::validation("Specialization cannot be empty"));
        }
        if !self.consultation_fee.is_finite() || self.consultation_fee < 0.0 {
            return Err(BookingError::validation(
                "Consultation fee must be a non-negative amount",
            ));
        }
        if self.available_days.is_empty() {
            return Err(BookingError::validation(
                "Doctor must be available on at least one day",
            ));
        }

        let mut available_days = Vec::with_capacity(self.available_days.len());
        for day in self.available_days {
            if !available_days.contains(&day) {
                available_days.push(day);
            }
        }
        available_days.sort_by_key(|d| d.num_days_from_monday());

        Ok(Doctor {
            id,
            name: self.name.trim().to_string(),
            name_bengali: self.name_bengali,
            specialization: self.specialization.trim().to_string(),
            specialization_bengali: self.specialization_bengali,
            qualifications: self.qualifications,
            experience_years: self.experience_years,
            consultation_fee: self.consultation_fee,
            available_days,
            consultation_hours: self.consultation_hours,
            image_url: self.image_url,
            created_at,
        })
    }
}

/// Appointment lifecycle. `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn name(&self) -> &str {
        match self {
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Confirmed)
    }

    /// Validate a move to `next`, returning the new status.
    pub fn transition(self, next: AppointmentStatus) -> BookingResult<AppointmentStatus> {
        match (self, next) {
            (AppointmentStatus::Confirmed, AppointmentStatus::Completed)
            | (AppointmentStatus::Confirmed, AppointmentStatus::Cancelled) => Ok(next),
            _ => Err(BookingError::InvalidTransition {
                from: self.name().to_string(),
                to: next.name().to_string(),
            }),
        }
    }
}

/// A reserved slot with a doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub appointment_date: NaiveDate,
    pub slot_time: SlotTime,
    pub slot_number: u32,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// The key that must be unique among non-cancelled appointments.
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            doctor_id: self.doctor_id,
            date: self.appointment_date,
            slot_time: self.slot_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slot_time: SlotTime,
}

/// What the store needs to reserve a slot; the slot number is assigned on insert.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub patient_id: Uuid,
    pub patient_name: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub appointment_date: NaiveDate,
    pub slot_time: SlotTime,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            doctor_id: self.doctor_id,
            date: self.appointment_date,
            slot_time: self.slot_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// A consultation charge for one appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub amount: f64,
    pub description: String,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// An issued bearer token.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub account_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone)]
pub struct Principal {
    pub account_id: Uuid,
    pub role: Role,
    pub full_name: String,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> BookingResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(BookingError::forbidden("Admin access required"))
        }
    }

    /// Owners and admins may see a record; everyone else is refused.
    pub fn require_owner_or_admin(&self, owner: Uuid) -> BookingResult<()> {
        if self.is_admin() || self.account_id == owner {
            Ok(())
        } else {
            Err(BookingError::forbidden("Not authorized to access this record"))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub language_preference: Language,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Mutable profile fields; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub language_preference: Option<Language>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub slot_time: SlotTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_time_accepts_twelve_and_twenty_four_hour_forms() {
        let morning: SlotTime = "9:00 AM".parse().unwrap();
        assert_eq!(morning, SlotTime::from_hm(9, 0).unwrap());
        assert_eq!("09:00 am".parse::<SlotTime>().unwrap(), morning);
        assert_eq!("14:30".parse::<SlotTime>().unwrap().to_string(), "2:30 PM");
        assert_eq!("12:00 PM".parse::<SlotTime>().unwrap().to_string(), "12:00 PM");
        assert!("25:00".parse::<SlotTime>().is_err());
        assert!("noon".parse::<SlotTime>().is_err());
    }

    #[test]
    fn consultation_hours_parse_and_fit() {
        let hours: ConsultationHours = "9:00 AM - 5:00 PM".parse().unwrap();
        assert_eq!(hours.to_string(), "9:00 AM - 5:00 PM");
        assert!(hours.fits("9:00 AM".parse().unwrap(), 30));
        assert!(hours.fits("4:30 PM".parse().unwrap(), 30));
        assert!(!hours.fits("5:00 PM".parse().unwrap(), 30));
        assert!(!hours.fits("8:30 AM".parse().unwrap(), 30));
        assert!("5:00 PM - 9:00 AM".parse::<ConsultationHours>().is_err());
    }

    #[test]
    fn status_transitions_only_leave_confirmed() {
        use AppointmentStatus::*;
        assert_eq!(Confirmed.transition(Completed).unwrap(), Completed);
        assert_eq!(Confirmed.transition(Cancelled).unwrap(), Cancelled);
        assert!(matches!(
            Completed.transition(Cancelled),
            Err(BookingError::InvalidTransition { .. })
        ));
        assert!(Cancelled.transition(Completed).is_err());
        assert!(Confirmed.transition(Confirmed).is_err());
    }

    #[test]
    fn doctor_json_uses_display_forms() {
        let draft: DoctorDraft = serde_json::from_value(serde_json::json!({
            "name": "Dr. A",
            "specialization": "Cardiologist",
            "consultation_fee": 1500.0,
            "available_days": ["Wednesday", "Monday", "monday"],
            "consultation_hours": "9:00 AM - 5:00 PM"
        }))
        .unwrap();
        let doctor = draft.into_doctor(Uuid::new_v4(), Utc::now()).unwrap();
        assert_eq!(doctor.available_days, vec![Weekday::Mon, Weekday::Wed]);

        let json = serde_json::to_value(&doctor).unwrap();
        assert_eq!(json["available_days"], serde_json::json!(["Monday", "Wednesday"]));
        assert_eq!(json["consultation_hours"], "9:00 AM - 5:00 PM");
    }

    #[test]
    fn doctor_draft_rejects_bad_fee_and_empty_days() {
        let base = serde_json::json!({
            "name": "Dr. B",
            "specialization": "Neurologist",
            "consultation_fee": -1.0,
            "available_days": ["Monday"],
            "consultation_hours": "10:00 AM - 6:00 PM"
        });
        let draft: DoctorDraft = serde_json::from_value(base.clone()).unwrap();
        assert!(draft.into_doctor(Uuid::new_v4(), Utc::now()).is_err());

        let mut no_days = base;
        no_days["consultation_fee"] = serde_json::json!(1200.0);
        no_days["available_days"] = serde_json::json!([]);
        let draft: DoctorDraft = serde_json::from_value(no_days).unwrap();
        assert!(draft.into_doctor(Uuid::new_v4(), Utc::now()).is_err());
    }

    #[test]
    fn account_json_hides_password_hash() {
        let account = Account {
            id: Uuid::new_v4(),
            username: "patient".into(),
            password_hash: "secret-hash".into(),
            role: Role::Patient,
            full_name: "John Doe".into(),
            phone: String::new(),
            email: String::new(),
            language_preference: Language::En,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&account).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "patient");
    }
}
