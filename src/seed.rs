/// Sample accounts and doctors for a fresh store.

use chrono::Weekday;
use tracing::info;

use crate::config::Config;
use crate::error::BookingResult;
use crate::models::{DoctorDraft, Principal, Role};
use crate::service::Hospital;

struct SampleDoctor {
    name: &'static str,
    name_bengali: &'static str,
    specialization: &'static str,
    specialization_bengali: &'static str,
    qualifications: &'static str,
    experience_years: u32,
    consultation_fee: f64,
    available_days: [Weekday; 4],
    consultation_hours: &'static str,
}

const SAMPLE_DOCTORS: [SampleDoctor; 5] = [
    SampleDoctor {
        name: "Dr. Sarah Ahmed",
        name_bengali: "ডাঃ সারাহ আহমেদ",
        specialization: "Cardiologist",
        specialization_bengali: "হৃদরোগ বিশেষজ্ঞ",
        qualifications: "MBBS, MD (Cardiology)",
        experience_years: 15,
        consultation_fee: 1500.0,
        available_days: [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu],
        consultation_hours: "9:00 AM - 5:00 PM",
    },
    SampleDoctor {
        name: "Dr. Kamal Hassan",
        name_bengali: "ডাঃ কামাল হাসান",
        specialization: "Neurologist",
        specialization_bengali: "স্নায়ু বিশেষজ্ঞ",
        qualifications: "MBBS, MD (Neurology)",
        experience_years: 12,
        consultation_fee: 1200.0,
        available_days: [Weekday::Sun, Weekday::Mon, Weekday::Wed, Weekday::Fri],
        consultation_hours: "10:00 AM - 6:00 PM",
    },
    SampleDoctor {
        name: "Dr. Fatima Khan",
        name_bengali: "ডাঃ ফাতিমা খান",
        specialization: "Pediatrician",
        specialization_bengali: "শিশু বিশেষজ্ঞ",
        qualifications: "MBBS, DCH, MD (Pediatrics)",
        experience_years: 10,
        consultation_fee: 1000.0,
        available_days: [Weekday::Sat, Weekday::Sun, Weekday::Tue, Weekday::Thu],
        consultation_hours: "9:00 AM - 4:00 PM",
    },
    SampleDoctor {
        name: "Dr. Rajesh Kumar",
        name_bengali: "ডাঃ রাজেশ কুমার",
        specialization: "Orthopedic Surgeon",
        specialization_bengali: "অর্থোপেডিক সার্জন",
        qualifications: "MBBS, MS (Orthopedics)",
        experience_years: 18,
        consultation_fee: 1800.0,
        available_days: [Weekday::Mon, Weekday::Tue, Weekday::Thu, Weekday::Sat],
        consultation_hours: "8:00 AM - 3:00 PM",
    },
    SampleDoctor {
        name: "Dr. Nazia Rahman",
        name_bengali: "ডাঃ নাজিয়া রহমান",
        specialization: "Dermatologist",
        specialization_bengali: "চর্মরোগ বিশেষজ্ঞ",
        qualifications: "MBBS, DDV, MD (Dermatology)",
        experience_years: 8,
        consultation_fee: 900.0,
        available_days: [Weekday::Sun, Weekday::Mon, Weekday::Tue, Weekday::Wed],
        consultation_hours: "11:00 AM - 7:00 PM",
    },
];

/// Create the `admin` and `patient` accounts, and the sample doctors when
/// the directory is empty. Safe to run against an already seeded store.
pub fn seed(hospital: &Hospital, config: &Config) -> BookingResult<()> {
    let admin = hospital.identity.ensure_account(
        "admin",
        &config.seed_admin_password,
        "Admin User",
        Role::Admin,
    )?;
    hospital.identity.ensure_account(
        "patient",
        &config.seed_patient_password,
        "John Doe",
        Role::Patient,
    )?;

    let existing = hospital.directory.count()?;
    if existing > 0 {
        info!("Doctors already exist ({} doctors)", existing);
        return Ok(());
    }

    let principal = Principal {
        account_id: admin.id,
        role: admin.role,
        full_name: admin.full_name,
    };
    for sample in &SAMPLE_DOCTORS {
        let draft = DoctorDraft {
            name: sample.name.to_string(),
            name_bengali: sample.name_bengali.to_string(),
            specialization: sample.specialization.to_string(),
            specialization_bengali: sample.specialization_bengali.to_string(),
            qualifications: sample.qualifications.to_string(),
            experience_years: sample.experience_years,
            consultation_fee: sample.consultation_fee,
            available_days: sample.available_days.to_vec(),
            consultation_hours: sample.consultation_hours.parse()?,
            image_url: None,
        };
        hospital.directory.create(&principal, draft)?;
    }
    info!("{} sample doctors created", SAMPLE_DOCTORS.len());
    Ok(())
}
