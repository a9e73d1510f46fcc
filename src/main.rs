/// Command-line entry point for the hospital booking service.
///
/// `serve` runs the REST API; `demo` walks through the booking workflow
/// against a seeded in-memory store and prints what happens.

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::info;

use hospital_booking::config::Config;
use hospital_booking::directory::DoctorQuery;
use hospital_booking::models::{Doctor, LoginRequest, Principal};
use hospital_booking::{api, seed, Hospital};

#[derive(Parser)]
#[command(name = "hospital-booking", version, about = "Hospital appointment booking service")]
struct Cli {
    /// Path to a YAML config file.
    #[arg(long, env = "HOSPITAL_BOOKING_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the REST API (default).
    Serve {
        /// Listen address, overriding the config file.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Run a scripted booking session and print the results.
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Default subscriber until the configured level is known.
    let config = tracing::subscriber::with_default(tracing_subscriber::fmt().finish(), || {
        Config::load(cli.config.as_deref())
    })?;

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level())
        .init();

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => serve(config, bind).await,
        Command::Demo => run_demo(config),
    }
}

async fn serve(mut config: Config, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.bind_addr = bind;
    }

    let hospital = Hospital::in_memory(&config);
    if config.seed_demo_data {
        seed::seed(&hospital, &config).context("failed to seed sample data")?;
    }

    let app = api::router(Arc::new(hospital));
    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid listen address: {}", config.bind_addr))?;
    let listener = TcpListener::bind(addr)
        .await
        .context("failed to bind TCP listener")?;
    info!("Hospital booking API listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
}

fn print_header(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("       {}", title);
    println!("{}", "=".repeat(60));
}

/// First date after today that the doctor works.
fn next_working_day(doctor: &Doctor) -> NaiveDate {
    let mut date = Local::now().date_naive() + Duration::days(1);
    while !doctor.works_on(date.weekday()) {
        date = date + Duration::days(1);
    }
    date
}

fn run_demo(config: Config) -> Result<()> {
    print_header("HOSPITAL APPOINTMENT BOOKING DEMO");

    let hospital = Hospital::in_memory(&config);
    seed::seed(&hospital, &config)?;

    let doctors = hospital.directory.list(&DoctorQuery::default())?;
    println!("\n--- Doctors ({}) ---", doctors.len());
    for doctor in &doctors {
        println!(
            "  {:20} {:20} {:>7.0}  {}",
            doctor.name, doctor.specialization, doctor.consultation_fee, doctor.consultation_hours
        );
    }

    let patient = hospital.identity.login(LoginRequest {
        username: "patient".to_string(),
        password: config.seed_patient_password.clone(),
    })?;
    let patient = hospital.identity.authenticate(&patient.session.token)?;
    let admin = hospital.identity.login(LoginRequest {
        username: "admin".to_string(),
        password: config.seed_admin_password.clone(),
    })?;
    let admin = hospital.identity.authenticate(&admin.session.token)?;

    let doctor = hospital
        .directory
        .list(&DoctorQuery {
            search: Some("cardio".to_string()),
            specialization: None,
        })?
        .into_iter()
        .next()
        .context("seeded cardiologist missing")?;
    let date = next_working_day(&doctor);

    println!("\n--- Booking with {} on {} ---", doctor.name, date.format("%A, %Y-%m-%d"));
    let mut bills = Vec::new();
    for time in ["9:00 AM", "9:00 AM", "9:30 AM"] {
        match hospital.book(&patient, doctor.id, date, time.parse()?) {
            Ok(booking) => {
                println!(
                    "  {:8} -> slot #{} (bill {:.0} pending)",
                    time, booking.appointment.slot_number, booking.bill.amount
                );
                bills.push(booking);
            }
            Err(e) => println!("  {:8} -> rejected: {}", time, e),
        }
    }

    println!("\n--- Billing ---");
    if let Some(first) = bills.first() {
        for attempt in 1..=2 {
            match hospital.billing.pay(&patient, first.bill.id) {
                Ok(bill) => println!("  Payment {}: {:.0} paid", attempt, bill.amount),
                Err(e) => println!("  Payment {}: rejected: {}", attempt, e),
            }
        }
    }

    println!("\n--- Admin ---");
    if let Some(first) = bills.first() {
        let completed = hospital.appointments.complete(&admin, first.appointment.id)?;
        println!("  Appointment #{} marked {}", completed.slot_number, completed.status.name());
        if let Err(e) = hospital.appointments.cancel(&patient, first.appointment.id) {
            println!("  Cancelling it again: {}", e);
        }
    }
    print_stats(&hospital, &admin)?;

    println!("\n--- My appointments ---");
    for appointment in hospital.appointments.list_for_patient(&patient)? {
        println!(
            "  {} {:8} #{} {} ({})",
            appointment.appointment_date,
            appointment.slot_time,
            appointment.slot_number,
            appointment.doctor_name,
            appointment.status.name()
        );
    }

    Ok(())
}

fn print_stats(hospital: &Hospital, admin: &Principal) -> Result<()> {
    let stats = hospital.stats(admin)?;
    println!("  Patients: {}", stats.total_patients);
    println!("  Doctors: {}", stats.total_doctors);
    println!("  Appointments: {}", stats.total_appointments);
    println!("  Pending bills: {}", stats.pending_bills);
    Ok(())
}
