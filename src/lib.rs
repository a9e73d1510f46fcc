//! Hospital appointment booking service.
//!
//! Patients register and sign in, browse the doctor directory, reserve
//! numbered slots with a doctor and pay the consultation bill. Admins manage
//! doctors and see every ledger. The HTTP surface lives in `api`; everything
//! underneath is plain synchronous domain code over an injected `Store`.

pub mod allocator;
pub mod api;
pub mod appointments;
pub mod billing;
pub mod calendar;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod models;
pub mod seed;
pub mod service;
pub mod store;

pub use error::{BookingError, BookingResult};
pub use service::Hospital;
