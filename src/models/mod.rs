pub mod appointment;
pub mod barber;
pub mod client;
pub mod service;
pub mod slot;

pub use appointment::{Appointment, AppointmentStatus};
pub use barber::{Barber, HoursWindow, WorkingHours};
pub use client::Client;
pub use service::Service;
pub use slot::Slot;
