pub mod engine;
pub mod lifecycle;
pub mod notify;

pub use engine::{BookingEngine, BookingError, CreateBookingRequest, EngineConfig, VehicleRequest};
