pub mod booking;
pub mod codes;
pub mod payment;
pub mod repository;
pub mod schedule;
