pub mod actor;
pub mod booking;
pub mod payment;
pub mod ports;
pub mod schedule;
pub mod webhook;
