//! Handlers for operations that span several collaborators.

pub mod payment;

pub use payment::PaymentHandler;
