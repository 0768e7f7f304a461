//! Order status transitions.

pub mod order;

pub use order::OrderStateMachine;
