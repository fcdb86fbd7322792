//! Document synchronization with the remote catalog.
//!
//! - `reconcile`: validating a local document against the catalog
//! - `push`: the create / upload / no-op decision and its side effects

pub mod push;
pub mod reconcile;

#[cfg(test)]
mod tests;

pub use push::{plan_push, PushAction, PushOptions, PushPlan, PushReport};
pub use reconcile::{ReconciliationOutcome, Reconciler};
