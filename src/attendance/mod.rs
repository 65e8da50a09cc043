pub mod reconcile;
pub mod service;
