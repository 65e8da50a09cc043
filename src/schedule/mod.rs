pub mod cadence;
pub mod scheduler;
