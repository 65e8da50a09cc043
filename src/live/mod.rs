pub mod monitor;
pub mod timer;
