pub mod attendance;
pub mod class_period;
pub mod student;
