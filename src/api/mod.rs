pub mod attendance;
pub mod live;
pub mod students;
