pub mod analytics;
pub mod attendance;
pub mod core;
pub mod marks;
pub mod predict;
pub mod students;
pub mod teachers;
