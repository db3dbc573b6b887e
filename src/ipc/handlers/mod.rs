pub mod classes;
pub mod core;
pub mod hifz;
pub mod progress;
pub mod sessions;
pub mod students;
