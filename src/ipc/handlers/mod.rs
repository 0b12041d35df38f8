pub mod backup;
pub mod core;
pub mod instruments;
pub mod recap;
pub mod reports;
pub mod schedule;
pub mod settings;
pub mod subjects;
pub mod sync;
