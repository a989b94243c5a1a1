// src/core/tasks/mod.rs

//! Background maintenance tasks that run for the lifetime of the process.

mod sweeper;

pub use sweeper::spawn_sweeper;
