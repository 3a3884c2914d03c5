//! Board drivers and threading helpers.

pub mod button;
pub mod task_pin;
