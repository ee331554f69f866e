pub mod alarm_worker;
pub mod domain;

pub use alarm_worker::*;
pub use domain::*;
