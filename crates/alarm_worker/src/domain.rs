mod alarm_service;
mod notifications;
mod offline_alarm;
mod stats_refresh_service;

pub use alarm_service::*;
pub use notifications::*;
pub use offline_alarm::*;
pub use stats_refresh_service::*;
