mod auth;
mod gateway;
mod gateway_stats;
mod mail;
mod network_server;
mod organization;
mod result;
mod tags;

pub use auth::*;
pub use gateway::*;
pub use gateway_stats::*;
pub use mail::*;
pub use network_server::*;
pub use organization::*;
pub use result::*;
pub use tags::*;
