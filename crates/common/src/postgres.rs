mod client;
mod config;
mod gateway_repository;
mod migrate;
mod organization_repository;

pub use client::*;
pub use config::*;
pub use gateway_repository::*;
pub use migrate::*;
pub use organization_repository::*;
