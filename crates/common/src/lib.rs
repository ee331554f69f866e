pub mod chirpstack;
pub mod domain;
pub mod mail;
pub mod postgres;
pub mod telemetry;

pub use chirpstack::*;
pub use domain::*;
pub use mail::*;
pub use postgres::*;
pub use telemetry::*;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockGatewayRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockMailSender;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockNetworkServerClient;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockOrganizationAccessChecker;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockOrganizationRepository;
