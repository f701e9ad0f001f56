pub mod health;
pub mod tracking;

pub use health::{HealthService, health_routes};
pub use tracking::{TrackingService, tracking_routes};
