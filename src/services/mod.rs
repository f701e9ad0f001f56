pub mod analytics;
pub mod device;
pub mod preparation;
pub mod recording;

pub use analytics::{
    EmailDetail, EmailSummary, EngagementAnalyticsService, LinkDetail, RecipientSummary,
};
pub use device::{DeviceInfo, classify_user_agent};
pub use preparation::{
    PrepareRequest, PreparedEmail, RecipientInput, RecipientKind, RecipientPayload,
    TrackingPreparationService,
};
pub use recording::{ClickResolution, EventRecordingService};
