pub mod email;
pub mod link;
pub mod link_recipient;
pub mod recipient;
pub mod tracking_event;

pub use email::Entity as EmailEntity;
pub use link::Entity as LinkEntity;
pub use link_recipient::Entity as LinkRecipientEntity;
pub use recipient::Entity as RecipientEntity;
pub use tracking_event::Entity as TrackingEventEntity;
