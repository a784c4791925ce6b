use serde::{de::DeserializeOwned, Serialize};

pub mod connection;
pub mod event;
pub mod exception;
pub mod family;
pub mod fields;
pub mod poll;
pub mod rsvp;
pub mod shared;
pub mod template;
pub mod user;

pub use connection::{ConnectionRequest, FamilyConnection, RequestStatus, SharedFeature};
pub use event::{Event, EventRef, NotificationMethod, Recurrence, RecurrencePattern, ReminderSettings, RsvpSettings};
pub use exception::EventException;
pub use family::Family;
pub use poll::{ChatPoll, PollVote};
pub use rsvp::{EventRsvp, RsvpResponse};
pub use shared::{ItemType, ShareRecord, SharedItem};
pub use template::CalendarTemplate;
pub use user::User;

/// A typed record stored in one row-store table
pub trait Model: Serialize + DeserializeOwned + Send + Sync {
    const TABLE: &'static str;
}
