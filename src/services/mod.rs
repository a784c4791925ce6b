//! Business operations over the row store. Services take the signed-in
//! user, load what they need through typed repositories and return
//! `ApiError`s the handlers pass straight through.

pub mod calendar_service;
pub mod connection_service;
pub mod event_service;
pub mod poll_service;
pub mod sharing_service;
pub mod template_service;

pub use calendar_service::CalendarService;
pub use connection_service::ConnectionService;
pub use event_service::EventService;
pub use poll_service::PollService;
pub use sharing_service::SharingService;
pub use template_service::TemplateService;
