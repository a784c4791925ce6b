// Protected handlers: bearer JWT plus a verified family member.
// Every handler here receives `CurrentUser` from the middleware stack.

pub mod calendar;
pub mod connections;
pub mod events;
pub mod polls;
pub mod reminders;
pub mod sharing;
pub mod templates;
