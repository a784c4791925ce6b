// Public handlers: no token required

pub mod health;

pub use health::{health, root};
