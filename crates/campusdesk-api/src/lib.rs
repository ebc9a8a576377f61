pub mod admin;
pub mod announcements;
pub mod auth;
pub mod error;
pub mod faqs;
pub mod middleware;
pub mod profile;
pub mod tickets;

pub use auth::{AppState, AppStateInner};
