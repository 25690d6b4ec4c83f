//! Google Calendar provider.

pub mod adapter;
pub mod client;
pub mod types;

pub use adapter::GoogleCalendarAdapter;
pub use client::GoogleCalendarClient;
