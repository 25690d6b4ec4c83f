//! Microsoft Graph provider: Outlook calendar events and outbound mail.

pub mod adapter;
pub mod client;
pub mod types;

pub use adapter::MicrosoftGraphAdapter;
pub use client::GraphClient;
