// WhatsApp Business (Meta Graph API) 集成

pub mod client;
pub mod models;

pub use client::*;
pub use models::*;
