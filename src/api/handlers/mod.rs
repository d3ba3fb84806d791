// API 处理器模块

pub mod admin_user;
pub mod agent;
pub mod auth;
pub mod chat_user;
pub mod conversation;
pub mod document;
pub mod example;
pub mod files;
pub mod lookup;
pub mod organisation;
pub mod partner;
pub mod quote;
pub mod support_ticket;
pub mod waba;

pub use admin_user::configure_admin_user_routes;
pub use agent::configure_agent_routes;
pub use auth::configure_auth_routes;
pub use chat_user::configure_chat_user_routes;
pub use conversation::configure_session_routes;
pub use document::configure_document_routes;
pub use example::configure_example_routes;
pub use files::configure_file_routes;
pub use lookup::configure_lookup_routes;
pub use organisation::configure_organisation_routes;
pub use partner::configure_partner_routes;
pub use quote::{configure_public_quote_routes, configure_quote_routes};
pub use support_ticket::configure_ticket_routes;
pub use waba::configure_waba_routes;
