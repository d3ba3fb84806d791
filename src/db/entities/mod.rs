// 数据库实体模块
// 包含所有 SeaORM 实体定义

pub mod partner;
pub mod organisation;
pub mod admin_user;

// 机器人与会话
pub mod agent;
pub mod chat_user;
pub mod session;
pub mod message;

// 知识库
pub mod document;
pub mod chunk;

// 商务与支持
pub mod quote;
pub mod support_ticket;
pub mod ticket_message;

// WhatsApp
pub mod waba;
pub mod waba_phone_number;
pub mod message_template;

pub mod example_conversation;

pub mod prelude;
pub use prelude::*;
