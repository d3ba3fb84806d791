// 实体预导入模块

pub use super::admin_user::{AdminRole, Entity as AdminUser, Model as AdminUserModel};
pub use super::agent::{Entity as Agent, Model as AgentModel};
pub use super::chat_user::{Entity as ChatUser, Model as ChatUserModel};
pub use super::chunk::{Entity as Chunk, Model as ChunkModel};
pub use super::document::{DocumentSourceType, DocumentStatus, Entity as Document, Model as DocumentModel};
pub use super::example_conversation::{
    Entity as ExampleConversation, ExampleStatus, ImagesStatus, Model as ExampleConversationModel,
};
pub use super::message::{Entity as Message, MessageRole, Model as MessageModel};
pub use super::message_template::{Entity as MessageTemplate, Model as MessageTemplateModel};
pub use super::organisation::{Entity as Organisation, Model as OrganisationModel, OrganisationStatus};
pub use super::partner::{Entity as Partner, Model as PartnerModel, PartnerStatus};
pub use super::quote::{Entity as Quote, Model as QuoteModel, QuoteStatus};
pub use super::session::{Entity as Session, Model as SessionModel, SessionStatus};
pub use super::support_ticket::{
    Entity as SupportTicket, Model as SupportTicketModel, TicketPriority, TicketStatus,
};
pub use super::ticket_message::{Entity as TicketMessage, Model as TicketMessageModel};
pub use super::waba::{Entity as Waba, Model as WabaModel, WabaStatus};
pub use super::waba_phone_number::{Entity as WabaPhoneNumber, Model as WabaPhoneNumberModel};
