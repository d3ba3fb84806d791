// API 路由定义

use actix_web::{web, HttpResponse, Result as ActixResult};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{
    admin_user, agent, auth, chat_user, conversation, document, example, lookup, organisation,
    partner, quote, support_ticket, waba,
};
use crate::health;

/// API 文档聚合
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Voxd Admin API",
        description = "WhatsApp AI 机器人平台后台管理接口",
        version = "1.0.0"
    ),
    servers((url = "/api/v1", description = "API v1")),
    paths(
        health::health_check,
        auth::login,
        auth::me,
        admin_user::list_admin_users,
        admin_user::get_admin_user,
        admin_user::create_admin_user,
        admin_user::update_admin_user,
        admin_user::set_admin_user_active,
        admin_user::delete_admin_user,
        partner::list_partners,
        partner::export_partners,
        partner::get_partner,
        partner::create_partner,
        partner::update_partner,
        partner::delete_partner,
        partner::upload_partner_logo,
        organisation::list_organisations,
        organisation::export_organisations,
        organisation::get_organisation,
        organisation::create_organisation,
        organisation::update_organisation,
        organisation::delete_organisation,
        organisation::upload_organisation_logo,
        agent::list_agents,
        agent::create_agent,
        agent::get_agent,
        agent::update_agent,
        agent::toggle_agent,
        agent::delete_agent,
        chat_user::list_chat_users,
        chat_user::export_chat_users,
        chat_user::create_chat_user,
        chat_user::get_chat_user,
        chat_user::update_chat_user,
        chat_user::delete_chat_user,
        conversation::list_sessions,
        conversation::get_transcript,
        document::list_documents,
        document::create_document,
        document::get_document,
        document::update_document,
        document::delete_document,
        document::chunk_document,
        document::list_chunks,
        document::create_chunk,
        document::update_chunk,
        document::delete_chunk,
        waba::list_wabas,
        waba::create_waba,
        waba::get_waba,
        waba::update_waba,
        waba::delete_waba,
        waba::sync_waba,
        waba::subscribe_waba,
        waba::list_phone_numbers,
        waba::register_phone_number,
        waba::list_templates,
        waba::create_template,
        waba::delete_template,
        example::list_examples,
        example::get_example,
        example::get_example_status,
        example::create_example,
        example::update_example,
        example::delete_example,
        example::generate_example,
        example::generate_example_images,
        quote::list_quotes,
        quote::export_quotes,
        quote::get_quote,
        quote::create_quote,
        quote::update_quote,
        quote::delete_quote,
        quote::send_quote,
        quote::generate_pitch,
        quote::generate_concept,
        quote::public_quote,
        quote::accept_quote,
        quote::decline_quote,
        support_ticket::list_tickets,
        support_ticket::export_tickets,
        support_ticket::get_ticket,
        support_ticket::create_ticket,
        support_ticket::update_ticket,
        support_ticket::change_ticket_status,
        support_ticket::assign_ticket,
        support_ticket::delete_ticket,
        support_ticket::list_ticket_messages,
        support_ticket::add_ticket_message,
        lookup::search_mentions,
        lookup::list_options,
        lookup::dashboard_stats,
    ),
    components(schemas(
        voxd_common::SortOrder,
        voxd_common::SelectOption,
        health::HealthResponse,
        crate::db::entities::AdminRole,
        crate::db::entities::PartnerStatus,
        crate::db::entities::OrganisationStatus,
        crate::db::entities::QuoteStatus,
        crate::services::auth::LoginRequest,
        crate::services::auth::LoginResponse,
        crate::services::admin_user::AdminUserResponse,
        crate::services::admin_user::CreateAdminUserRequest,
        crate::services::admin_user::UpdateAdminUserRequest,
        admin_user::SetActiveRequest,
        crate::services::partner::CreatePartnerRequest,
        crate::services::partner::UpdatePartnerRequest,
        crate::services::organisation::CreateOrganisationRequest,
        crate::services::organisation::UpdateOrganisationRequest,
        crate::services::agent::CreateAgentRequest,
        crate::services::agent::UpdateAgentRequest,
        crate::services::chat_user::CreateChatUserRequest,
        crate::services::chat_user::UpdateChatUserRequest,
        crate::services::conversation::Transcript,
        crate::services::document::CreateDocumentRequest,
        crate::services::document::UpdateDocumentRequest,
        crate::services::document::ChunkRequest,
        crate::services::document::ChunkingReport,
        crate::services::waba::CreateWabaRequest,
        crate::services::waba::UpdateWabaRequest,
        crate::services::waba::RegisterPhoneRequest,
        crate::services::waba::CreateTemplateRequest,
        crate::services::waba::WabaResponse,
        crate::services::waba::SyncSection,
        crate::services::waba::SyncReport,
        crate::services::example::ExampleMessage,
        crate::services::example::CreateExampleRequest,
        crate::services::example::UpdateExampleRequest,
        crate::services::example::GenerateRequest,
        crate::services::example::ExampleStatusView,
        crate::services::quote::LineItem,
        crate::services::quote::CreateQuoteRequest,
        crate::services::quote::UpdateQuoteRequest,
        crate::services::quote::QuoteResponseRequest,
        crate::services::quote::QuoteResponse,
        crate::services::quote::PublicQuoteView,
        crate::services::support_ticket::CreateTicketRequest,
        crate::services::support_ticket::UpdateTicketRequest,
        crate::services::support_ticket::ChangeStatusRequest,
        crate::services::support_ticket::AssignTicketRequest,
        crate::services::support_ticket::AddMessageRequest,
        crate::services::support_ticket::TicketMessageResponse,
        crate::services::mention::MentionCandidate,
        crate::services::dashboard::DailyCount,
        crate::services::dashboard::QuoteStatusCount,
        crate::services::dashboard::DashboardStats,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "健康检查"),
        (name = "Auth", description = "登录和当前管理员"),
        (name = "Admin User", description = "管理员账号"),
        (name = "Partner", description = "合作伙伴"),
        (name = "Organisation", description = "组织"),
        (name = "Agent", description = "AI 机器人"),
        (name = "Chat User", description = "WhatsApp 聊天用户"),
        (name = "Conversation", description = "会话记录"),
        (name = "Document", description = "知识库文档和分块"),
        (name = "WABA", description = "WhatsApp Business 账号、号码和模板"),
        (name = "Example", description = "示例对话生成"),
        (name = "Quote", description = "报价单"),
        (name = "Public Quote", description = "客户公开报价页面"),
        (name = "Support Ticket", description = "支持工单"),
        (name = "Lookup", description = "提及搜索、下拉选项和仪表盘"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// 获取 OpenAPI 规范
async fn get_openapi_spec() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(ApiDoc::openapi()))
}

/// 配置 API 路由
///
/// 导出等固定路径必须在 `{id}` 路径之前注册。
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/openapi.json", web::get().to(get_openapi_spec))
            .configure(health::configure_health_routes)
            .configure(auth::configure_auth_routes)
            .configure(admin_user::configure_admin_user_routes)
            .configure(partner::configure_partner_routes)
            .configure(organisation::configure_organisation_routes)
            .configure(agent::configure_agent_routes)
            .configure(chat_user::configure_chat_user_routes)
            .configure(conversation::configure_session_routes)
            .configure(document::configure_document_routes)
            .configure(waba::configure_waba_routes)
            .configure(example::configure_example_routes)
            .configure(quote::configure_quote_routes)
            .configure(quote::configure_public_quote_routes)
            .configure(support_ticket::configure_ticket_routes)
            .configure(lookup::configure_lookup_routes),
    );
}

/// 配置 Swagger UI
pub fn configure_swagger_ui(cfg: &mut web::ServiceConfig) {
    cfg.service(
        utoipa_swagger_ui::SwaggerUi::new("/api/v1/docs/{_:.*}")
            .url("/api/v1/openapi.json", ApiDoc::openapi()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_has_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_openapi_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/auth/login",
            "/partners/export",
            "/organisations/{id}/agents",
            "/wabas/{id}/sync",
            "/examples/{id}/generate-images",
            "/public/quotes/{token}/accept",
            "/tickets/{id}/messages",
            "/options/{resource}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_response_bodies_are_registered_schemas() {
        // 响应体按名字引用组件
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        for name in [
            "AdminUserResponse",
            "LoginResponse",
            "Transcript",
            "ChunkingReport",
            "ExampleStatusView",
            "SelectOption",
            "DashboardStats",
            "MentionCandidate",
        ] {
            assert!(components.schemas.contains_key(name), "missing schema {}", name);
        }
    }
}
