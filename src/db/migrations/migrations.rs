// 数据库迁移脚本定义

use super::Migration;

/// 获取所有迁移（按版本排序）
pub fn get_all_migrations() -> Vec<Migration> {
    vec![
        create_partners_table(),
        create_organisations_table(),
        create_admin_users_table(),
        create_waba_tables(),
        create_agents_table(),
        create_conversation_tables(),
        create_knowledge_tables(),
        create_quotes_table(),
        create_support_tables(),
        create_example_conversations_table(),
    ]
}

fn create_partners_table() -> Migration {
    Migration {
        version: "20250101_000001".to_string(),
        name: "create_partners_table".to_string(),
        description: "创建合作伙伴表".to_string(),
        up_sql: r#"
            CREATE TABLE partners (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                name VARCHAR(255) NOT NULL,
                slug VARCHAR(100) NOT NULL UNIQUE,
                email VARCHAR(255),
                phone VARCHAR(50),
                website VARCHAR(255),
                logo_url TEXT,
                commission_rate DOUBLE PRECISION NOT NULL DEFAULT 0
                    CHECK (commission_rate >= 0 AND commission_rate <= 100),
                status VARCHAR(32) NOT NULL DEFAULT 'active',
                notes TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX idx_partners_name ON partners(name);
            CREATE INDEX idx_partners_status ON partners(status);
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS partners;
        "#
        .to_string(),
        dependencies: vec![],
    }
}

fn create_organisations_table() -> Migration {
    Migration {
        version: "20250101_000002".to_string(),
        name: "create_organisations_table".to_string(),
        description: "创建组织表".to_string(),
        up_sql: r#"
            CREATE TABLE organisations (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                partner_id UUID REFERENCES partners(id) ON DELETE RESTRICT,
                name VARCHAR(255) NOT NULL,
                slug VARCHAR(100) NOT NULL UNIQUE,
                contact_email VARCHAR(255),
                contact_phone VARCHAR(50),
                industry VARCHAR(100),
                logo_url TEXT,
                status VARCHAR(32) NOT NULL DEFAULT 'active',
                timezone VARCHAR(64) NOT NULL DEFAULT 'UTC',
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX idx_organisations_partner_id ON organisations(partner_id);
            CREATE INDEX idx_organisations_status ON organisations(status);
            CREATE INDEX idx_organisations_name ON organisations(name);
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS organisations;
        "#
        .to_string(),
        dependencies: vec!["20250101_000001".to_string()],
    }
}

fn create_admin_users_table() -> Migration {
    Migration {
        version: "20250101_000003".to_string(),
        name: "create_admin_users_table".to_string(),
        description: "创建后台管理员表".to_string(),
        up_sql: r#"
            CREATE TABLE admin_users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                email VARCHAR(255) NOT NULL UNIQUE,
                name VARCHAR(255) NOT NULL,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(32) NOT NULL DEFAULT 'admin',
                partner_id UUID REFERENCES partners(id) ON DELETE CASCADE,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                last_login_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                CONSTRAINT chk_admin_users_partner_role
                    CHECK (role <> 'partner' OR partner_id IS NOT NULL)
            );

            CREATE INDEX idx_admin_users_partner_id ON admin_users(partner_id);
            CREATE INDEX idx_admin_users_role ON admin_users(role);
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS admin_users;
        "#
        .to_string(),
        dependencies: vec!["20250101_000001".to_string()],
    }
}

fn create_waba_tables() -> Migration {
    Migration {
        version: "20250101_000004".to_string(),
        name: "create_waba_tables".to_string(),
        description: "创建 WhatsApp 账户、号码和模板表".to_string(),
        up_sql: r#"
            CREATE TABLE wabas (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                organisation_id UUID NOT NULL REFERENCES organisations(id) ON DELETE CASCADE,
                external_id VARCHAR(64) NOT NULL UNIQUE,
                name VARCHAR(255) NOT NULL,
                business_id VARCHAR(64),
                access_token TEXT NOT NULL,
                status VARCHAR(32) NOT NULL DEFAULT 'active',
                webhook_subscribed BOOLEAN NOT NULL DEFAULT FALSE,
                last_synced_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE waba_phone_numbers (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                waba_id UUID NOT NULL REFERENCES wabas(id) ON DELETE CASCADE,
                external_id VARCHAR(64) NOT NULL UNIQUE,
                display_phone_number VARCHAR(32) NOT NULL,
                verified_name VARCHAR(255),
                quality_rating VARCHAR(32),
                verification_status VARCHAR(64),
                is_registered BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE message_templates (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                waba_id UUID NOT NULL REFERENCES wabas(id) ON DELETE CASCADE,
                external_id VARCHAR(64),
                name VARCHAR(512) NOT NULL,
                language VARCHAR(16) NOT NULL,
                category VARCHAR(32) NOT NULL,
                status VARCHAR(32) NOT NULL DEFAULT 'PENDING',
                components JSONB NOT NULL DEFAULT '[]',
                rejected_reason TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                CONSTRAINT uq_message_templates_name_language UNIQUE (waba_id, name, language)
            );

            CREATE INDEX idx_wabas_organisation_id ON wabas(organisation_id);
            CREATE INDEX idx_waba_phone_numbers_waba_id ON waba_phone_numbers(waba_id);
            CREATE INDEX idx_message_templates_waba_id ON message_templates(waba_id);
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS message_templates;
            DROP TABLE IF EXISTS waba_phone_numbers;
            DROP TABLE IF EXISTS wabas;
        "#
        .to_string(),
        dependencies: vec!["20250101_000002".to_string()],
    }
}

fn create_agents_table() -> Migration {
    Migration {
        version: "20250101_000005".to_string(),
        name: "create_agents_table".to_string(),
        description: "创建 Agent 表".to_string(),
        up_sql: r#"
            CREATE TABLE agents (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                organisation_id UUID NOT NULL REFERENCES organisations(id) ON DELETE CASCADE,
                name VARCHAR(255) NOT NULL,
                description TEXT,
                system_prompt TEXT NOT NULL,
                model VARCHAR(100) NOT NULL,
                temperature DOUBLE PRECISION NOT NULL DEFAULT 0.7
                    CHECK (temperature >= 0 AND temperature <= 2),
                max_tokens INTEGER NOT NULL DEFAULT 1024,
                language VARCHAR(16) NOT NULL DEFAULT 'en',
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                waba_phone_number_id UUID REFERENCES waba_phone_numbers(id) ON DELETE SET NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX idx_agents_organisation_id ON agents(organisation_id);
            CREATE INDEX idx_agents_is_active ON agents(is_active);
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS agents;
        "#
        .to_string(),
        dependencies: vec!["20250101_000004".to_string()],
    }
}

fn create_conversation_tables() -> Migration {
    Migration {
        version: "20250101_000006".to_string(),
        name: "create_conversation_tables".to_string(),
        description: "创建聊天用户、会话和消息表".to_string(),
        up_sql: r#"
            CREATE TABLE chat_users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                organisation_id UUID NOT NULL REFERENCES organisations(id) ON DELETE CASCADE,
                phone_number VARCHAR(32) NOT NULL,
                name VARCHAR(255),
                email VARCHAR(255),
                language VARCHAR(16),
                is_blocked BOOLEAN NOT NULL DEFAULT FALSE,
                metadata JSONB NOT NULL DEFAULT '{}',
                last_seen_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                CONSTRAINT uq_chat_users_organisation_phone UNIQUE (organisation_id, phone_number)
            );

            CREATE TABLE sessions (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                organisation_id UUID NOT NULL REFERENCES organisations(id) ON DELETE CASCADE,
                agent_id UUID REFERENCES agents(id) ON DELETE SET NULL,
                chat_user_id UUID NOT NULL REFERENCES chat_users(id) ON DELETE CASCADE,
                status VARCHAR(32) NOT NULL DEFAULT 'active',
                message_count INTEGER NOT NULL DEFAULT 0,
                started_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                ended_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE messages (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                session_id UUID NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                organisation_id UUID NOT NULL REFERENCES organisations(id) ON DELETE CASCADE,
                role VARCHAR(32) NOT NULL,
                content TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX idx_chat_users_organisation_id ON chat_users(organisation_id);
            CREATE INDEX idx_sessions_organisation_id ON sessions(organisation_id);
            CREATE INDEX idx_sessions_chat_user_id ON sessions(chat_user_id);
            CREATE INDEX idx_sessions_started_at ON sessions(started_at);
            CREATE INDEX idx_messages_session_id ON messages(session_id, created_at);
            CREATE INDEX idx_messages_organisation_created ON messages(organisation_id, created_at);
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS messages;
            DROP TABLE IF EXISTS sessions;
            DROP TABLE IF EXISTS chat_users;
        "#
        .to_string(),
        dependencies: vec!["20250101_000005".to_string()],
    }
}

fn create_knowledge_tables() -> Migration {
    Migration {
        version: "20250101_000007".to_string(),
        name: "create_knowledge_tables".to_string(),
        description: "创建知识库文档和分块表".to_string(),
        up_sql: r#"
            CREATE TABLE documents (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                organisation_id UUID NOT NULL REFERENCES organisations(id) ON DELETE CASCADE,
                title VARCHAR(255) NOT NULL,
                source_type VARCHAR(32) NOT NULL DEFAULT 'text',
                source_url TEXT,
                content TEXT NOT NULL,
                status VARCHAR(32) NOT NULL DEFAULT 'pending',
                chunk_count INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE chunks (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                document_id UUID NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                organisation_id UUID NOT NULL REFERENCES organisations(id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                token_count INTEGER NOT NULL DEFAULT 0,
                embedding REAL[],
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX idx_documents_organisation_id ON documents(organisation_id);
            CREATE INDEX idx_chunks_document_id ON chunks(document_id, chunk_index);
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS chunks;
            DROP TABLE IF EXISTS documents;
        "#
        .to_string(),
        dependencies: vec!["20250101_000002".to_string()],
    }
}

fn create_quotes_table() -> Migration {
    Migration {
        version: "20250101_000008".to_string(),
        name: "create_quotes_table".to_string(),
        description: "创建报价单表".to_string(),
        up_sql: r#"
            CREATE TABLE quotes (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                partner_id UUID REFERENCES partners(id) ON DELETE SET NULL,
                organisation_id UUID REFERENCES organisations(id) ON DELETE SET NULL,
                quote_number VARCHAR(32) NOT NULL UNIQUE,
                public_token VARCHAR(64) NOT NULL UNIQUE,
                title VARCHAR(255) NOT NULL,
                client_name VARCHAR(255) NOT NULL,
                client_email VARCHAR(255),
                client_company VARCHAR(255),
                currency VARCHAR(3) NOT NULL DEFAULT 'EUR',
                line_items JSONB NOT NULL DEFAULT '[]',
                subtotal_cents BIGINT NOT NULL DEFAULT 0,
                discount_cents BIGINT NOT NULL DEFAULT 0,
                tax_rate_bps INTEGER NOT NULL DEFAULT 0,
                tax_cents BIGINT NOT NULL DEFAULT 0,
                total_cents BIGINT NOT NULL DEFAULT 0,
                status VARCHAR(32) NOT NULL DEFAULT 'draft',
                valid_until TIMESTAMPTZ,
                notes TEXT,
                terms TEXT,
                pitch TEXT,
                concept TEXT,
                sent_at TIMESTAMPTZ,
                viewed_at TIMESTAMPTZ,
                responded_at TIMESTAMPTZ,
                response_note TEXT,
                created_by UUID REFERENCES admin_users(id) ON DELETE SET NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                CONSTRAINT chk_quotes_discount CHECK (discount_cents >= 0 AND discount_cents <= subtotal_cents)
            );

            CREATE INDEX idx_quotes_partner_id ON quotes(partner_id);
            CREATE INDEX idx_quotes_status ON quotes(status);
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS quotes;
        "#
        .to_string(),
        dependencies: vec!["20250101_000003".to_string()],
    }
}

fn create_support_tables() -> Migration {
    Migration {
        version: "20250101_000009".to_string(),
        name: "create_support_tables".to_string(),
        description: "创建支持工单和工单消息表".to_string(),
        up_sql: r#"
            CREATE SEQUENCE support_ticket_number_seq START 1;

            CREATE TABLE support_tickets (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                ticket_number VARCHAR(32) NOT NULL UNIQUE,
                organisation_id UUID NOT NULL REFERENCES organisations(id) ON DELETE CASCADE,
                partner_id UUID REFERENCES partners(id) ON DELETE SET NULL,
                subject VARCHAR(255) NOT NULL,
                description TEXT NOT NULL,
                status VARCHAR(32) NOT NULL DEFAULT 'open',
                priority VARCHAR(32) NOT NULL DEFAULT 'normal',
                category VARCHAR(64),
                assigned_to UUID REFERENCES admin_users(id) ON DELETE SET NULL,
                created_by UUID REFERENCES admin_users(id) ON DELETE SET NULL,
                resolved_at TIMESTAMPTZ,
                closed_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE ticket_messages (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                ticket_id UUID NOT NULL REFERENCES support_tickets(id) ON DELETE CASCADE,
                author_id UUID REFERENCES admin_users(id) ON DELETE SET NULL,
                body TEXT NOT NULL,
                is_internal BOOLEAN NOT NULL DEFAULT FALSE,
                mentions JSONB NOT NULL DEFAULT '[]',
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX idx_support_tickets_organisation_id ON support_tickets(organisation_id);
            CREATE INDEX idx_support_tickets_partner_id ON support_tickets(partner_id);
            CREATE INDEX idx_support_tickets_status ON support_tickets(status);
            CREATE INDEX idx_ticket_messages_ticket_id ON ticket_messages(ticket_id, created_at);
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS ticket_messages;
            DROP TABLE IF EXISTS support_tickets;
            DROP SEQUENCE IF EXISTS support_ticket_number_seq;
        "#
        .to_string(),
        dependencies: vec!["20250101_000003".to_string()],
    }
}

fn create_example_conversations_table() -> Migration {
    Migration {
        version: "20250101_000010".to_string(),
        name: "create_example_conversations_table".to_string(),
        description: "创建示例对话表".to_string(),
        up_sql: r#"
            CREATE TABLE example_conversations (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                partner_id UUID REFERENCES partners(id) ON DELETE CASCADE,
                title VARCHAR(255) NOT NULL,
                industry VARCHAR(100) NOT NULL,
                scenario TEXT NOT NULL,
                language VARCHAR(16) NOT NULL DEFAULT 'en',
                business_name VARCHAR(255),
                tone VARCHAR(64),
                target_message_count INTEGER NOT NULL DEFAULT 8,
                messages JSONB NOT NULL DEFAULT '[]',
                status VARCHAR(32) NOT NULL DEFAULT 'draft',
                error_message TEXT,
                images_status VARCHAR(32) NOT NULL DEFAULT 'none',
                image_count INTEGER NOT NULL DEFAULT 0,
                created_by UUID REFERENCES admin_users(id) ON DELETE SET NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX idx_example_conversations_partner_id ON example_conversations(partner_id);
        "#
        .to_string(),
        down_sql: r#"
            DROP TABLE IF EXISTS example_conversations;
        "#
        .to_string(),
        dependencies: vec!["20250101_000003".to_string()],
    }
}
