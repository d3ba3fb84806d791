// 提示词构建

use crate::errors::VoxdError;
use serde_json::Value;

/// 示例对话生成的系统提示词
pub const EXAMPLE_CONVERSATION_SYSTEM: &str = "You write realistic WhatsApp conversations between a customer \
and a business chatbot. Respond with a single JSON object of the form \
{\"messages\": [{\"role\": \"user\" | \"assistant\", \"content\": string, \"image_prompt\": string (optional)}]}. \
Do not add any text outside the JSON object.";

/// 报价文案的系统提示词
pub const QUOTE_WRITER_SYSTEM: &str = "You are a senior account manager at Voxd, a company that builds \
AI-powered WhatsApp assistants for businesses. Write clear, persuasive and honest copy. \
Use plain text paragraphs without markdown headings.";

/// 示例对话生成参数
#[derive(Debug, Clone)]
pub struct ConversationBrief<'a> {
    pub industry: &'a str,
    pub scenario: &'a str,
    pub language: &'a str,
    pub business_name: Option<&'a str>,
    pub tone: Option<&'a str>,
    pub message_count: i32,
    pub with_images: bool,
}

pub fn example_conversation_prompt(brief: &ConversationBrief<'_>) -> String {
    let mut prompt = format!(
        "Industry: {}\nScenario: {}\nLanguage of the conversation: {}\nNumber of messages: about {}\n",
        brief.industry, brief.scenario, brief.language, brief.message_count
    );

    if let Some(name) = brief.business_name {
        prompt.push_str(&format!("Business name: {}\n", name));
    }
    if let Some(tone) = brief.tone {
        prompt.push_str(&format!("Tone of the assistant: {}\n", tone));
    }

    prompt.push_str(
        "The conversation starts with a user message and alternates between user and assistant.\n",
    );

    if brief.with_images {
        prompt.push_str(
            "For one or two assistant messages where a picture would help, add an \"image_prompt\" \
describing a photo-realistic image in English.\n",
        );
    } else {
        prompt.push_str("Do not include any image_prompt fields.\n");
    }

    prompt
}

/// 报价上下文
#[derive(Debug, Clone)]
pub struct QuoteBrief<'a> {
    pub title: &'a str,
    pub client_name: &'a str,
    pub client_company: Option<&'a str>,
    pub line_items: Vec<String>,
    pub total: String,
}

fn quote_context(brief: &QuoteBrief<'_>) -> String {
    let mut context = format!(
        "Proposal title: {}\nClient: {}\n",
        brief.title, brief.client_name
    );
    if let Some(company) = brief.client_company {
        context.push_str(&format!("Company: {}\n", company));
    }
    context.push_str("Included items:\n");
    for item in &brief.line_items {
        context.push_str(&format!("- {}\n", item));
    }
    context.push_str(&format!("Total: {}\n", brief.total));
    context
}

/// 销售说辞
pub fn quote_pitch_prompt(brief: &QuoteBrief<'_>) -> String {
    format!(
        "{}\nWrite a short sales pitch (120-200 words) addressed to the client that explains \
why this proposal is valuable for their business.",
        quote_context(brief)
    )
}

/// 方案构想
pub fn quote_concept_prompt(brief: &QuoteBrief<'_>) -> String {
    format!(
        "{}\nDescribe the concept of the WhatsApp assistant we will build for this client: \
its main use cases, the tone of voice and how customers will interact with it (200-300 words).",
        quote_context(brief)
    )
}

/// 从模型输出中提取 JSON 对象
///
/// 兼容 ```json 代码块和对象前后夹杂说明文字的情况。
pub fn extract_json(text: &str) -> Result<Value, VoxdError> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let unfenced = strip_code_fence(trimmed);
    if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
        return Ok(value);
    }

    if let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&unfenced[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(VoxdError::ai_service("模型输出不是有效的 JSON"))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // 跳过语言标记所在的第一行
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    body.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_json() {
        let value = extract_json(r#"{"messages": []}"#).unwrap();
        assert!(value["messages"].is_array());
    }

    #[test]
    fn test_extract_fenced_json() {
        let text = "```json\n{\"messages\": [{\"role\": \"user\", \"content\": \"hi\"}]}\n```";
        let value = extract_json(text).unwrap();
        assert_eq!(value["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_extract_json_with_surrounding_text() {
        let text = "Here you go:\n{\"ok\": true}\nHope this helps!";
        assert_eq!(extract_json(text).unwrap()["ok"], true);
    }

    #[test]
    fn test_extract_json_rejects_garbage() {
        assert!(extract_json("no json here").is_err());
    }

    #[test]
    fn test_conversation_prompt_mentions_images_only_when_requested() {
        let mut brief = ConversationBrief {
            industry: "Hospitality",
            scenario: "Table reservation",
            language: "nl",
            business_name: Some("De Gouden Lepel"),
            tone: None,
            message_count: 6,
            with_images: true,
        };
        let prompt = example_conversation_prompt(&brief);
        assert!(prompt.contains("De Gouden Lepel"));
        assert!(prompt.contains("add an \"image_prompt\""));

        brief.with_images = false;
        assert!(example_conversation_prompt(&brief).contains("Do not include any image_prompt"));
    }

    #[test]
    fn test_quote_prompts_include_context() {
        let brief = QuoteBrief {
            title: "Support bot",
            client_name: "Alex",
            client_company: Some("Acme"),
            line_items: vec!["2 x Setup".to_string()],
            total: "EUR 1,210.00".to_string(),
        };
        let pitch = quote_pitch_prompt(&brief);
        assert!(pitch.contains("Acme"));
        assert!(pitch.contains("- 2 x Setup"));
        assert!(quote_concept_prompt(&brief).contains("EUR 1,210.00"));
    }
}
