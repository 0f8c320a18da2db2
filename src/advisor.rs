use serde_json::json;
use tracing::{info, warn};

use crate::gemini::client::{GeminiError, ModelClient};
use crate::gemini::types::{
    Content, FunctionDeclaration, GenerateContentRequest, Part, Tool,
};
use crate::lookup::LawSource;

pub const LAW_LOOKUP_TOOL: &str = "lawLookup";

const SYSTEM_PROMPT: &str = "\
Bạn là một chuyên gia pháp luật thuế tại Việt Nam. Nhiệm vụ của bạn là cung cấp \
thông tin chính xác, khách quan và cập nhật về luật thuế Việt Nam dựa trên các \
văn bản pháp luật hiện hành.

Khi người dùng đặt câu hỏi, bạn sẽ:
1. Xác định vấn đề pháp lý thuế mà người dùng muốn tìm hiểu.
2. Tra cứu các quy định pháp luật, thông tư, nghị định, luật liên quan bằng công cụ lawLookup.
3. Trích dẫn chính xác các điều, khoản, điểm của văn bản pháp luật nếu có thể.
4. Giải thích nội dung của quy định đó một cách rõ ràng, dễ hiểu.
5. Luôn ưu tiên các nguồn luật chính thức và mới nhất.
6. Nếu tình huống cần tư vấn chuyên sâu, khuyến nghị người dùng tìm đến luật sư \
hoặc chuyên gia thuế có kinh nghiệm.
7. Trả lời bằng tiếng Việt.
8. KHÔNG đưa ra lời khuyên pháp lý cá nhân hóa. Chỉ cung cấp thông tin dựa trên luật.";

/// A generated answer plus a record of the lookups performed to ground it.
#[derive(Debug)]
pub struct Answer {
    pub text: String,
    pub lookups: Vec<LookupRecord>,
}

#[derive(Debug)]
pub struct LookupRecord {
    pub keywords: String,
    pub documents: usize,
}

/// Drives the question → (optional lawLookup round) → answer flow.
///
/// Generic over the model and the law source so tests can substitute canned
/// responses for both.
pub struct Advisor<M, L> {
    model: M,
    law: L,
}

impl<M: ModelClient, L: LawSource> Advisor<M, L> {
    pub fn new(model: M, law: L) -> Self {
        Self { model, law }
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, GeminiError> {
        let mut contents = vec![Content::user(Part::text(question))];

        let response = self.model.generate(&self.request(&contents)).await?;

        let Some(call) = response.function_call().cloned() else {
            return Ok(Answer {
                text: response.text().unwrap_or_default().to_string(),
                lookups: Vec::new(),
            });
        };

        if call.name != LAW_LOOKUP_TOOL {
            warn!(name = %call.name, "model requested an unknown tool");
            return Ok(Answer {
                text: response.text().unwrap_or_default().to_string(),
                lookups: Vec::new(),
            });
        }

        let keywords = call.args["keywords"].as_str().unwrap_or_default().to_string();
        info!(keywords, "model requested law lookup");

        let outcome = self.law.lookup(&keywords).await;
        let lookups = vec![LookupRecord {
            keywords: keywords.clone(),
            documents: outcome.excerpts.len(),
        }];

        contents.push(Content::model(Part::function_call(call)));
        contents.push(Content::function(Part::function_response(
            LAW_LOOKUP_TOOL,
            json!({ "output": outcome.texts() }),
        )));

        let final_response = self.model.generate(&self.request(&contents)).await?;

        Ok(Answer {
            text: final_response.text().unwrap_or_default().to_string(),
            lookups,
        })
    }

    fn request(&self, contents: &[Content]) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: contents.to_vec(),
            tools: vec![Tool {
                function_declarations: vec![FunctionDeclaration {
                    name: LAW_LOOKUP_TOOL.to_string(),
                    description: "Tra cứu luật Việt Nam hiện hành với từ khóa keywords"
                        .to_string(),
                    parameters: json!({
                        "type": "object",
                        "properties": {
                            "keywords": { "type": "string" }
                        }
                    }),
                }],
            }],
            system_instruction: Some(Content::system(SYSTEM_PROMPT)),
        }
    }
}
