use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Content {
    pub fn user(part: Part) -> Self {
        Self {
            parts: vec![part],
            role: Some("user".to_string()),
        }
    }

    pub fn model(part: Part) -> Self {
        Self {
            parts: vec![part],
            role: Some("model".to_string()),
        }
    }

    pub fn function(part: Part) -> Self {
        Self {
            parts: vec![part],
            role: Some("function".to_string()),
        }
    }

    pub fn system(text: &str) -> Self {
        Self {
            parts: vec![Part::text(text)],
            role: None,
        }
    }
}

/// A message part: exactly one of the fields is set per the API contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn function_call(call: FunctionCall) -> Self {
        Self {
            function_call: Some(call),
            ..Self::default()
        }
    }

    pub fn function_response(name: impl Into<String>, response: Value) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                name: name.into(),
                response,
            }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    /// JSON schema for the tool arguments, passed through verbatim.
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    pub candidates: Option<Vec<Candidate>>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: Option<u16>,
    pub message: Option<String>,
}

impl GenerateContentResponse {
    /// First text part of the first candidate, if any.
    pub fn text(&self) -> Option<&str> {
        self.parts()?
            .iter()
            .find_map(|p| p.text.as_deref())
            .filter(|t| !t.is_empty())
    }

    /// First function call of the first candidate, if any.
    pub fn function_call(&self) -> Option<&FunctionCall> {
        self.parts()?.iter().find_map(|p| p.function_call.as_ref())
    }

    fn parts(&self) -> Option<&[Part]> {
        let candidate = self.candidates.as_ref()?.first()?;
        Some(&candidate.content.as_ref()?.parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_camel_case_tool_declarations() {
        let request = GenerateContentRequest {
            contents: vec![Content::user(Part::text("câu hỏi"))],
            tools: vec![Tool {
                function_declarations: vec![FunctionDeclaration {
                    name: "lawLookup".into(),
                    description: "tra cứu".into(),
                    parameters: serde_json::json!({"type": "object"}),
                }],
            }],
            system_instruction: Some(Content::system("prompt")),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json["tools"][0]["functionDeclarations"][0]["name"],
            "lawLookup"
        );
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "prompt");
        assert_eq!(json["contents"][0]["role"], "user");
    }

    #[test]
    fn part_skips_unset_fields() {
        let json = serde_json::to_value(Part::text("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"text": "hi"}));

        let json = serde_json::to_value(Part::function_response(
            "lawLookup",
            serde_json::json!({"output": []}),
        ))
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"functionResponse": {"name": "lawLookup", "response": {"output": []}}})
        );
    }

    #[test]
    fn response_accessors_find_text_and_call() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"functionCall": {"name": "lawLookup", "args": {"keywords": "thuế"}}}
                    ]
                }
            }]
        }))
        .unwrap();

        assert!(response.text().is_none());
        let call = response.function_call().unwrap();
        assert_eq!(call.name, "lawLookup");
        assert_eq!(call.args["keywords"], "thuế");
    }

    #[test]
    fn empty_response_has_no_text_or_call() {
        let response: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(response.text().is_none());
        assert!(response.function_call().is_none());
    }
}
