use serde::{Deserialize, Serialize};

/// Sampling options forwarded to the oracle untouched
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f32,
}

/// What a tool asks the oracle for. The model is supplied by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub options: Option<GenerationOptions>,
    /// Output format constraint, e.g. `"json"` for plan requests
    pub format: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            options: None,
            format: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.options = Some(GenerationOptions { temperature });
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Builds the wire body for `model`.
    pub fn body<'a>(&'a self, model: &'a str) -> GenerateBody<'a> {
        GenerateBody {
            model,
            prompt: &self.prompt,
            stream: false,
            options: self.options,
            format: self.format.as_deref(),
        }
    }
}

/// Body of a `POST /api/generate` call
#[derive(Debug, Serialize)]
pub struct GenerateBody<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerationOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<&'a str>,
}

/// Body of a `GET /api/tags` reply
#[derive(Debug, Deserialize)]
pub struct ModelTags {
    #[serde(default)]
    pub models: Vec<ListedModel>,
}

#[derive(Debug, Deserialize)]
pub struct ListedModel {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_omits_unset_options() {
        let request = GenerationRequest::new("hello");
        let body = serde_json::to_value(request.body("llama3")).unwrap();
        assert_eq!(
            body,
            json!({"model": "llama3", "prompt": "hello", "stream": false})
        );
    }

    #[test]
    fn body_carries_options_and_format() {
        let request = GenerationRequest::new("plan")
            .with_temperature(0.5)
            .with_format("json");
        let body = serde_json::to_value(request.body("qwen")).unwrap();
        assert_eq!(body["options"]["temperature"], json!(0.5));
        assert_eq!(body["format"], json!("json"));
        assert_eq!(body["stream"], json!(false));
    }
}
