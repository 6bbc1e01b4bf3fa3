use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use photoedit_contracts::{EditorError, EditorResult};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};

use super::{truncate_text, EditRequest, EditResponse, ImageEditProvider};
use crate::config::EditorConfig;
use crate::raster::RasterBuffer;

pub struct GeminiProvider {
    api_base: String,
    api_key: Option<String>,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(config: &EditorConfig) -> Self {
        // The edit call runs to completion or failure; no client-side timeout.
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        Self::with_client(config, http)
    }

    pub fn with_client(config: &EditorConfig, http: HttpClient) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http,
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn build_payload(request: &EditRequest) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": "image/png",
                            "data": request.image.to_base64(),
                        }
                    },
                    { "text": request.instruction },
                ],
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
            },
        })
    }

    fn response_json_or_error(response: HttpResponse) -> EditorResult<Value> {
        let status = response.status();
        let code = status.as_u16();
        let body = response.text().map_err(|err| {
            EditorError::transport(format!(
                "Gemini response body read failed: {}",
                error_chain_text(&err.without_url())
            ))
        })?;
        if !status.is_success() {
            return Err(EditorError::transport(format!(
                "Gemini request failed ({code}): {}",
                truncate_text(&body, 512)
            )));
        }
        serde_json::from_str(&body).map_err(|err| {
            EditorError::empty_response(format!("Gemini returned invalid JSON payload: {err}"))
        })
    }

    /// Returns the first inline image part of the first candidate.
    fn extract_image(response_payload: &Value) -> EditorResult<RasterBuffer> {
        let parts: Vec<&Value> = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .collect();

        if parts.is_empty() {
            let reason = response_payload
                .get("promptFeedback")
                .and_then(|feedback| feedback.get("blockReason"))
                .and_then(Value::as_str)
                .map(|reason| format!("No image generated (blocked: {reason})."))
                .unwrap_or_else(|| "No image generated.".to_string());
            return Err(EditorError::empty_response(reason));
        }

        for part in &parts {
            let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let bytes = BASE64.decode(data.as_bytes()).map_err(|err| {
                EditorError::empty_response(format!("Gemini image base64 decode failed: {err}"))
            })?;
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            return Ok(RasterBuffer::new(bytes, mime_type));
        }

        let text = parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect::<Vec<&str>>()
            .join(" ");
        if text.trim().is_empty() {
            return Err(EditorError::empty_response(
                "Unexpected response format from Gemini.",
            ));
        }
        Err(EditorError::empty_response(format!(
            "Unexpected response format from Gemini: {}",
            truncate_text(text.trim(), 240)
        )))
    }
}

impl ImageEditProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn edit(&self, request: &EditRequest) -> EditorResult<EditResponse> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(EditorError::MissingCredential(
                "set GEMINI_API_KEY, GOOGLE_API_KEY or API_KEY".to_string(),
            ));
        };
        let endpoint = self.endpoint_for_model(&request.model);
        let payload = Self::build_payload(request);

        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key)])
            .json(&payload)
            .send()
            .map_err(|err| {
                EditorError::transport(format!(
                    "Gemini request failed ({endpoint}): {}",
                    error_chain_text(&err.without_url())
                ))
            })?;
        let response_payload = Self::response_json_or_error(response)?;
        let image = Self::extract_image(&response_payload)?;

        let mut provider_request = Map::new();
        provider_request.insert("endpoint".to_string(), Value::String(endpoint));
        provider_request.insert("model".to_string(), Value::String(request.model.clone()));
        provider_request.insert(
            "image_bytes".to_string(),
            Value::from(request.image.len() as u64),
        );
        provider_request.insert(
            "usage_metadata".to_string(),
            response_payload
                .get("usageMetadata")
                .cloned()
                .unwrap_or(Value::Null),
        );

        Ok(EditResponse {
            image,
            provider_request,
            warnings: Vec::new(),
        })
    }
}

fn error_chain_text(err: &dyn std::error::Error) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut current: Option<&dyn std::error::Error> = Some(err);
    while let Some(cause) = current {
        let text = cause.to_string();
        let trimmed = text.trim();
        if !trimmed.is_empty() && parts.last().map(String::as_str) != Some(trimmed) {
            parts.push(trimmed.to_string());
        }
        current = cause.source();
    }
    truncate_text(&parts.join(" | caused by: "), 512)
}
