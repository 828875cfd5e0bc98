use crate::{
    retry::retry_after, transport::HttpResponse, wire::ErrorEnvelope, ResponseBody,
    StorageApiError, TransportError,
};

const MAX_ERROR_BODY_CHARS: usize = 1000;

/// Parses a success body: JSON when possible, otherwise the raw bytes unchanged.
pub(crate) fn decode_body(body: Vec<u8>) -> ResponseBody {
    if body.iter().all(u8::is_ascii_whitespace) {
        return ResponseBody::Json(serde_json::Value::Null);
    }
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(value) => ResponseBody::Json(value),
        Err(_) => ResponseBody::Raw(body),
    }
}

/// Detects a platform error carried by a successful transport response.
///
/// Only a JSON object with a non-null `error` field qualifies. Its other
/// fields are read best-effort and never decide the outcome.
pub(crate) fn application_error(url: &str, body: &ResponseBody) -> Option<StorageApiError> {
    let value = body.as_json()?;
    if !value.get("error").is_some_and(|error| !error.is_null()) {
        return None;
    }
    let envelope = ErrorEnvelope::from_value(value);
    Some(StorageApiError::Application {
        url: url.to_owned(),
        code: envelope.code(),
        message: envelope
            .message()
            .unwrap_or_else(|| "unknown application error".to_owned()),
        exception_id: envelope.exception_id(),
        body: truncate(&value.to_string()),
    })
}

pub(crate) fn http_error(url: &str, response: &HttpResponse) -> StorageApiError {
    let envelope = ErrorEnvelope::from_slice(&response.body);
    StorageApiError::Http {
        status: response.status,
        url: url.to_owned(),
        code: envelope.code(),
        message: envelope.message(),
        exception_id: envelope.exception_id(),
        body: truncate(&response.body_text()),
    }
}

pub(crate) fn maintenance_error(response: &HttpResponse) -> StorageApiError {
    let envelope = ErrorEnvelope::from_slice(&response.body);
    StorageApiError::Maintenance {
        reason: envelope
            .reason
            .clone()
            .or_else(|| envelope.message())
            .unwrap_or_else(|| "platform is in maintenance mode".to_owned()),
        retry_after: retry_after(response),
        estimated_end_time: envelope.estimated_end_time,
    }
}

pub(crate) fn transport_error(url: &str, source: TransportError) -> StorageApiError {
    StorageApiError::Transport {
        url: url.to_owned(),
        source,
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_ERROR_BODY_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_owned(),
    }
}
