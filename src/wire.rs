use serde::Deserialize;
use serde_json::Value;

/// Error envelope returned by the platform on failures.
///
/// `error` is usually a message string; storage jobs nest an object with
/// `message`/`code` instead. Fields are read leniently: a field of an
/// unexpected type is skipped instead of failing the whole envelope.
#[derive(Debug, Default)]
pub struct ErrorEnvelope {
    pub error: Option<Value>,
    pub code: Option<String>,
    pub message: Option<String>,
    pub exception_id: Option<String>,
    pub reason: Option<String>,
    pub estimated_end_time: Option<String>,
}

impl ErrorEnvelope {
    pub fn from_value(value: &Value) -> Self {
        Self {
            error: value.get("error").filter(|error| !error.is_null()).cloned(),
            code: scalar_text(value.get("code")),
            message: string_field(value, "message"),
            exception_id: scalar_text(value.get("exceptionId")),
            reason: string_field(value, "reason"),
            estimated_end_time: string_field(value, "estimatedEndTime"),
        }
    }

    /// Parses a raw body. Anything that is not JSON yields an empty envelope.
    pub fn from_slice(body: &[u8]) -> Self {
        serde_json::from_slice::<Value>(body)
            .map(|value| Self::from_value(&value))
            .unwrap_or_default()
    }

    /// Human-readable message, looking through nested error objects.
    pub fn message(&self) -> Option<String> {
        match &self.error {
            Some(Value::String(message)) => Some(message.clone()),
            Some(Value::Object(inner)) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .or_else(|| self.message.clone()),
            _ => self.message.clone(),
        }
    }

    /// Platform error code, preferring the top-level field.
    pub fn code(&self) -> Option<String> {
        self.code.clone().or_else(|| match &self.error {
            Some(Value::Object(inner)) => scalar_text(inner.get("code")),
            _ => None,
        })
    }

    /// Diagnostic id the platform logs the failure under.
    pub fn exception_id(&self) -> Option<String> {
        self.exception_id.clone().or_else(|| match &self.error {
            Some(Value::Object(inner)) => scalar_text(inner.get("exceptionId")),
            _ => None,
        })
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

// Codes and exception ids show up both as strings and as numbers.
fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
pub struct Ticket {
    pub id: String,
}
