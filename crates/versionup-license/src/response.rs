use serde::Deserialize;
use serde_json::Value;

const INVALID_PREFIX: &str = "Invalid purchase code.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResponse {
    pub valid: bool,
    pub message: String,
    pub license_code: Option<String>,
}

impl ValidationResponse {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
            license_code: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawValidation {
    valid: Option<Value>,
    message: Option<Value>,
    license_code: Option<Value>,
}

/// Parses a validation body, never failing.
///
/// Bodies that are not JSON, or lack `valid`/`message`, become a synthetic
/// `valid = false` response.
pub fn parse_validation_response(body: &str) -> ValidationResponse {
    let value = match serde_json::from_str::<Value>(body) {
        Ok(value) => value,
        Err(_) => {
            let detail = strip_tags(body);
            return ValidationResponse::rejected(
                format!("{INVALID_PREFIX} {}", detail.trim())
                    .trim_end()
                    .to_string(),
            );
        }
    };

    let incorrect_format =
        || ValidationResponse::rejected(format!("{INVALID_PREFIX} Incorrect data format."));
    if !value.is_object() {
        return incorrect_format();
    }
    let Ok(raw) = serde_json::from_value::<RawValidation>(value) else {
        return incorrect_format();
    };
    let (Some(valid), Some(message)) = (
        raw.valid.filter(|value| !value.is_null()),
        raw.message.filter(|value| !value.is_null()),
    ) else {
        return incorrect_format();
    };

    ValidationResponse {
        valid: is_truthy(&valid),
        message: scalar_text(&message),
        license_code: raw
            .license_code
            .filter(|value| !value.is_null())
            .map(|value| scalar_text(&value)),
    }
}

/// Loose `== true` comparison as the validation endpoint's own clients do it:
/// non-empty strings other than `"0"` and non-empty arrays count as true.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty() && text != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn strip_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}
