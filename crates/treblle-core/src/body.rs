//! Shaping of captured request and response bodies.

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::mask::{FieldsToMask, mask_in_place};
use crate::schema::ErrorRecord;

/// Response body as handed over by a framework integration.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseBody {
    /// No body was produced, or it was not captured.
    #[default]
    Empty,
    /// Already structured body.
    Json(Value),
    /// Textual body, expected to contain JSON.
    Text(String),
    /// Raw bytes, decoded as UTF-8 text before parsing.
    Binary(Bytes),
}

impl From<Value> for ResponseBody {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for ResponseBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            Self::Empty
        } else {
            Self::Binary(bytes)
        }
    }
}

/// Masked response body, or the error explaining why it is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponsePayload {
    pub payload: Option<Value>,
    pub error: Option<ErrorRecord>,
}

/// Parses and masks a response body.
///
/// Binary bodies are decoded as (lossy) UTF-8 text first. Text that is not
/// valid JSON yields no payload and an `INVALID_JSON` error record. An empty
/// body yields neither.
pub fn response_payload(body: ResponseBody, fields: &FieldsToMask) -> ResponsePayload {
    let text = match body {
        ResponseBody::Empty => return ResponsePayload::default(),
        ResponseBody::Json(mut value) => {
            mask_in_place(&mut value, fields);
            return ResponsePayload {
                payload: Some(value),
                error: None,
            };
        }
        ResponseBody::Text(text) => text,
        ResponseBody::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(mut value) => {
            mask_in_place(&mut value, fields);
            ResponsePayload {
                payload: Some(value),
                error: None,
            }
        }
        Err(_) => ResponsePayload {
            payload: None,
            error: Some(ErrorRecord::invalid_json()),
        },
    }
}

/// Builds the recorded (unmasked) request body.
///
/// JSON and `application/x-www-form-urlencoded` bodies are parsed; query
/// parameters are merged over the body's top-level keys. A JSON body that is
/// not an object is kept as-is only when there is no query string. Bodies
/// that cannot be parsed contribute nothing.
pub fn request_payload(body: &[u8], content_type: Option<&str>, query: Option<&str>) -> Value {
    let parsed = parse_request_body(body, content_type);
    let query = query.filter(|query| !query.is_empty()).map(parse_form);

    match (parsed, query) {
        (Some(Value::Object(mut map)), Some(query)) => {
            map.extend(query);
            Value::Object(map)
        }
        (Some(body), None) => body,
        (_, Some(query)) => Value::Object(query),
        (None, None) => Value::Object(Map::new()),
    }
}

fn parse_request_body(body: &[u8], content_type: Option<&str>) -> Option<Value> {
    if body.is_empty() {
        return None;
    }

    let is_form = content_type
        .is_some_and(|content_type| content_type.starts_with("application/x-www-form-urlencoded"));
    if is_form {
        return std::str::from_utf8(body)
            .ok()
            .map(|form| Value::Object(parse_form(form)));
    }

    serde_json::from_slice(body).ok()
}

/// Parses `a=1&b=2&a=3` into an object; repeated keys become arrays.
fn parse_form(input: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(input.as_bytes()) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_binary_body_is_decoded_before_parsing() {
        let body = ResponseBody::from(Bytes::from_static(br#"{"password":"x","ok":true}"#));

        let result = response_payload(body, &FieldsToMask::default());
        assert_eq!(result.payload, Some(json!({"password": "*****", "ok": true})));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_invalid_text_body_records_single_error() {
        let body = ResponseBody::from("<html>oops</html>".to_owned());

        let result = response_payload(body, &FieldsToMask::default());
        assert!(result.payload.is_none());
        assert_eq!(result.error, Some(ErrorRecord::invalid_json()));
    }

    #[test]
    fn test_invalid_utf8_binary_body_records_error() {
        let body = ResponseBody::Binary(Bytes::from_static(&[0xff, 0xfe, 0x00]));

        let result = response_payload(body, &FieldsToMask::default());
        assert!(result.payload.is_none());
        assert!(result.error.is_some_and(|error| error.is_invalid_json()));
    }

    #[test]
    fn test_structured_body_is_masked_directly() {
        let body = ResponseBody::from(json!([{"ssn": "123"}, {"name": "ada"}]));

        let result = response_payload(body, &FieldsToMask::default());
        assert_eq!(result.payload, Some(json!([{"ssn": "*****"}, {"name": "ada"}])));
    }

    #[test]
    fn test_empty_body_has_no_payload_and_no_error() {
        let result = response_payload(
            ResponseBody::from(Bytes::new()),
            &FieldsToMask::default(),
        );
        assert_eq!(result, ResponsePayload::default());
    }

    #[test]
    fn test_request_body_merges_query() {
        let body = br#"{"user":"a","page":"1"}"#;

        let payload = request_payload(body, Some("application/json"), Some("page=2&sort=asc"));
        assert_eq!(payload, json!({"user": "a", "page": "2", "sort": "asc"}));
    }

    #[test]
    fn test_request_form_body_with_repeated_keys() {
        let payload = request_payload(
            b"tag=a&tag=b&name=ada+lovelace",
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            None,
        );
        assert_eq!(payload, json!({"tag": ["a", "b"], "name": "ada lovelace"}));
    }

    #[test]
    fn test_request_without_body_records_query_only() {
        assert_eq!(request_payload(b"", None, Some("q=rust")), json!({"q": "rust"}));
        assert_eq!(request_payload(b"", None, None), json!({}));
        assert_eq!(request_payload(b"not json", Some("text/plain"), None), json!({}));
    }

    #[test]
    fn test_request_non_object_json_body() {
        assert_eq!(request_payload(b"[1,2]", None, None), json!([1, 2]));
        assert_eq!(request_payload(b"[1,2]", None, Some("a=1")), json!({"a": "1"}));
    }
}
