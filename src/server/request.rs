use hyper::{body::HttpBody, Body};
use serde_json::Value;
use url::form_urlencoded;

use crate::error::CheckError;

/// Form and JSON field names accepted for the candidate list.
const LIST_FIELDS: [&str; 2] = ["proxies", "proxyList"];

/// `ip` and `port` from a query string. Empty values count as absent.
pub fn check_params(query: Option<&str>) -> Result<(String, String), CheckError> {
    let mut ip = None;
    let mut port = None;
    for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        let value = value.trim().to_string();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "ip" => ip = Some(value),
            "port" => port = Some(value),
            _ => {}
        }
    }
    let ip = ip.ok_or(CheckError::MissingParameter("ip"))?;
    let port = port.ok_or(CheckError::MissingParameter("port"))?;
    Ok((ip, port))
}

/// Buffers a request body, giving up as soon as it grows past `limit` bytes.
pub async fn read_body(mut body: Body, limit: usize) -> Result<Vec<u8>, CheckError> {
    if body.size_hint().lower() > limit as u64 {
        return Err(CheckError::PayloadTooLarge(limit));
    }
    let mut buffer = Vec::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk
            .map_err(|err| CheckError::InvalidFormat(format!("unable to read request body: {}", err)))?;
        if buffer.len() + chunk.len() > limit {
            return Err(CheckError::PayloadTooLarge(limit));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer)
}

/// Extracts the raw candidate entries from a batch request body. A JSON or form
/// content type is honoured, and `text/*` is always read as a delimited text list.
/// Without a recognised content type, a body opening with `{` or `[` is tried as JSON.
pub fn batch_entries(content_type: Option<&str>, body: &[u8]) -> Result<Vec<String>, CheckError> {
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();

    let entries = if content_type.contains("json") {
        json_entries(trimmed)?
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        form_urlencoded::parse(trimmed.as_bytes())
            .filter(|(key, _)| LIST_FIELDS.contains(&key.as_ref()))
            .map(|(_, value)| value.into_owned())
            .collect()
    } else if !content_type.starts_with("text/")
        && (trimmed.starts_with('{') || trimmed.starts_with('['))
    {
        json_entries(trimmed)?
    } else {
        vec![trimmed.to_string()]
    };

    let entries: Vec<String> = entries
        .into_iter()
        .filter(|entry| !entry.trim().is_empty())
        .collect();
    if entries.is_empty() {
        return Err(CheckError::MissingParameter("proxies"));
    }
    Ok(entries)
}

fn json_entries(text: &str) -> Result<Vec<String>, CheckError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| CheckError::InvalidFormat(format!("request body is not valid JSON: {}", err)))?;
    let list = match value {
        Value::Object(mut object) => LIST_FIELDS
            .iter()
            .find_map(|field| object.remove(*field))
            .ok_or(CheckError::MissingParameter("proxies"))?,
        other => other,
    };
    match list {
        Value::String(raw) => Ok(vec![raw]),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(entry) => Ok(entry),
                other => Err(CheckError::InvalidFormat(format!(
                    "expected a \"host:port\" string, got {}",
                    other
                ))),
            })
            .collect(),
        other => Err(CheckError::InvalidFormat(format!(
            "expected a list of proxies, got {}",
            other
        ))),
    }
}
