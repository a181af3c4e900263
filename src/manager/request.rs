//! Per-request options for `make_request`.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Optional pieces of an outbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub json: Option<serde_json::Value>,
    /// Overrides the pool's total timeout for this request.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// JSON body; takes precedence over a raw body.
    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.json = Some(value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn apply(self, mut builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if !self.headers.is_empty() {
            builder = builder.headers(self.headers);
        }
        if !self.query.is_empty() {
            builder = builder.query(&self.query);
        }
        if let Some(json) = &self.json {
            builder = builder.json(json);
        } else if let Some(body) = self.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::CONTENT_TYPE;

    #[test]
    fn test_options_apply_to_request() {
        let client = reqwest::Client::new();
        let options = RequestOptions::new()
            .header(HeaderName::from_static("x-trace"), HeaderValue::from_static("abc"))
            .query("page", "2")
            .json(serde_json::json!({ "k": 1 }))
            .body("ignored")
            .timeout(Duration::from_secs(3));

        let request = options
            .apply(client.post("http://example.test/items"))
            .build()
            .unwrap();

        assert_eq!(request.url().as_str(), "http://example.test/items?page=2");
        assert_eq!(request.headers()["x-trace"], "abc");
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(request.timeout(), Some(&Duration::from_secs(3)));
        assert_eq!(request.body().and_then(|b| b.as_bytes()), Some(&b"{\"k\":1}"[..]));
    }
}
