//! The HTTP capability the provider needs: send a request, get status, headers and body back.
use std::{collections::HashMap, time::Duration};

use url::Url;

use crate::Result;

/// An outgoing `POST` request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Target URL.
    pub url: Url,
    /// Headers in the order they should be sent.
    pub headers: Vec<(String, String)>,
    /// JSON-encoded request body.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Get the first header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A response received from the server.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Header names are stored lowercased.
    pub headers: HashMap<String, String>,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response with the given status and body and no headers.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Add a header to the response.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> HttpResponse {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Blocking HTTP transport used by the refresh path.
///
/// Implement this trait to plug in a different HTTP stack or to serve canned responses in tests.
/// Transport-level failures (connection refused, timeouts) are returned as errors. Any response
/// received from the server, whatever its status, is returned as `Ok`.
pub trait HttpTransport {
    /// Send `request` and wait for the response.
    fn post(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`HttpTransport`] implementation backed by a blocking `reqwest` client.
pub struct ReqwestTransport {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Create a transport applying `timeout` to every request.
    pub fn new(timeout: Duration) -> Result<ReqwestTransport> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(ReqwestTransport { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self.client.post(request.url).body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send()?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.bytes()?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Repeated headers are joined with `", "`. Values that are not visible ASCII are skipped.
fn collect_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    let mut collected = HashMap::<String, String>::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        collected
            .entry(name.as_str().to_owned())
            .and_modify(|joined| {
                joined.push_str(", ");
                joined.push_str(value);
            })
            .or_insert_with(|| value.to_owned());
    }
    collected
}

impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).post(request)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for std::sync::Arc<T> {
    fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).post(request)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderMap, HeaderValue};

    use super::{collect_headers, HttpResponse};

    #[test]
    fn repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("etag", HeaderValue::from_static("\"123\""));
        headers.append("cache-control", HeaderValue::from_static("no-cache"));
        headers.append("cache-control", HeaderValue::from_static("no-store"));
        headers.append("x-binary", HeaderValue::from_bytes(b"\xff").unwrap());

        let collected = collect_headers(&headers);

        assert_eq!(collected["etag"], "\"123\"");
        assert_eq!(collected["cache-control"], "no-cache, no-store");
        assert!(!collected.contains_key("x-binary"));
    }

    #[test]
    fn response_headers_are_case_insensitive() {
        let response = HttpResponse::new(200, "{}").with_header("ETag", "\"123\"");

        assert_eq!(response.header("etag"), Some("\"123\""));
        assert_eq!(response.header("ETAG"), Some("\"123\""));
        assert_eq!(response.header("retry-after"), None);
    }
}
