//! [`HttpRequestHost`] over an axum request

use crate::filter::host::HttpRequestHost;
use crate::filter::types::{AUTHORITY_HEADER, METHOD_HEADER, PATH_HEADER};
use crate::proxy::headers::{paths, HOST, SCHEME_HEADER};
use http::request::Parts;
use http::{HeaderName, HeaderValue};
use tracing::warn;

/// Header view of an in-flight request.
///
/// Pseudo-headers are derived from the request line: `:authority` comes from
/// the URI or, for origin-form requests, the `Host` header.
pub struct RequestHeaders<'a> {
    parts: &'a mut Parts,
    resumed: bool,
}

impl<'a> RequestHeaders<'a> {
    pub fn new(parts: &'a mut Parts) -> Self {
        Self {
            parts,
            resumed: false,
        }
    }

    /// Whether the filter released the request after pausing it
    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    fn authority(&self) -> Option<String> {
        self.parts
            .uri
            .authority()
            .map(|authority| authority.as_str().to_string())
            .or_else(|| {
                self.parts
                    .headers
                    .get(HOST)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            })
    }

    fn path(&self) -> String {
        self.parts
            .uri
            .path_and_query()
            .map(|path| path.as_str().to_string())
            .unwrap_or_else(|| paths::DEFAULT.to_string())
    }

    fn scheme(&self) -> String {
        self.parts
            .uri
            .scheme_str()
            .unwrap_or("http")
            .to_string()
    }
}

impl HttpRequestHost for RequestHeaders<'_> {
    fn get_http_request_header(&self, name: &str) -> Option<String> {
        match name {
            AUTHORITY_HEADER => self.authority(),
            PATH_HEADER => Some(self.path()),
            METHOD_HEADER => Some(self.parts.method.as_str().to_string()),
            SCHEME_HEADER => Some(self.scheme()),
            _ => self
                .parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
        }
    }

    fn get_http_request_headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(self.parts.headers.len() + 4);
        if let Some(authority) = self.authority() {
            headers.push((AUTHORITY_HEADER.to_string(), authority));
        }
        headers.push((PATH_HEADER.to_string(), self.path()));
        headers.push((
            METHOD_HEADER.to_string(),
            self.parts.method.as_str().to_string(),
        ));
        headers.push((SCHEME_HEADER.to_string(), self.scheme()));

        headers.extend(self.parts.headers.iter().filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        }));
        headers
    }

    fn add_http_request_header(&mut self, name: &str, value: &str) {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.parts.headers.append(name, value);
            }
            _ => warn!(header = %name, "Dropping auth header that is not valid HTTP"),
        }
    }

    fn resume_http_request(&mut self) {
        self.resumed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http::Request;

    fn parts(request: Request<Body>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_pseudo_headers_from_origin_form_request() {
        let mut parts = parts(
            Request::builder()
                .method("POST")
                .uri("/orders?limit=5")
                .header("host", "domain.org:8080")
                .header("x-custom", "value")
                .body(Body::empty())
                .unwrap(),
        );
        let host = RequestHeaders::new(&mut parts);

        assert_eq!(
            host.get_http_request_header(":authority").as_deref(),
            Some("domain.org:8080")
        );
        assert_eq!(
            host.get_http_request_header(":path").as_deref(),
            Some("/orders?limit=5")
        );
        assert_eq!(host.get_http_request_header(":method").as_deref(), Some("POST"));
        assert_eq!(host.get_http_request_header(":scheme").as_deref(), Some("http"));
        assert_eq!(
            host.get_http_request_header("X-Custom").as_deref(),
            Some("value")
        );
    }

    #[test]
    fn test_absolute_uri_authority_wins() {
        let mut parts = parts(
            Request::builder()
                .uri("http://domain.org/")
                .header("host", "other.org")
                .body(Body::empty())
                .unwrap(),
        );
        let host = RequestHeaders::new(&mut parts);
        assert_eq!(
            host.get_http_request_header(":authority").as_deref(),
            Some("domain.org")
        );
    }

    #[test]
    fn test_missing_authority() {
        let mut parts = parts(Request::builder().uri("/").body(Body::empty()).unwrap());
        let host = RequestHeaders::new(&mut parts);
        assert_eq!(host.get_http_request_header(":authority"), None);
        assert!(host
            .get_http_request_headers()
            .iter()
            .all(|(name, _)| name != ":authority"));
    }

    #[test]
    fn test_header_list_starts_with_pseudo_headers() {
        let mut parts = parts(
            Request::builder()
                .uri("/")
                .header("host", "domain.org")
                .body(Body::empty())
                .unwrap(),
        );
        let host = RequestHeaders::new(&mut parts);
        let headers = host.get_http_request_headers();
        let names: Vec<&str> = headers.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec![":authority", ":path", ":method", ":scheme", "host"]);
    }

    #[test]
    fn test_added_headers_are_appended() {
        let mut parts = parts(
            Request::builder()
                .uri("/")
                .header("authorization", "existing")
                .body(Body::empty())
                .unwrap(),
        );
        let mut host = RequestHeaders::new(&mut parts);
        host.add_http_request_header("Authorization", "token");
        host.add_http_request_header("bad header", "token");
        host.resume_http_request();
        assert!(host.is_resumed());

        let values: Vec<&str> = parts
            .headers
            .get_all("authorization")
            .iter()
            .map(|value| value.to_str().unwrap())
            .collect();
        assert_eq!(values, vec!["existing", "token"]);
        assert_eq!(parts.headers.len(), 2);
    }
}
