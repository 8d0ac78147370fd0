//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, header::CONTENT_TYPE, request::Parts};
use serde::de::DeserializeOwned;

use crate::method::Method;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

/// An incoming HTTP request with its body already collected.
pub struct Request {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
}

impl Request {
    pub(crate) fn new(
        method: Method,
        parts: Parts,
        body: Bytes,
        params: HashMap<String, String>,
    ) -> Self {
        Self {
            method,
            path: parts.uri.path().to_owned(),
            headers: parts.headers,
            body,
            params,
        }
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/usuarios/{id}`, `req.param("id")` on `/usuarios/42`
    /// returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// True when the body is declared as an urlencoded form.
    pub fn is_form(&self) -> bool {
        self.mime()
            .is_some_and(|mime| mime.eq_ignore_ascii_case(FORM_CONTENT_TYPE))
    }

    /// True when the body is declared as JSON: `application/json` or any
    /// `application/*+json` type.
    pub fn is_json(&self) -> bool {
        self.mime().is_some_and(|mime| {
            let mime = mime.to_ascii_lowercase();
            mime == JSON_CONTENT_TYPE
                || (mime.starts_with("application/") && mime.ends_with("+json"))
        })
    }

    /// The content type without parameters.
    fn mime(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Decodes the body as `application/x-www-form-urlencoded` pairs, in
    /// body order.
    pub fn form(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(&self.body).into_owned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content_type: &str, body: &'static str) -> Request {
        let (parts, ()) = http::Request::builder()
            .method("POST")
            .uri("/usuarios?x=1")
            .header("Content-Type", content_type)
            .body(())
            .unwrap()
            .into_parts();
        Request::new(Method::Post, parts, Bytes::from_static(body.as_bytes()), HashMap::new())
    }

    #[test]
    fn path_excludes_query() {
        assert_eq!(request("application/json", "{}").path(), "/usuarios");
    }

    #[test]
    fn detects_form_bodies() {
        assert!(request("application/x-www-form-urlencoded", "").is_form());
        assert!(request("Application/X-WWW-Form-Urlencoded; charset=utf-8", "").is_form());
        assert!(!request("application/json", "").is_form());
    }

    #[test]
    fn detects_json_bodies() {
        assert!(request("application/json", "").is_json());
        assert!(request("Application/JSON; charset=utf-8", "").is_json());
        assert!(request("application/merge-patch+json", "").is_json());
        assert!(!request("text/plain", "").is_json());
        assert!(!request("application/x-www-form-urlencoded", "").is_json());
    }

    #[test]
    fn decodes_form_pairs() {
        let req = request(FORM_CONTENT_TYPE, "name=Ana+Maria&city=S%C3%A3o+Paulo");
        assert_eq!(
            req.form(),
            vec![
                ("name".to_owned(), "Ana Maria".to_owned()),
                ("city".to_owned(), "São Paulo".to_owned()),
            ],
        );
    }

    #[test]
    fn header_lookup_ignores_case() {
        assert_eq!(request("application/json", "").header("content-type"), Some("application/json"));
    }
}
