//! Multipart form request builder.
//!
//! Emits the body eagerly at construction time: a boundary marker, then for
//! each section its part headers, a blank line, the raw content, a line
//! break, and another boundary marker. The last section's trailing marker
//! closes the body.

use std::collections::HashMap;

use serde_json::Value;
use url::Url;

use crate::method::HttpMethod;
use crate::request::Request;

/// Fixed boundary token used to delimit multipart sections.
pub const BOUNDARY_TOKEN: &str = "__fetch_boundary_token__";

const NEW_LINE: &str = "\r\n";

/// One named section of a multipart body.
#[derive(Debug, Clone)]
pub struct MultipartSection {
    content_type: String,
    charset: String,
    name: String,
    filename: String,
    content: Vec<u8>,
}

impl MultipartSection {
    /// Creates a `text/plain; charset=utf-8` section.
    pub fn new(name: &str, filename: &str, content: Vec<u8>) -> Self {
        MultipartSection {
            content_type: "text/plain".to_string(),
            charset: "utf-8".to_string(),
            name: name.to_string(),
            filename: filename.to_string(),
            content,
        }
    }

    /// Overrides the section's content type and charset.
    pub fn with_content_type(mut self, content_type: &str, charset: &str) -> Self {
        self.content_type = content_type.to_string();
        self.charset = charset.to_string();
        self
    }

    fn encode_into(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(
            format!(
                "Content-Type: {}; charset={}{NEW_LINE}",
                self.content_type, self.charset
            )
            .as_bytes(),
        );
        output.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\";filename=\"{}\"{NEW_LINE}{NEW_LINE}",
                self.name, self.filename
            )
            .as_bytes(),
        );
        output.extend_from_slice(&self.content);
        output.extend_from_slice(NEW_LINE.as_bytes());
        append_marker(output);
    }
}

fn append_marker(output: &mut Vec<u8>) {
    output.extend_from_slice(format!("--{BOUNDARY_TOKEN}{NEW_LINE}").as_bytes());
}

/// A request carrying a `multipart/form-data` body.
///
/// Sets the `Content-Type` header with the fixed boundary token.
#[derive(Debug, Clone)]
pub struct MultipartFormRequest {
    url: Url,
    method: HttpMethod,
    headers: Option<HashMap<String, String>>,
    body: Vec<u8>,
    user_info: Option<HashMap<String, Value>>,
}

impl MultipartFormRequest {
    /// Creates a multipart POST request from the given sections.
    pub fn new(url: Url, sections: Vec<MultipartSection>) -> Self {
        Self::with_method(url, HttpMethod::Post, sections)
    }

    /// Creates a multipart request with an explicit method.
    pub fn with_method(url: Url, method: HttpMethod, sections: Vec<MultipartSection>) -> Self {
        let mut body = Vec::new();
        append_marker(&mut body);
        for section in &sections {
            section.encode_into(&mut body);
        }
        let headers = HashMap::from([(
            "Content-Type".to_string(),
            format!("multipart/form-data; boundary={BOUNDARY_TOKEN}"),
        )]);
        MultipartFormRequest {
            url,
            method,
            headers: Some(headers),
            body,
            user_info: None,
        }
    }

    /// Attaches an opaque user-context map to the request.
    pub fn with_user_info(mut self, user_info: HashMap<String, Value>) -> Self {
        self.user_info = Some(user_info);
        self
    }
}

impl Request for MultipartFormRequest {
    fn url(&self) -> Url {
        self.url.clone()
    }

    fn method(&self) -> HttpMethod {
        self.method
    }

    fn headers(&self) -> Option<HashMap<String, String>> {
        self.headers.clone()
    }

    fn body(&self) -> Option<Vec<u8>> {
        Some(self.body.clone())
    }

    fn user_info(&self) -> Option<HashMap<String, Value>> {
        self.user_info.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_url() -> Url {
        Url::parse("https://fetch.example.com/upload").unwrap()
    }

    #[test]
    fn test_two_sections_produce_documented_body() {
        let request = MultipartFormRequest::new(
            test_url(),
            vec![
                MultipartSection::new("first", "first.txt", b"first content".to_vec()),
                MultipartSection::new("second", "second.txt", b"second content".to_vec()),
            ],
        );
        let expected = format!(
            "--{BOUNDARY_TOKEN}\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Disposition: form-data; name=\"first\";filename=\"first.txt\"\r\n\
             \r\n\
             first content\r\n\
             --{BOUNDARY_TOKEN}\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Disposition: form-data; name=\"second\";filename=\"second.txt\"\r\n\
             \r\n\
             second content\r\n\
             --{BOUNDARY_TOKEN}\r\n"
        );
        assert_eq!(request.body().unwrap(), expected.into_bytes());
    }

    #[test]
    fn test_content_type_header_carries_boundary() {
        let request = MultipartFormRequest::new(test_url(), Vec::new());
        let headers = request.headers().unwrap();
        assert_eq!(
            headers.get("Content-Type"),
            Some(&format!("multipart/form-data; boundary={BOUNDARY_TOKEN}"))
        );
    }

    #[test]
    fn test_default_method_is_post_and_overridable() {
        let request = MultipartFormRequest::new(test_url(), Vec::new());
        assert_eq!(request.method(), HttpMethod::Post);
        let request = MultipartFormRequest::with_method(test_url(), HttpMethod::Put, Vec::new());
        assert_eq!(request.method(), HttpMethod::Put);
    }

    #[test]
    fn test_custom_content_type_section() {
        let section = MultipartSection::new("raw", "raw.bin", vec![0x01, 0x02])
            .with_content_type("application/octet-stream", "binary");
        let request = MultipartFormRequest::new(test_url(), vec![section]);
        let body = String::from_utf8_lossy(&request.body().unwrap()).into_owned();
        assert!(body.contains("Content-Type: application/octet-stream; charset=binary\r\n"));
    }
}
