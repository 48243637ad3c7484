//! The typed parsing pipeline: [`Parsable`], [`ErrorParsing`], and the
//! built-in response parsers.
//!
//! `Parsable` is the sole extension point a caller must implement per
//! response type. Which status codes count as success is a per-type policy,
//! not a global constant: [`Json`] accepts 200 and 201, [`NoDataResponse`]
//! and [`Text`] accept anything below 400, and custom implementations are
//! free to be stricter.

use serde::de::DeserializeOwned;

use crate::error::FetchError;
use crate::response::Response;
use crate::result::FetchResult;

/// Converts a [`Response`] into a typed value or a classified failure.
pub trait Parsable: Sized {
    /// Parses a value of this type from the supplied response.
    ///
    /// Implementations decide their own success-status policy, delegate
    /// failing statuses to `error_parser` when one is supplied, and classify
    /// everything else per the error taxonomy in [`FetchError`].
    fn parse(response: &Response, error_parser: Option<&dyn ErrorParsing>) -> FetchResult<Self>;
}

/// Converts a failing response into a domain-specific error.
///
/// Decouples success parsing from error parsing for endpoints that return
/// the same model on success but have their own error payloads.
pub trait ErrorParsing {
    /// Produces a domain error from the raw bytes and status, or `None` to
    /// mean "no special handling, use the generic error".
    fn parse_error(&self, data: Option<&[u8]>, status: u16) -> Option<FetchError>;
}

fn parsed_error(
    response: &Response,
    error_parser: Option<&dyn ErrorParsing>,
) -> Option<FetchError> {
    error_parser.and_then(|parser| parser.parse_error(response.data(), response.status()))
}

/// Statuses the JSON decoding strategy treats as success.
const JSON_SUCCESS_STATUSES: [u16; 2] = [200, 201];

/// Parses a success-range response body as JSON into `T`.
///
/// Status codes outside {200, 201} are delegated to the error parser first,
/// falling back to [`FetchError::HttpError`] with the request URL and a
/// text rendering of the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    /// Unwraps the decoded value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: DeserializeOwned> Parsable for Json<T> {
    fn parse(response: &Response, error_parser: Option<&dyn ErrorParsing>) -> FetchResult<Self> {
        if !JSON_SUCCESS_STATUSES.contains(&response.status()) {
            if let Some(error) = parsed_error(response, error_parser) {
                return Err(error);
            }
            return Err(FetchError::HttpError {
                code: response.status(),
                url: response.original_request().url(),
                body_text: response.body_text(),
            });
        }
        let Some(data) = response.data() else {
            return Err(FetchError::NoData);
        };
        match serde_json::from_slice(data) {
            Ok(value) => Ok(Json(value)),
            Err(error) => Err(FetchError::Parse(error)),
        }
    }
}

/// Use this response type when you only care about success or failure, not a
/// payload. Success for any status below 400, failure otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoDataResponse;

impl Parsable for NoDataResponse {
    fn parse(response: &Response, error_parser: Option<&dyn ErrorParsing>) -> FetchResult<Self> {
        if response.status() < 400 {
            return Ok(NoDataResponse);
        }
        if let Some(error) = parsed_error(response, error_parser) {
            return Err(error);
        }
        Err(FetchError::StatusCode(response.status()))
    }
}

/// Decodes the body as UTF-8 text.
///
/// Status ≥ 400 fails with the status code, an absent body fails with
/// [`FetchError::NoData`], and undecodable bytes fail with the wrapped
/// decode error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text(pub String);

impl Parsable for Text {
    fn parse(response: &Response, _error_parser: Option<&dyn ErrorParsing>) -> FetchResult<Self> {
        if response.status() >= 400 {
            return Err(FetchError::StatusCode(response.status()));
        }
        let Some(data) = response.data() else {
            return Err(FetchError::NoData);
        };
        let text = String::from_utf8(data.to_vec())?;
        Ok(Text(text))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use serde::Deserialize;
    use url::Url;

    use super::*;
    use crate::request::BasicRequest;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Widget {
        name: String,
        desc: String,
    }

    #[derive(Debug, thiserror::Error, PartialEq)]
    #[error("custom error")]
    struct CustomError;

    struct CustomErrorParser;

    impl ErrorParsing for CustomErrorParser {
        fn parse_error(&self, _data: Option<&[u8]>, _status: u16) -> Option<FetchError> {
            Some(FetchError::api(CustomError))
        }
    }

    struct SilentErrorParser;

    impl ErrorParsing for SilentErrorParser {
        fn parse_error(&self, _data: Option<&[u8]>, _status: u16) -> Option<FetchError> {
            None
        }
    }

    fn make_response(status: u16, data: Option<&[u8]>) -> Response {
        let request = BasicRequest::get(Url::parse("https://fetch.example.com/widget").unwrap());
        Response::new(
            data.map(<[u8]>::to_vec),
            status,
            Some(HashMap::new()),
            None,
            Arc::new(request),
        )
    }

    #[test]
    fn test_json_parses_200_body() {
        let response = make_response(200, Some(br#"{"name":"test name","desc":"test desc"}"#));
        let parsed = Json::<Widget>::parse(&response, None).unwrap();
        assert_eq!(parsed.0.name, "test name");
        assert_eq!(parsed.0.desc, "test desc");
    }

    #[test]
    fn test_json_accepts_201() {
        let response = make_response(201, Some(br#"{"name":"a","desc":"b"}"#));
        assert!(Json::<Widget>::parse(&response, None).is_ok());
    }

    #[test]
    fn test_json_status_failure_without_parser_is_http_error() {
        let response = make_response(404, Some(b"missing"));
        let error = Json::<Widget>::parse(&response, None).unwrap_err();
        match error {
            FetchError::HttpError {
                code,
                url,
                body_text,
            } => {
                assert_eq!(code, 404);
                assert_eq!(url.as_str(), "https://fetch.example.com/widget");
                assert_eq!(body_text.as_deref(), Some("missing"));
            }
            other => panic!("expected HttpError, got {other:?}"),
        }
    }

    #[test]
    fn test_json_status_failure_prefers_error_parser() {
        let response = make_response(404, None);
        let error = Json::<Widget>::parse(&response, Some(&CustomErrorParser)).unwrap_err();
        assert_eq!(error.downcast_api::<CustomError>(), Some(&CustomError));
    }

    #[test]
    fn test_json_silent_error_parser_falls_back_to_generic() {
        let response = make_response(500, None);
        let error = Json::<Widget>::parse(&response, Some(&SilentErrorParser)).unwrap_err();
        assert!(matches!(error, FetchError::HttpError { code: 500, .. }));
    }

    #[test]
    fn test_json_success_status_without_body_is_no_data() {
        let response = make_response(200, None);
        let error = Json::<Widget>::parse(&response, None).unwrap_err();
        assert!(matches!(error, FetchError::NoData));
    }

    #[test]
    fn test_json_undecodable_body_is_parse_error() {
        let response = make_response(200, Some(b"not json"));
        let error = Json::<Widget>::parse(&response, None).unwrap_err();
        assert!(matches!(error, FetchError::Parse(_)));
    }

    #[test]
    fn test_no_data_response_succeeds_below_400() {
        for status in [200, 204, 302, 399] {
            let response = make_response(status, None);
            assert!(NoDataResponse::parse(&response, None).is_ok());
        }
    }

    #[test]
    fn test_no_data_response_fails_from_400_up() {
        let response = make_response(400, None);
        let error = NoDataResponse::parse(&response, None).unwrap_err();
        assert!(matches!(error, FetchError::StatusCode(400)));
    }

    #[test]
    fn test_no_data_response_uses_error_parser() {
        let response = make_response(418, None);
        let error = NoDataResponse::parse(&response, Some(&CustomErrorParser)).unwrap_err();
        assert_eq!(error.downcast_api::<CustomError>(), Some(&CustomError));
    }

    #[test]
    fn test_text_decodes_utf8_body() {
        let response = make_response(200, Some("grüß dich".as_bytes()));
        let parsed = Text::parse(&response, None).unwrap();
        assert_eq!(parsed.0, "grüß dich");
    }

    #[test]
    fn test_text_status_failure() {
        let response = make_response(404, Some(b"ignored"));
        let error = Text::parse(&response, None).unwrap_err();
        assert!(matches!(error, FetchError::StatusCode(404)));
    }

    #[test]
    fn test_text_missing_body_is_no_data() {
        let response = make_response(200, None);
        assert!(matches!(
            Text::parse(&response, None).unwrap_err(),
            FetchError::NoData
        ));
    }

    #[test]
    fn test_text_invalid_utf8_is_decode_failure() {
        let response = make_response(200, Some(&[0xff, 0xfe, 0xfd]));
        assert!(matches!(
            Text::parse(&response, None).unwrap_err(),
            FetchError::Utf8(_)
        ));
    }
}
