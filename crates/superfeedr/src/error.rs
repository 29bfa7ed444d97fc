use std::error::Error;
use std::fmt;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use crate::subscription::ValidationError;

/// The HTTP method of a request sent to the hub.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Method {
    Get,
    Post,
}

/// Describes the request that produced a [`RequestError`].
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RequestMeta {
    /// The configured hub endpoint.
    pub endpoint: String,
    pub method: Method,
    /// The path appended to the endpoint, for `GET` requests.
    pub uri: Option<String>,
    /// The query parameters, for `GET` requests.
    pub query: Option<Vec<(String, String)>>,
}

/// The error response returned by the hub.
#[derive(Clone, Debug)]
pub struct RemoteError {
    status: StatusCode,
    headers: HeaderMap,
    text: String,
    payload: Option<serde_json::Value>,
}

/// An error returned from a request to the hub.
///
/// Always carries the [`RequestMeta`] of the failed request. The transport
/// error and the error returned by the hub are kept apart.
#[derive(Debug)]
#[non_exhaustive]
pub struct RequestError {
    kind: RequestErrorKind,
    meta: RequestMeta,
    inner: Option<Box<dyn Error + Send + Sync + 'static>>,
    remote: Option<RemoteError>,
}

/// The various types of errors that can cause a request to the hub to fail.
#[derive(Debug)]
#[non_exhaustive]
pub enum RequestErrorKind {
    /// Failed to serialize the request body to JSON.
    SerializeBody,
    /// Failed to serialize the query to application/x-www-form-urlencoded.
    SerializeQuery,
    /// The endpoint joined with the URI is not a valid URL.
    InvalidUrl,
    /// Failed to send request to the hub.
    Transport,
    /// Failed to read response from the hub.
    ReadResponse,
    /// The hub responded with a status code outside of the 2xx range.
    RemoteRejection,
}

/// An error returned from [`Client::add_feed`](crate::Client::add_feed) and
/// [`Client::remove_feed`](crate::Client::remove_feed).
#[derive(Debug)]
pub enum FeedError {
    /// An argument was rejected before any request was sent.
    Validation(ValidationError),
    /// The request to the hub failed.
    Request(RequestError),
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

impl RequestMeta {
    pub(crate) fn post(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_owned(),
            method: Method::Post,
            uri: None,
            query: None,
        }
    }

    pub(crate) fn get(endpoint: &str, uri: &str, query: &[(&str, &str)]) -> Self {
        Self {
            endpoint: endpoint.to_owned(),
            method: Method::Get,
            uri: Some(uri.to_owned()),
            query: Some(
                query
                    .iter()
                    .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                    .collect(),
            ),
        }
    }
}

impl RemoteError {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, text: String) -> Self {
        let payload = serde_json::from_str::<serde_json::Value>(&text)
            .ok()
            .map(|value| match value {
                serde_json::Value::Object(mut object) if object.contains_key("error") => {
                    object.remove("error").unwrap_or_default()
                },
                value => value,
            });

        Self {
            status,
            headers,
            text,
            payload,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the response body as text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the structured error, if the response body is JSON.
    ///
    /// An `error` member of a JSON object body is unwrapped.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.payload.as_ref()
    }
}

impl RequestError {
    pub(crate) fn new<E>(kind: RequestErrorKind, meta: RequestMeta, err: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        Self {
            kind,
            meta,
            inner: Some(err.into()),
            remote: None,
        }
    }

    pub(crate) fn rejected(meta: RequestMeta, remote: RemoteError) -> Self {
        Self {
            kind: RequestErrorKind::RemoteRejection,
            meta,
            inner: None,
            remote: Some(remote),
        }
    }

    /// The hub rejected the request, and its response body could not be read.
    pub(crate) fn rejected_unread<E>(meta: RequestMeta, remote: RemoteError, err: E) -> Self
    where
        E: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        Self {
            kind: RequestErrorKind::RemoteRejection,
            meta,
            inner: Some(err.into()),
            remote: Some(remote),
        }
    }

    /// Returns the corresponding [`RequestErrorKind`] for this error.
    #[must_use]
    pub const fn kind(&self) -> &RequestErrorKind {
        &self.kind
    }

    /// Returns the description of the request that failed.
    #[must_use]
    pub const fn meta(&self) -> &RequestMeta {
        &self.meta
    }

    /// Returns the status code of the hub's response, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        self.remote.as_ref().map(RemoteError::status).or_else(|| {
            self.transport_error()
                .and_then(reqwest::Error::status)
        })
    }

    /// Returns the error raised by the HTTP transport, if any.
    pub fn transport_error(&self) -> Option<&reqwest::Error> {
        self.inner.as_deref()?.downcast_ref::<reqwest::Error>()
    }

    /// Returns the error response returned by the hub, if any.
    pub fn remote_error(&self) -> Option<&RemoteError> {
        self.remote.as_ref()
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = self.meta.method;
        let endpoint = &self.meta.endpoint;
        let uri = self.meta.uri.as_deref().unwrap_or_default();
        match (&self.kind, &self.inner, &self.remote) {
            (RequestErrorKind::RemoteRejection, _, Some(remote)) => write!(
                f,
                "hub rejected {method} {endpoint}{uri} with status {status}",
                status = remote.status
            ),
            (RequestErrorKind::SerializeBody, Some(err), _) => {
                write!(f, "failed to serialize request body to JSON: {err}")
            },
            (RequestErrorKind::SerializeQuery, Some(err), _) => write!(
                f,
                "failed to serialize query to application/x-www-form-urlencoded: {err}"
            ),
            (RequestErrorKind::InvalidUrl, Some(err), _) => {
                write!(f, "invalid request URL {endpoint}{uri}: {err}")
            },
            (RequestErrorKind::Transport, Some(err), _) => {
                write!(f, "failed to send {method} request to {endpoint}{uri}: {err}")
            },
            (RequestErrorKind::ReadResponse, Some(err), _) => {
                write!(f, "failed to read response from {endpoint}{uri}: {err}")
            },
            (kind, ..) => write!(f, "{method} request to {endpoint}{uri} failed: {kind:?}"),
        }
    }
}

impl Error for RequestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner
            .as_deref()
            .map(|err| err as &(dyn Error + 'static))
    }
}

impl From<ValidationError> for FeedError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<RequestError> for FeedError {
    fn from(err: RequestError) -> Self {
        Self::Request(err)
    }
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "invalid argument: {err}"),
            Self::Request(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FeedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Request(err) => err.source(),
        }
    }
}

impl FeedError {
    /// Returns the [`RequestError`] if the request to the hub failed.
    pub fn as_request(&self) -> Option<&RequestError> {
        match self {
            Self::Request(err) => Some(err),
            Self::Validation(_) => None,
        }
    }

    /// Returns the [`ValidationError`] if an argument was rejected.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Request(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{Context as _, Result};
    use serde_json::json;

    use super::*;

    #[test]
    fn it_keeps_plain_text_error_bodies() {
        let text = "Please provide a valid hub.topic (feed) URL that is accepted on this hub.";
        let remote = RemoteError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            HeaderMap::new(),
            text.to_owned(),
        );
        assert_eq!(remote.text(), text);
        assert!(remote.payload().is_none());
    }

    #[test]
    fn it_unwraps_structured_error_bodies() -> Result<()> {
        let remote = RemoteError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            HeaderMap::new(),
            r#"{"error":{"message":"bad topic","status":422}}"#.to_owned(),
        );
        let payload = remote.payload().context("payload is missing")?;
        assert_eq!(payload, &json!({"message": "bad topic", "status": 422}));

        let remote = RemoteError::new(
            StatusCode::BAD_REQUEST,
            HeaderMap::new(),
            r#"{"message":"bad topic"}"#.to_owned(),
        );
        let payload = remote.payload().context("payload is missing")?;
        assert_eq!(payload, &json!({"message": "bad topic"}));
        Ok(())
    }

    #[test]
    fn it_describes_rejections_with_meta() {
        let meta = RequestMeta::get("https://push.superfeedr.com", "/test", &[("q", "test")]);
        let err = RequestError::rejected(
            meta.clone(),
            RemoteError::new(StatusCode::UNPROCESSABLE_ENTITY, HeaderMap::new(), String::new()),
        );
        assert_eq!(err.meta(), &meta);
        assert_eq!(err.status(), Some(StatusCode::UNPROCESSABLE_ENTITY));
        assert!(err.transport_error().is_none());
        assert_eq!(
            err.to_string(),
            "hub rejected GET https://push.superfeedr.com/test with status 422 Unprocessable \
             Entity"
        );
    }
}
