use std::error::Error;
use std::fmt;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{ClientConfig, ClientOptions, ConfigError, Endpoint};
use crate::error::{FeedError, RemoteError, RequestError, RequestErrorKind, RequestMeta};
use crate::parameter::PARAMETERS;
use crate::subscription::{
    Callback, SubscribeOptions, SubscribeParams, Topic, UnsubscribeOptions, UnsubscribeParams,
};

const USER_AGENT: &str = concat!("superfeedr-rs/", env!("CARGO_PKG_VERSION"));

/// A client for subscribing to feeds through the Superfeedr hub.
///
/// Cloning is cheap, and clones can be used concurrently.
#[derive(Clone, Debug)]
pub struct Client {
    http_client: reqwest::Client,
    endpoint: Endpoint,
    headers: HeaderMap,
}

/// A successful (2xx) response from the hub.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl Client {
    /// Constructs a new `Client`.
    ///
    /// The credentials are encoded into the `Authorization` header once, here,
    /// and reused for every request.
    ///
    /// # Example
    ///
    /// ```
    /// # use std::error::Error;
    /// #
    /// use superfeedr::config::{ClientConfig, ClientOptions, Environment};
    ///
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// let http_client = reqwest::Client::new();
    /// let config = ClientConfig::resolve(ClientOptions::new("user", "token"), &Environment)?;
    ///
    /// let client = superfeedr::Client::new(http_client, config)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(http_client: reqwest::Client, config: ClientConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(USER_AGENT));
        headers.insert(
            header::AUTHORIZATION,
            config.credentials().basic_authorization()?,
        );

        Ok(Self {
            http_client,
            endpoint: config.endpoint().clone(),
            headers,
        })
    }

    /// Constructs a new `Client` with a default HTTP client, falling back to
    /// the process environment for any option not given.
    pub fn from_env(options: ClientOptions) -> Result<Self, ConfigError> {
        Self::new(reqwest::Client::new(), ClientConfig::from_env(options)?)
    }

    /// Returns the hub endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Checks `value` against the values the hub accepts for the parameter
    /// `name`.
    ///
    /// See [`ParameterSchema::check`](crate::parameter::ParameterSchema::check).
    pub fn check_parameter(&self, name: &str, value: Option<&str>) -> bool {
        PARAMETERS.check(name, value)
    }

    /// Sends `body` as JSON to the hub endpoint.
    pub async fn post<B>(&self, body: &B) -> Result<Response, RequestError>
    where
        B: Serialize + ?Sized,
    {
        let meta = RequestMeta::post(self.endpoint.as_str());
        let body = match serde_json::to_vec(body) {
            Ok(body) => body,
            Err(err) => return Err(RequestError::new(RequestErrorKind::SerializeBody, meta, err)),
        };

        debug!(method = %meta.method, url = %self.endpoint.url(), "sending request to hub");
        let request = self
            .http_client
            .post(self.endpoint.url().clone())
            .headers(self.headers.clone())
            .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(body);

        self.execute(request, meta).await
    }

    /// Sends a `GET` request to the hub endpoint followed by `uri`, with
    /// `query` appended as the query string.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use std::error::Error;
    /// #
    /// # use superfeedr::config::ClientOptions;
    /// #
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn Error>> {
    /// # let client = superfeedr::Client::from_env(ClientOptions::new("user", "token"))?;
    /// #
    /// let res = client.get("/", &[("hub.mode", "list"), ("page", "1")]).await?;
    /// println!("{body}", body = res.text());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get(&self, uri: &str, query: &[(&str, &str)]) -> Result<Response, RequestError> {
        let meta = RequestMeta::get(self.endpoint.as_str(), uri, query);
        let mut url = match self.endpoint.concat(uri) {
            Ok(url) => url,
            Err(err) => return Err(RequestError::new(RequestErrorKind::InvalidUrl, meta, err)),
        };
        let encoded_query = match serde_html_form::to_string(query) {
            Ok(encoded_query) => encoded_query,
            Err(err) => return Err(RequestError::new(RequestErrorKind::SerializeQuery, meta, err)),
        };
        if !encoded_query.is_empty() {
            let encoded_query = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{encoded_query}"),
                _ => encoded_query,
            };
            url.set_query(Some(&encoded_query));
        }

        debug!(method = %meta.method, %url, "sending request to hub");
        let request = self.http_client.get(url).headers(self.headers.clone());

        self.execute(request, meta).await
    }

    /// Subscribes `callback` to `topic`.
    ///
    /// All arguments are validated before anything is sent to the hub.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use std::error::Error;
    /// #
    /// use superfeedr::subscription::SubscribeOptions;
    /// # use superfeedr::config::ClientOptions;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn Error>> {
    /// # let client = superfeedr::Client::from_env(ClientOptions::new("user", "token"))?;
    /// #
    /// let options = SubscribeOptions::default().verify("sync").format("json");
    ///
    /// client
    ///     .add_feed(
    ///         "https://example.com/feed.xml",
    ///         "https://example.com/callback",
    ///         Some("shhh"),
    ///         options,
    ///     )
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn add_feed(
        &self,
        topic: &str,
        callback: &str,
        secret: Option<&str>,
        options: SubscribeOptions,
    ) -> Result<Response, FeedError> {
        let topic = Topic::try_from(topic)?;
        let callback = Callback::try_from(callback)?;
        let params = SubscribeParams::new(&topic, &callback, secret, options)?;

        Ok(self.post(&params).await?)
    }

    /// Unsubscribes `callback`, or the only callback subscribed, from `topic`.
    ///
    /// All arguments are validated before anything is sent to the hub.
    pub async fn remove_feed(
        &self,
        topic: &str,
        callback: Option<&str>,
        options: UnsubscribeOptions,
    ) -> Result<Response, FeedError> {
        let topic = Topic::try_from(topic)?;
        let callback = callback.map(Callback::within_limit).transpose()?;
        let params = UnsubscribeParams::new(&topic, callback.as_ref(), options)?;

        Ok(self.post(&params).await?)
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        meta: RequestMeta,
    ) -> Result<Response, RequestError> {
        let res = match request.send().await {
            Ok(res) => res,
            Err(err) => {
                warn!(
                    method = %meta.method,
                    endpoint = %meta.endpoint,
                    error = %err,
                    "failed to send request to hub"
                );
                return Err(RequestError::new(RequestErrorKind::Transport, meta, err));
            },
        };

        let status = res.status();
        let headers = res.headers().clone();
        let body = res.text().await;

        outcome(meta, status, headers, body)
    }
}

/// Maps a received response onto the success/failure contract.
///
/// Any status outside 2xx is a rejection, even if its body could not be read.
fn outcome<E>(
    meta: RequestMeta,
    status: StatusCode,
    headers: HeaderMap,
    body: Result<String, E>,
) -> Result<Response, RequestError>
where
    E: Into<Box<dyn Error + Send + Sync + 'static>> + fmt::Display,
{
    if !status.is_success() {
        warn!(
            method = %meta.method,
            endpoint = %meta.endpoint,
            %status,
            "hub rejected request"
        );
        return Err(match body {
            Ok(body) => RequestError::rejected(meta, RemoteError::new(status, headers, body)),
            Err(err) => {
                warn!(%status, error = %err, "failed to read rejection from hub");
                RequestError::rejected_unread(
                    meta,
                    RemoteError::new(status, headers, String::new()),
                    err,
                )
            },
        });
    }

    let body = match body {
        Ok(body) => body,
        Err(err) => {
            warn!(%status, error = %err, "failed to read response from hub");
            return Err(RequestError::new(RequestErrorKind::ReadResponse, meta, err));
        },
    };

    debug!(%status, "hub accepted request");
    Ok(Response {
        status,
        headers,
        body,
    })
}

impl Response {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the response body as text.
    pub fn text(&self) -> &str {
        &self.body
    }

    /// Deserializes the response body from JSON.
    ///
    /// Useful with `SubscribeOptions::retrieve`, which makes the hub include
    /// the current representation of the feed.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_str(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use anyhow::Result;

    use super::*;
    use crate::config::DEFAULT_ENDPOINT;

    fn client() -> Result<Client> {
        let config = ClientConfig::resolve(
            ClientOptions::new("user", "token"),
            &HashMap::<String, String>::new(),
        )?;
        Ok(Client::new(reqwest::Client::new(), config)?)
    }

    #[test]
    fn it_prepares_authenticated_headers() -> Result<()> {
        let client = client()?;
        assert_eq!(client.endpoint().as_str(), DEFAULT_ENDPOINT);
        assert_eq!(
            client.headers.get(header::AUTHORIZATION),
            Some(&HeaderValue::from_static("Basic dXNlcjp0b2tlbg=="))
        );
        assert_eq!(
            client.headers.get(header::USER_AGENT),
            Some(&HeaderValue::from_static(USER_AGENT))
        );
        assert!(!format!("{client:?}").contains("dXNlcjp0b2tlbg=="));
        Ok(())
    }

    #[test]
    fn it_checks_parameters() -> Result<()> {
        let client = client()?;
        assert!(client.check_parameter("verify", Some("async")));
        assert!(client.check_parameter("verify", Some("ASYNC")));
        assert!(!client.check_parameter("verify", None));
        assert!(!client.check_parameter("unknown", Some("async")));
        Ok(())
    }

    #[tokio::test]
    async fn it_validates_before_sending() -> Result<()> {
        let client = client()?;
        let topic = "a".repeat(2049);
        let err = client
            .add_feed(&topic, "https://callback.com/1", None, SubscribeOptions::default())
            .await
            .unwrap_err();
        assert!(err.as_validation().is_some());

        let err = client
            .remove_feed("", None, UnsubscribeOptions::default())
            .await
            .unwrap_err();
        assert!(err.as_validation().is_some());
        Ok(())
    }

    #[test]
    fn it_keeps_the_status_of_unreadable_rejections() {
        let meta = RequestMeta::post(DEFAULT_ENDPOINT);
        let body = Err::<String, _>(std::io::Error::other("connection reset"));

        let err = outcome(meta.clone(), StatusCode::UNPROCESSABLE_ENTITY, HeaderMap::new(), body)
            .unwrap_err();
        assert!(matches!(err.kind(), RequestErrorKind::RemoteRejection));
        assert_eq!(err.status(), Some(StatusCode::UNPROCESSABLE_ENTITY));
        assert_eq!(err.meta(), &meta);
        assert!(err.source().is_some());
    }

    #[test]
    fn it_reports_unreadable_successes() {
        let meta = RequestMeta::post(DEFAULT_ENDPOINT);
        let body = Err::<String, _>(std::io::Error::other("connection reset"));

        let err = outcome(meta, StatusCode::OK, HeaderMap::new(), body).unwrap_err();
        assert!(matches!(err.kind(), RequestErrorKind::ReadResponse));
        assert!(err.remote_error().is_none());
    }

    #[test]
    fn it_deserializes_json_responses() -> Result<()> {
        let res = Response {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: r#"{"status":{"code":200}}"#.to_owned(),
        };
        let value: serde_json::Value = res.json()?;
        assert_eq!(value["status"]["code"], 200);
        Ok(())
    }
}
