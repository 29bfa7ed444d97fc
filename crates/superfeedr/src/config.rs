use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret as _, SecretString};
use url::Url;

/// The canonical push endpoint of the Superfeedr hub.
pub const DEFAULT_ENDPOINT: &str = "https://push.superfeedr.com";

/// The environment variable consulted for the username when none is given
/// explicitly.
pub const USERNAME_VAR: &str = "SUPERFEEDR_USERNAME";

/// The environment variable consulted for the API token when none is given
/// explicitly.
pub const TOKEN_VAR: &str = "SUPERFEEDR_TOKEN";

/// The environment variable consulted for the endpoint when none is given
/// explicitly.
pub const ENDPOINT_VAR: &str = "SUPERFEEDR_ENDPOINT";

/// A source of fallback configuration values.
///
/// Used by [`ClientConfig::resolve`] for any value that was not provided
/// explicitly.
pub trait CredentialSource {
    /// Looks up the value stored under `key`, if any.
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Reads fallback values from the process environment.
#[derive(Copy, Clone, Default, Debug)]
pub struct Environment;

/// The options a [`ClientConfig`] is resolved from.
///
/// Any field left as `None` is looked up through a [`CredentialSource`].
#[derive(Clone, Default, Debug)]
pub struct ClientOptions {
    pub username: Option<String>,
    pub token: Option<SecretString>,
    pub endpoint: Option<String>,
}

/// The username and API token used to authenticate with the hub.
#[derive(Clone, Debug)]
pub struct Credentials {
    username: String,
    token: SecretString,
}

/// The fully resolved configuration of a [`Client`](crate::Client).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    credentials: Credentials,
    endpoint: Endpoint,
}

/// The hub URL every request is sent to.
///
/// Keeps the string exactly as configured (for request metadata) next to its
/// parsed form.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Endpoint {
    raw: String,
    url: Url,
}

/// An error returned when a [`ClientConfig`] cannot be resolved.
#[derive(Debug)]
#[non_exhaustive]
pub struct ConfigError {
    kind: ConfigErrorKind,
    inner: Option<Box<dyn Error + Send + Sync + 'static>>,
}

/// The various types of errors that can cause resolving a [`ClientConfig`]
/// to fail.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigErrorKind {
    /// No username was given and none could be found in the fallback source.
    MissingUsername,
    /// No token was given and none could be found in the fallback source.
    MissingToken,
    /// The endpoint is not an absolute `http` or `https` URL.
    InvalidEndpoint,
    /// The credentials cannot be encoded into a Basic `Authorization` header.
    InvalidCredentials,
}

impl CredentialSource for Environment {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl CredentialSource for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl<S> CredentialSource for &S
where
    S: CredentialSource + ?Sized,
{
    fn lookup(&self, key: &str) -> Option<String> {
        (**self).lookup(key)
    }
}

impl ClientOptions {
    /// Constructs `ClientOptions` with explicit credentials.
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            token: Some(SecretString::from(token.into())),
            endpoint: None,
        }
    }

    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Sets the hub endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

impl Credentials {
    /// Constructs new `Credentials`.
    pub fn new(username: impl Into<String>, token: SecretString) -> Self {
        Self {
            username: username.into(),
            token,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// Builds the value of the Basic `Authorization` header.
    ///
    /// [RFC 7617, Section 2](https://datatracker.ietf.org/doc/html/rfc7617#section-2)
    ///
    /// > a user-id containing a colon character is invalid.
    pub(crate) fn basic_authorization(&self) -> Result<HeaderValue, ConfigError> {
        if self.username.contains(':') {
            return Err(ConfigError {
                kind: ConfigErrorKind::InvalidCredentials,
                inner: None,
            });
        }

        let encoded = BASE64.encode(format!(
            "{username}:{token}",
            username = self.username,
            token = self.token.expose_secret()
        ));
        let mut value = HeaderValue::from_str(&format!("Basic {encoded}")).map_err(|err| {
            ConfigError {
                kind: ConfigErrorKind::InvalidCredentials,
                inner: Some(err.into()),
            }
        })?;
        value.set_sensitive(true);

        Ok(value)
    }
}

impl ClientConfig {
    /// Resolves a `ClientConfig` from explicit options, falling back to
    /// `source` for anything missing.
    ///
    /// Empty values count as missing. The endpoint falls back to
    /// [`DEFAULT_ENDPOINT`] when neither the options nor the source provide
    /// one.
    ///
    /// # Example
    ///
    /// ```
    /// # use std::error::Error;
    /// #
    /// use std::collections::HashMap;
    ///
    /// use superfeedr::config::{ClientConfig, ClientOptions, DEFAULT_ENDPOINT, TOKEN_VAR};
    ///
    /// # fn main() -> Result<(), Box<dyn Error>> {
    /// let source = HashMap::from([(TOKEN_VAR.to_owned(), "token".to_owned())]);
    /// let config = ClientConfig::resolve(ClientOptions::default().username("user"), &source)?;
    /// assert_eq!(config.endpoint().as_str(), DEFAULT_ENDPOINT);
    /// # Ok(())
    /// # }
    /// ```
    pub fn resolve<S>(options: ClientOptions, source: &S) -> Result<Self, ConfigError>
    where
        S: CredentialSource + ?Sized,
    {
        let username = options
            .username
            .filter(|username| !username.is_empty())
            .or_else(|| non_empty(source.lookup(USERNAME_VAR)))
            .ok_or(ConfigError {
                kind: ConfigErrorKind::MissingUsername,
                inner: None,
            })?;

        let token = match options.token {
            Some(token) if !token.expose_secret().is_empty() => token,
            _ => non_empty(source.lookup(TOKEN_VAR))
                .map(SecretString::from)
                .ok_or(ConfigError {
                    kind: ConfigErrorKind::MissingToken,
                    inner: None,
                })?,
        };

        let endpoint = options
            .endpoint
            .filter(|endpoint| !endpoint.is_empty())
            .or_else(|| non_empty(source.lookup(ENDPOINT_VAR)))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned());

        Ok(Self {
            credentials: Credentials::new(username, token),
            endpoint: Endpoint::try_from(endpoint)?,
        })
    }

    /// Resolves a `ClientConfig`, falling back to the process environment.
    pub fn from_env(options: ClientOptions) -> Result<Self, ConfigError> {
        Self::resolve(options, &Environment)
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Endpoint {
    /// Returns the endpoint exactly as it was configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the parsed endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Joins `uri` onto the endpoint by plain concatenation.
    pub(crate) fn concat(&self, uri: &str) -> Result<Url, url::ParseError> {
        format!("{raw}{uri}", raw = self.raw).parse()
    }
}

impl TryFrom<String> for Endpoint {
    type Error = ConfigError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        let url = raw.parse::<Url>().map_err(|err| ConfigError {
            kind: ConfigErrorKind::InvalidEndpoint,
            inner: Some(err.into()),
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(ConfigError {
                kind: ConfigErrorKind::InvalidEndpoint,
                inner: None,
            });
        }

        Ok(Self { raw, url })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{raw}", raw = self.raw)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ConfigErrorKind::MissingUsername => write!(
                f,
                "missing username: pass it explicitly or set {USERNAME_VAR}"
            ),
            ConfigErrorKind::MissingToken => {
                write!(f, "missing token: pass it explicitly or set {TOKEN_VAR}")
            },
            ConfigErrorKind::InvalidEndpoint => match &self.inner {
                Some(err) => write!(f, "invalid endpoint URL: {err}"),
                None => write!(f, "endpoint must be an absolute http(s) URL"),
            },
            ConfigErrorKind::InvalidCredentials => match &self.inner {
                Some(err) => write!(f, "invalid credentials: {err}"),
                None => write!(f, "invalid credentials: username must not contain ':'"),
            },
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner
            .as_deref()
            .map(|err| err as &(dyn Error + 'static))
    }
}

impl ConfigError {
    /// Returns the corresponding [`ConfigErrorKind`] for this error.
    #[must_use]
    pub const fn kind(&self) -> &ConfigErrorKind {
        &self.kind
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use secrecy::ExposeSecret as _;

    use super::*;

    fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[test]
    fn it_prefers_explicit_values() -> Result<()> {
        let fallback = source(&[(USERNAME_VAR, "env-user"), (TOKEN_VAR, "env-token")]);
        let config = ClientConfig::resolve(ClientOptions::new("user", "token"), &fallback)?;
        assert_eq!(config.credentials().username(), "user");
        assert_eq!(config.credentials().token().expose_secret(), "token");
        assert_eq!(config.endpoint().as_str(), DEFAULT_ENDPOINT);
        Ok(())
    }

    #[test]
    fn it_falls_back_to_the_source() -> Result<()> {
        let fallback = source(&[
            (USERNAME_VAR, "env-user"),
            (TOKEN_VAR, "env-token"),
            (ENDPOINT_VAR, "http://localhost:8080"),
        ]);
        let config = ClientConfig::resolve(ClientOptions::default(), &fallback)?;
        assert_eq!(config.credentials().username(), "env-user");
        assert_eq!(config.credentials().token().expose_secret(), "env-token");
        assert_eq!(config.endpoint().as_str(), "http://localhost:8080");
        Ok(())
    }

    #[test]
    fn it_treats_empty_values_as_missing() -> Result<()> {
        let fallback = source(&[(TOKEN_VAR, "env-token")]);
        let err = ClientConfig::resolve(ClientOptions::new("", ""), &fallback).unwrap_err();
        assert!(matches!(err.kind(), ConfigErrorKind::MissingUsername));

        let err = ClientConfig::resolve(ClientOptions::new("user", ""), &source(&[])).unwrap_err();
        assert!(matches!(err.kind(), ConfigErrorKind::MissingToken));

        let config = ClientConfig::resolve(ClientOptions::new("user", ""), &fallback)?;
        assert_eq!(config.credentials().token().expose_secret(), "env-token");
        Ok(())
    }

    #[test]
    fn it_rejects_invalid_endpoints() {
        for endpoint in ["not a url", "ftp://push.superfeedr.com", "mailto:hub@example.com"] {
            let err = ClientConfig::resolve(
                ClientOptions::new("user", "token").endpoint(endpoint),
                &source(&[]),
            )
            .unwrap_err();
            assert!(
                matches!(err.kind(), ConfigErrorKind::InvalidEndpoint),
                "{endpoint}"
            );
        }
    }

    #[test]
    fn it_does_not_leak_the_token_in_debug_output() -> Result<()> {
        let config =
            ClientConfig::resolve(ClientOptions::new("user", "hunter2"), &source(&[]))?;
        assert!(!format!("{config:?}").contains("hunter2"));
        Ok(())
    }

    #[test]
    fn it_encodes_basic_authorization() -> Result<()> {
        let credentials = Credentials::new("user", SecretString::from("token"));
        let value = credentials.basic_authorization()?;
        assert_eq!(value.to_str()?, "Basic dXNlcjp0b2tlbg==");
        assert!(value.is_sensitive());

        let credentials = Credentials::new("us:er", SecretString::from("token"));
        let err = credentials.basic_authorization().unwrap_err();
        assert!(matches!(err.kind(), ConfigErrorKind::InvalidCredentials));
        Ok(())
    }

    #[test]
    fn it_concatenates_uris_onto_the_endpoint() -> Result<()> {
        let endpoint = Endpoint::try_from(DEFAULT_ENDPOINT.to_owned())?;
        assert_eq!(
            endpoint.concat("/test")?.as_str(),
            "https://push.superfeedr.com/test"
        );
        Ok(())
    }
}
