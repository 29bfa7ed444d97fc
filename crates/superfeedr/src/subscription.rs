use std::error::Error;
use std::fmt;

use serde::Serialize;

use crate::parameter::{check_parameter, FORMAT, VERIFY};

/// The maximum length of a topic URL, in characters.
pub const TOPIC_MAX_LEN: usize = 2048;

/// The maximum length of a callback URL, in characters.
pub const CALLBACK_MAX_LEN: usize = 250;

/// The URL of the HTTP resource to (un)subscribe to.
///
/// Must not be empty, and must not be longer than [`TOPIC_MAX_LEN`]
/// characters.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
#[serde(transparent)]
pub struct Topic(String);

/// The webhook URL the hub delivers notifications to.
///
/// Must not be longer than [`CALLBACK_MAX_LEN`] characters, and must not be
/// empty when subscribing. The URL has to be reachable by the hub.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
#[serde(transparent)]
pub struct Callback(String);

/// Optional parameters of a subscription.
///
/// `verify` and `format` are checked against
/// [`PARAMETERS`](crate::parameter::PARAMETERS) before the request is sent.
#[derive(Clone, Default, Eq, PartialEq, Debug)]
pub struct SubscribeOptions {
    /// `sync` or `async`: verify the intent of the subscription synchronously
    /// or asynchronously.
    pub verify: Option<String>,
    /// `json` or `atom`: the format notifications are delivered in. Without
    /// it, the hub sends the data pulled from the resource as is.
    pub format: Option<String>,
    /// Include the current representation of the feed in the response.
    pub retrieve: Option<bool>,
}

/// Optional parameters of an unsubscription.
#[derive(Clone, Default, Eq, PartialEq, Debug)]
pub struct UnsubscribeOptions {
    /// `sync` or `async`: verify the intent of the unsubscription
    /// synchronously or asynchronously.
    pub verify: Option<String>,
}

/// The request body of a subscription.
///
/// Every key is always present, absent values are sent as `null`.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct SubscribeParams<'a> {
    #[serde(rename = "hub.mode")]
    mode: Mode,
    #[serde(rename = "hub.topic")]
    topic: &'a Topic,
    #[serde(rename = "hub.callback")]
    callback: &'a Callback,
    #[serde(rename = "hub.secret")]
    secret: Option<&'a str>,
    #[serde(rename = "hub.verify")]
    verify: Option<String>,
    format: Option<String>,
    retrieve: Option<bool>,
}

/// The request body of an unsubscription.
///
/// Every key is always present, absent values are sent as `null`.
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct UnsubscribeParams<'a> {
    #[serde(rename = "hub.mode")]
    mode: Mode,
    #[serde(rename = "hub.topic")]
    topic: &'a Topic,
    #[serde(rename = "hub.callback")]
    callback: Option<&'a Callback>,
    #[serde(rename = "hub.verify")]
    verify: Option<String>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum Mode {
    Subscribe,
    Unsubscribe,
}

/// An error returned when a subscription argument fails validation.
///
/// Validation happens before any request is sent.
#[derive(Debug)]
#[non_exhaustive]
pub struct ValidationError {
    kind: ValidationErrorKind,
}

/// The various types of errors that can cause validation to fail.
#[derive(Clone, Eq, PartialEq, Debug)]
#[non_exhaustive]
pub enum ValidationErrorKind {
    /// The topic is empty.
    EmptyTopic,
    /// The topic is longer than [`TOPIC_MAX_LEN`] characters.
    TopicTooLong,
    /// The callback is empty.
    EmptyCallback,
    /// The callback is longer than [`CALLBACK_MAX_LEN`] characters.
    CallbackTooLong,
    /// The value of an enumerated parameter is not accepted by the hub.
    InvalidParameter {
        /// The name of the parameter.
        name: &'static str,
    },
}

impl Topic {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Callback {
    /// Checks only the length of `callback`, accepting an empty one.
    ///
    /// Unsubscriptions may pass an empty callback through to the hub.
    pub fn within_limit(callback: &str) -> Result<Self, ValidationError> {
        if callback.chars().count() > CALLBACK_MAX_LEN {
            return Err(ValidationErrorKind::CallbackTooLong.into());
        }

        Ok(Self(callback.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Topic {
    type Error = ValidationError;

    fn try_from(topic: &str) -> Result<Self, Self::Error> {
        if topic.is_empty() {
            return Err(ValidationErrorKind::EmptyTopic.into());
        }
        if topic.chars().count() > TOPIC_MAX_LEN {
            return Err(ValidationErrorKind::TopicTooLong.into());
        }

        Ok(Self(topic.to_owned()))
    }
}

impl TryFrom<&str> for Callback {
    type Error = ValidationError;

    fn try_from(callback: &str) -> Result<Self, Self::Error> {
        if callback.is_empty() {
            return Err(ValidationErrorKind::EmptyCallback.into());
        }

        Self::within_limit(callback)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{topic}", topic = self.0)
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{callback}", callback = self.0)
    }
}

impl SubscribeOptions {
    #[must_use]
    pub fn verify(mut self, verify: impl Into<String>) -> Self {
        self.verify = Some(verify.into());
        self
    }

    #[must_use]
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    #[must_use]
    pub fn retrieve(mut self, retrieve: bool) -> Self {
        self.retrieve = Some(retrieve);
        self
    }
}

impl UnsubscribeOptions {
    #[must_use]
    pub fn verify(mut self, verify: impl Into<String>) -> Self {
        self.verify = Some(verify.into());
        self
    }
}

impl<'a> SubscribeParams<'a> {
    /// Validates the options and builds the request body of a subscription.
    pub fn new(
        topic: &'a Topic,
        callback: &'a Callback,
        secret: Option<&'a str>,
        options: SubscribeOptions,
    ) -> Result<Self, ValidationError> {
        let verify = checked(VERIFY, options.verify)?;
        let format = checked(FORMAT, options.format)?;

        Ok(Self {
            mode: Mode::Subscribe,
            topic,
            callback,
            secret,
            verify,
            format,
            retrieve: options.retrieve,
        })
    }
}

impl<'a> UnsubscribeParams<'a> {
    /// Validates the options and builds the request body of an
    /// unsubscription.
    pub fn new(
        topic: &'a Topic,
        callback: Option<&'a Callback>,
        options: UnsubscribeOptions,
    ) -> Result<Self, ValidationError> {
        let verify = checked(VERIFY, options.verify)?;

        Ok(Self {
            mode: Mode::Unsubscribe,
            topic,
            callback,
            verify,
        })
    }
}

/// Passes a present parameter value through as given, failing if the hub
/// does not accept it.
fn checked(name: &'static str, value: Option<String>) -> Result<Option<String>, ValidationError> {
    match value {
        None => Ok(None),
        Some(value) if check_parameter(name, Some(&value)) => Ok(Some(value)),
        Some(_) => Err(ValidationErrorKind::InvalidParameter { name }.into()),
    }
}

impl From<ValidationErrorKind> for ValidationError {
    fn from(kind: ValidationErrorKind) -> Self {
        Self { kind }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ValidationErrorKind::EmptyTopic => write!(f, "topic must not be empty"),
            ValidationErrorKind::TopicTooLong => {
                write!(f, "topic must not be longer than {TOPIC_MAX_LEN} characters")
            },
            ValidationErrorKind::EmptyCallback => write!(f, "callback must not be empty"),
            ValidationErrorKind::CallbackTooLong => write!(
                f,
                "callback must not be longer than {CALLBACK_MAX_LEN} characters"
            ),
            ValidationErrorKind::InvalidParameter { name } => {
                write!(f, "invalid value for parameter {name}")
            },
        }
    }
}

impl Error for ValidationError {}

impl ValidationError {
    /// Returns the corresponding [`ValidationErrorKind`] for this error.
    #[must_use]
    pub const fn kind(&self) -> &ValidationErrorKind {
        &self.kind
    }
}
