//! A client for the [Superfeedr] PubSubHubbub subscriber API.
//!
//! [Superfeedr]: https://documentation.superfeedr.com/subscribers.html

pub use self::client::{Client, Response};
pub use self::config::{ClientConfig, ClientOptions, CredentialSource, Environment};
pub use self::error::{FeedError, RequestError, RequestMeta};
pub use self::parameter::{check_parameter, PARAMETERS};
pub use self::subscription::{SubscribeOptions, UnsubscribeOptions};

pub mod client;
pub mod config;
pub mod error;
pub mod parameter;
pub mod subscription;
