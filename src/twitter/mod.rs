pub mod v1;
pub mod v2;

use crate::model::{Tweet, UserProfile};
use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use url::Url;

#[derive(Deserialize)]
pub struct Authentication {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
    /// Only required for the API v2 client
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Authentication {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            consumer_key: env_var("TWITTER_CONSUMER_KEY")?,
            consumer_secret: env_var("TWITTER_CONSUMER_SECRET")?,
            access_token: env_var("TWITTER_ACCESS_TOKEN")?,
            access_token_secret: env_var("TWITTER_ACCESS_TOKEN_SECRET")?,
            bearer_token: std::env::var("TWITTER_BEARER_TOKEN").ok(),
        })
    }
}

fn env_var(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("Missing environment variable {}", name))
}

/// A user reference, either by numeric id or by screen name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    Id(u64),
    ScreenName(String),
}

impl UserRef {
    /// All-digit identifiers are treated as numeric ids.
    pub fn parse(identifier: &str) -> Self {
        match identifier.parse::<u64>() {
            Ok(id) => UserRef::Id(id),
            Err(_) => UserRef::ScreenName(identifier.to_string()),
        }
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRef::Id(id) => write!(f, "{}", id),
            UserRef::ScreenName(name) => write!(f, "{}", name),
        }
    }
}

impl From<u64> for UserRef {
    fn from(id: u64) -> Self {
        UserRef::Id(id)
    }
}

impl From<&str> for UserRef {
    fn from(name: &str) -> Self {
        UserRef::ScreenName(name.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    /// The account does not exist, or is deactivated or suspended
    #[error("User unavailable: {0}")]
    UserUnavailable(String),
    #[error("Twitter API error: {0}")]
    Api(#[from] egg_mode::error::Error),
    #[error("Error performing HTTP request: {0}")]
    Request(
        #[source]
        #[from]
        reqwest::Error,
    ),
    #[error("Received unsuccessful response code: {0} from {1}")]
    BadResponse(u16, Url),
    #[error("Unexpected response payload: {0}")]
    Payload(String),
}

#[async_trait]
pub trait TwitterClient: Send + Sync {
    /// Resolve a user reference to a full profile.
    async fn get_user(&self, user: &UserRef) -> Result<UserProfile, ClientError>;

    /// All follower ids for a user. Pagination is handled internally; the
    /// returned ids are in provider order, not sorted.
    async fn get_follower_ids(&self, user_id: u64) -> Result<Vec<u64>, ClientError>;

    /// Up to `count` of the user's most recent tweets, newest first,
    /// optionally limited to tweets newer than `since_id`.
    async fn get_user_timeline(
        &self,
        user_id: u64,
        count: usize,
        since_id: Option<u64>,
    ) -> Result<Vec<Tweet>, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_numeric_identifier_as_id() {
        assert_eq!(UserRef::parse("12345"), UserRef::Id(12345));
    }

    #[test]
    fn parse_handle_as_screen_name() {
        assert_eq!(
            UserRef::parse("rustlang"),
            UserRef::ScreenName("rustlang".to_string())
        );
    }
}
