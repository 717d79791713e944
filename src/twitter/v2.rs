//! There doesn't yet seem to be a good Rust client that uses API V2

use crate::model::{Tweet, UserProfile};
use crate::twitter::{Authentication, ClientError, TwitterClient, UserRef};
use anyhow::bail;
use async_trait::async_trait;
use chrono::DateTime;
use maplit::hashmap;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

const TIMEOUT_SEC: u64 = 10;
const USER_FIELDS: &str = "description,public_metrics";
// API caps: followers endpoint pages up to 1000 users, tweets up to 100
const FOLLOWER_PAGE_SIZE: &str = "1000";
const TIMELINE_MAX_PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub struct TwitterClientV2 {
    client: Client,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TwitterResponse<T> {
    Ok(T),
    // Detect the case where the API returns 200, but contains errors
    Error {
        errors: serde_json::Value,
    },
}

#[derive(Deserialize)]
struct GetUserResponse {
    data: GetUserData,
}

#[derive(Deserialize)]
struct GetUserData {
    id: String,
    name: String,
    username: String,
    description: Option<String>,
    public_metrics: Option<GetUserMetrics>,
}

#[derive(Deserialize)]
struct GetUserMetrics {
    followers_count: u64,
}

#[derive(Deserialize)]
struct GetFollowersResponse {
    #[serde(default)]
    data: Vec<GetFollowersUser>,
    meta: PageMeta,
}

#[derive(Deserialize)]
struct GetFollowersUser {
    id: String,
}

#[derive(Deserialize)]
struct GetTweetsResponse {
    #[serde(default)]
    data: Vec<GetTweetsTweet>,
    meta: PageMeta,
}

#[derive(Deserialize)]
struct GetTweetsTweet {
    id: String,
    text: String,
    created_at: String,
}

#[derive(Deserialize)]
struct PageMeta {
    next_token: Option<String>,
}

async fn deserialize_response<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let url = response.url().clone();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(ClientError::BadResponse(status.as_u16(), url));
    }
    match serde_json::from_str::<TwitterResponse<T>>(&text) {
        Ok(TwitterResponse::Ok(ok)) => Ok(ok),
        Ok(TwitterResponse::Error { errors }) => Err(classify_api_errors(errors)),
        Err(e) => Err(ClientError::Payload(format!(
            "Unable to deserialize due to: {e}"
        ))),
    }
}

/// A 200 response whose body carries an `errors` array. Missing and suspended
/// accounts arrive this way rather than as HTTP error statuses.
fn classify_api_errors(errors: serde_json::Value) -> ClientError {
    let entries = match errors.as_array() {
        Some(entries) => entries,
        None => return ClientError::Payload(errors.to_string()),
    };
    let unavailable = entries.iter().any(|e| {
        matches!(
            e.get("title").and_then(|t| t.as_str()),
            Some("Not Found Error") | Some("Forbidden")
        )
    });
    if unavailable {
        let identifier = entries
            .iter()
            .find_map(|e| e.get("value").and_then(|v| v.as_str()))
            .unwrap_or("unknown");
        ClientError::UserUnavailable(identifier.to_string())
    } else {
        ClientError::Payload(errors.to_string())
    }
}

impl TwitterClientV2 {
    pub fn new(auth: &Authentication) -> anyhow::Result<Self> {
        let bearer_token = match &auth.bearer_token {
            Some(token) => token,
            None => bail!("The API v2 client requires a bearer token"),
        };
        let mut headers = HeaderMap::new();
        let value = format!("Bearer {}", bearer_token);
        let value = HeaderValue::from_str(&value)?;
        headers.insert(AUTHORIZATION, value);
        Ok(Self {
            client: Client::builder()
                .default_headers(headers)
                .timeout(Duration::from_secs(TIMEOUT_SEC))
                .build()?,
        })
    }

    // https://developer.twitter.com/en/docs/twitter-api/users/follows/api-reference/get-users-id-followers
    async fn get_followers_page(
        &self,
        user_id: u64,
        pagination_token: Option<String>,
    ) -> Result<(Vec<u64>, Option<String>), ClientError> {
        let url =
            Url::from_str(&format!("https://api.twitter.com/2/users/{user_id}/followers")).unwrap();
        let mut query = hashmap! {
            "max_results" => FOLLOWER_PAGE_SIZE.to_string(),
        };
        if let Some(pagination_token) = pagination_token {
            query.insert("pagination_token", pagination_token);
        }
        let response = self.client.get(url).query(&query).send().await?;
        let response = deserialize_response::<GetFollowersResponse>(response).await?;
        let ids = response
            .data
            .into_iter()
            .map(|user| {
                user.id
                    .parse::<u64>()
                    .map_err(|e| ClientError::Payload(format!("Couldn't parse follower id: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((ids, response.meta.next_token))
    }

    // https://developer.twitter.com/en/docs/twitter-api/tweets/timelines/api-reference/get-users-id-tweets
    async fn get_tweets_page(
        &self,
        user_id: u64,
        count: usize,
        since_id: Option<u64>,
        pagination_token: Option<String>,
    ) -> Result<(Vec<Tweet>, Option<String>), ClientError> {
        let url =
            Url::from_str(&format!("https://api.twitter.com/2/users/{user_id}/tweets")).unwrap();
        let mut query = hashmap! {
            "exclude" => "retweets".to_string(),
            "max_results" => count.clamp(5, TIMELINE_MAX_PAGE_SIZE).to_string(),
            "tweet.fields" => "created_at".to_string(),
        };
        if let Some(since_id) = since_id {
            query.insert("since_id", since_id.to_string());
        }
        if let Some(pagination_token) = pagination_token {
            query.insert("pagination_token", pagination_token);
        }
        let response = self.client.get(url).query(&query).send().await?;
        let response = deserialize_response::<GetTweetsResponse>(response).await?;
        let tweets = response
            .data
            .into_iter()
            .map(convert_tweet)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((tweets, response.meta.next_token))
    }
}

#[async_trait]
impl TwitterClient for TwitterClientV2 {
    async fn get_user(&self, user: &UserRef) -> Result<UserProfile, ClientError> {
        let url = match user {
            UserRef::Id(id) => format!("https://api.twitter.com/2/users/{id}"),
            UserRef::ScreenName(name) => {
                format!("https://api.twitter.com/2/users/by/username/{name}")
            }
        };
        let url = Url::from_str(&url)
            .map_err(|e| ClientError::Payload(format!("Invalid user reference: {e}")))?;
        let query = hashmap! {
            "user.fields" => USER_FIELDS.to_string(),
        };
        let response = self.client.get(url).query(&query).send().await?;
        let response = deserialize_response::<GetUserResponse>(response).await?;
        convert_user(response.data)
    }

    async fn get_follower_ids(&self, user_id: u64) -> Result<Vec<u64>, ClientError> {
        let mut next_token = None;
        let mut ids = Vec::new();
        loop {
            let (mut page, next) = self.get_followers_page(user_id, next_token).await?;
            ids.append(&mut page);
            if next.is_none() {
                break;
            }
            next_token = next;
        }
        Ok(ids)
    }

    async fn get_user_timeline(
        &self,
        user_id: u64,
        count: usize,
        since_id: Option<u64>,
    ) -> Result<Vec<Tweet>, ClientError> {
        let mut next_token = None;
        let mut tweets: Vec<Tweet> = Vec::new();
        while tweets.len() < count {
            let (page, next) = self
                .get_tweets_page(user_id, count - tweets.len(), since_id, next_token)
                .await?;
            if page.is_empty() {
                break;
            }
            tweets.extend(page);
            if next.is_none() {
                break;
            }
            next_token = next;
        }
        tweets.truncate(count);
        Ok(tweets)
    }
}

fn convert_user(user: GetUserData) -> Result<UserProfile, ClientError> {
    Ok(UserProfile {
        id: user
            .id
            .parse()
            .map_err(|e| ClientError::Payload(format!("Couldn't parse user id: {e}")))?,
        name: user.name,
        screen_name: user.username,
        followers_count: user.public_metrics.map(|m| m.followers_count).unwrap_or(0),
        description: user.description,
    })
}

fn convert_tweet(tweet: GetTweetsTweet) -> Result<Tweet, ClientError> {
    Ok(Tweet {
        id: u64::from_str(&tweet.id)
            .map_err(|e| ClientError::Payload(format!("Couldn't parse tweet id: {e}")))?,
        timestamp: DateTime::parse_from_rfc3339(&tweet.created_at)
            .map_err(|e| ClientError::Payload(format!("Couldn't parse tweet timestamp: {e}")))?
            .timestamp(),
        text: tweet.text,
    })
}
