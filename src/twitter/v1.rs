use crate::model::{Tweet, UserProfile};
use crate::twitter::{Authentication, ClientError, TwitterClient, UserRef};
use async_trait::async_trait;
use egg_mode::{KeyPair, Token};
use futures::TryStreamExt;

const FOLLOWER_PAGE_SIZE: i32 = 5000;
const TIMELINE_MAX_PAGE_SIZE: usize = 200;

// Codes Twitter reports for accounts that cannot be resolved: no user matches
// (17), page does not exist (34), user not found (50), user suspended (63).
const USER_GONE_CODES: [i32; 4] = [17, 34, 50, 63];

pub struct TwitterClientV1 {
    token: Token,
}

impl TwitterClientV1 {
    pub fn new(auth: &Authentication) -> Self {
        Self {
            token: Token::Access {
                consumer: KeyPair::new(auth.consumer_key.clone(), auth.consumer_secret.clone()),
                access: KeyPair::new(auth.access_token.clone(), auth.access_token_secret.clone()),
            },
        }
    }
}

#[async_trait]
impl TwitterClient for TwitterClientV1 {
    async fn get_user(&self, user: &UserRef) -> Result<UserProfile, ClientError> {
        let response = egg_mode::user::show(user_id_param(user), &self.token)
            .await
            .map_err(|e| classify_user_error(e, user))?;
        Ok(convert_user(response.response))
    }

    async fn get_follower_ids(&self, user_id: u64) -> Result<Vec<u64>, ClientError> {
        let ids = egg_mode::user::followers_ids(user_id, &self.token)
            .with_page_size(FOLLOWER_PAGE_SIZE)
            .map_ok(|r| r.response)
            .try_collect::<Vec<u64>>()
            .await?;
        Ok(ids)
    }

    async fn get_user_timeline(
        &self,
        user_id: u64,
        count: usize,
        since_id: Option<u64>,
    ) -> Result<Vec<Tweet>, ClientError> {
        let page_size = count.clamp(1, TIMELINE_MAX_PAGE_SIZE) as i32;
        let mut timeline = egg_mode::tweet::user_timeline(user_id, true, false, &self.token)
            .with_page_size(page_size);
        let mut tweets = Vec::new();
        while tweets.len() < count {
            let (next, feed) = timeline.older(since_id).await?;
            timeline = next;
            if feed.is_empty() {
                break;
            }
            for tweet in feed.response {
                if tweets.len() == count {
                    break;
                }
                tweets.push(convert_tweet(tweet));
            }
        }
        Ok(tweets)
    }
}

fn user_id_param(user: &UserRef) -> egg_mode::user::UserID {
    match user {
        UserRef::Id(id) => egg_mode::user::UserID::ID(*id),
        UserRef::ScreenName(name) => egg_mode::user::UserID::ScreenName(name.clone().into()),
    }
}

fn classify_user_error(error: egg_mode::error::Error, user: &UserRef) -> ClientError {
    match &error {
        egg_mode::error::Error::TwitterError(_, errors)
            if errors
                .errors
                .iter()
                .any(|e| USER_GONE_CODES.contains(&e.code)) =>
        {
            ClientError::UserUnavailable(user.to_string())
        }
        _ => ClientError::Api(error),
    }
}

fn convert_user(user: egg_mode::user::TwitterUser) -> UserProfile {
    UserProfile {
        id: user.id,
        name: user.name,
        screen_name: user.screen_name,
        followers_count: user.followers_count.max(0) as u64,
        description: user.description,
    }
}

fn convert_tweet(tweet: egg_mode::tweet::Tweet) -> Tweet {
    Tweet {
        id: tweet.id,
        timestamp: tweet.created_at.timestamp(),
        text: tweet.text,
    }
}
