use chrono::Local;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct UserProfile {
    pub id: u64,
    /// Display name, e.g. "Rust Language"
    pub name: String,
    /// Handle without the leading '@'
    pub screen_name: String,
    pub followers_count: u64,
    pub description: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Tweet {
    pub id: u64,
    /// Unix timestamp of the tweet creation time
    pub timestamp: i64,
    pub text: String,
}

/// One persisted record of a user's follower-id set. Records are appended to a
/// per-user JSON-lines file and never mutated afterwards.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FollowerSnapshot {
    pub user_id: u64,
    pub user_name: String,
    /// Local capture time, e.g. "2022-04-02 13:37:00.123456"
    pub date: String,
    /// Stringified float epoch seconds, e.g. "1648906620.123456"
    pub timestamp: String,
    pub followers_count: usize,
    pub followers_ids: Vec<u64>,
}

impl FollowerSnapshot {
    pub fn capture(user: &UserProfile, followers_ids: Vec<u64>) -> Self {
        let now = Local::now();
        let epoch = now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6;
        Self {
            user_id: user.id,
            user_name: user.name.clone(),
            date: now.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            timestamp: format!("{:.6}", epoch),
            followers_count: followers_ids.len(),
            followers_ids,
        }
    }
}
