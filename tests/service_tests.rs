use async_trait::async_trait;
use follower_watch::model::{Tweet, UserProfile};
use follower_watch::service::{unavailable_placeholder, FollowerSnapshotService, Lookup};
use follower_watch::store::SnapshotStore;
use follower_watch::twitter::{ClientError, TwitterClient, UserRef};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

struct FakeTwitter {
    users: Vec<UserProfile>,
    followers: Arc<Mutex<Vec<u64>>>,
    tweets: Vec<Tweet>,
}

#[async_trait]
impl TwitterClient for FakeTwitter {
    async fn get_user(&self, user: &UserRef) -> Result<UserProfile, ClientError> {
        let found = match user {
            UserRef::Id(id) => self.users.iter().find(|u| u.id == *id),
            UserRef::ScreenName(name) => self.users.iter().find(|u| u.screen_name == *name),
        };
        found
            .cloned()
            .ok_or_else(|| ClientError::UserUnavailable(user.to_string()))
    }

    async fn get_follower_ids(&self, _user_id: u64) -> Result<Vec<u64>, ClientError> {
        Ok(self.followers.lock().unwrap().clone())
    }

    async fn get_user_timeline(
        &self,
        _user_id: u64,
        count: usize,
        since_id: Option<u64>,
    ) -> Result<Vec<Tweet>, ClientError> {
        Ok(self
            .tweets
            .iter()
            .filter(|t| since_id.map_or(true, |since| t.id > since))
            .take(count)
            .cloned()
            .collect())
    }
}

fn profile(id: u64, name: &str, screen_name: &str) -> UserProfile {
    UserProfile {
        id,
        name: name.to_string(),
        screen_name: screen_name.to_string(),
        followers_count: 0,
        description: None,
    }
}

fn watched_user() -> UserProfile {
    profile(42, "Watched User", "watched")
}

/// Service over a fake client whose follower list can be swapped between calls.
fn service_with(
    followers: Vec<u64>,
    out_dir: &Path,
) -> (FollowerSnapshotService, Arc<Mutex<Vec<u64>>>) {
    let followers = Arc::new(Mutex::new(followers));
    let client = FakeTwitter {
        users: vec![watched_user(), profile(7, "Other User", "other")],
        followers: followers.clone(),
        tweets: (1..=30)
            .rev()
            .map(|id| Tweet {
                id,
                timestamp: 1_650_000_000 + id as i64,
                text: format!("tweet {id}"),
            })
            .collect(),
    };
    (
        FollowerSnapshotService::new(Box::new(client), SnapshotStore::new(out_dir)),
        followers,
    )
}

fn snapshot_path(out_dir: &Path) -> std::path::PathBuf {
    out_dir.join("42_Watched_User_followers_ids.json")
}

#[tokio::test]
async fn follower_ids_are_sorted_ascending() {
    let dir = tempdir().unwrap();
    let (service, _) = service_with(vec![50, 3, 20, 1], dir.path());

    let ids = service.get_follower_ids(42).await.unwrap();
    assert_eq!(ids, vec![1, 3, 20, 50]);

    // sorting an already-sorted fetch is a no-op
    let again = service.get_follower_ids(42).await.unwrap();
    assert_eq!(again, ids);
}

#[tokio::test]
async fn first_comparison_treats_every_follower_as_new() {
    let dir = tempdir().unwrap();
    let (service, _) = service_with(vec![2, 1, 3], dir.path());

    let diff = service
        .compare_followers(&UserRef::parse("watched"))
        .await
        .unwrap();
    assert!(diff.unfollowers.is_empty());
    assert_eq!(diff.new_followers, BTreeSet::from([1, 2, 3]));
    assert_eq!(diff.followers_count, 3);

    let contents = std::fs::read_to_string(snapshot_path(dir.path())).unwrap();
    let records: Vec<&str> = contents.lines().collect();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn comparison_detects_unfollowers_and_new_followers() {
    let dir = tempdir().unwrap();
    let (service, followers) = service_with(vec![1, 2, 3, 4], dir.path());

    service
        .compare_followers(&UserRef::Id(42))
        .await
        .unwrap();
    *followers.lock().unwrap() = vec![2, 3, 5];

    let diff = service.compare_followers(&UserRef::Id(42)).await.unwrap();
    assert_eq!(diff.unfollowers, BTreeSet::from([1, 4]));
    assert_eq!(diff.new_followers, BTreeSet::from([5]));
    assert_eq!(diff.followers_count, 3);
}

#[tokio::test]
async fn appended_snapshots_preserve_order() {
    let dir = tempdir().unwrap();
    let (service, followers) = service_with(vec![1, 2], dir.path());

    service.compare_followers(&UserRef::Id(42)).await.unwrap();
    *followers.lock().unwrap() = vec![1, 2, 9];
    service.compare_followers(&UserRef::Id(42)).await.unwrap();

    let contents = std::fs::read_to_string(snapshot_path(dir.path())).unwrap();
    let records: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["followers_ids"], serde_json::json!([1, 2]));
    assert_eq!(records[1]["followers_ids"], serde_json::json!([1, 2, 9]));
    assert_eq!(records[1]["user_name"], "Watched User");
}

#[tokio::test]
async fn malformed_store_file_fails_the_comparison() {
    let dir = tempdir().unwrap();
    let (service, _) = service_with(vec![1], dir.path());

    std::fs::write(snapshot_path(dir.path()), "not json\n").unwrap();

    let err = service.compare_followers(&UserRef::Id(42)).await.unwrap_err();
    assert!(err.to_string().contains("snapshot store"));
}

#[tokio::test]
async fn batch_profile_lookup_degrades_per_item() {
    let dir = tempdir().unwrap();
    let (service, _) = service_with(vec![], dir.path());

    let identifiers = vec![
        "watched".to_string(),
        "ghost".to_string(),
        "other".to_string(),
    ];
    let lookups = service.get_user_profiles(&identifiers).await.unwrap();
    assert_eq!(lookups.len(), 3);
    assert!(matches!(&lookups[0], Lookup::Found(p) if p.id == 42));
    assert!(matches!(&lookups[1], Lookup::Unavailable(ident) if ident == "ghost"));
    assert!(matches!(&lookups[2], Lookup::Found(p) if p.id == 7));
}

#[tokio::test]
async fn names_from_ids_substitutes_placeholder_in_results() {
    let dir = tempdir().unwrap();
    let (service, _) = service_with(vec![], dir.path());

    let names = service.get_names_from_ids(&[42, 99, 7]).await.unwrap();
    assert_eq!(
        names,
        vec![
            "Watched User".to_string(),
            unavailable_placeholder("99"),
            "Other User".to_string(),
        ]
    );
    assert_eq!(names[1], "99 (unavailable/deactivated)");
}

#[tokio::test]
async fn ids_from_names_tags_failures_in_the_result_list() {
    let dir = tempdir().unwrap();
    let (service, _) = service_with(vec![], dir.path());

    let names = vec!["watched".to_string(), "ghost".to_string()];
    let lookups = service.get_ids_from_names(&names).await.unwrap();
    assert_eq!(lookups.len(), 2);
    assert_eq!(lookups[0].id(), Some(42));
    assert_eq!(lookups[1].id(), None);
    assert_eq!(lookups[1].display_name(), "ghost (unavailable/deactivated)");
    // the input list is untouched
    assert_eq!(names.len(), 2);
}

#[tokio::test]
async fn timeline_returns_at_most_count_newest_first() {
    let dir = tempdir().unwrap();
    let (service, _) = service_with(vec![], dir.path());

    let tweets = service.get_user_timeline(42, 5, None).await.unwrap();
    assert_eq!(tweets.len(), 5);
    assert_eq!(tweets[0].id, 30);

    let newer = service.get_user_timeline(42, 50, Some(25)).await.unwrap();
    assert_eq!(newer.len(), 5);
    assert!(newer.iter().all(|t| t.id > 25));
}
