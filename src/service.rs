use crate::model::{FollowerSnapshot, Tweet, UserProfile};
use crate::store::SnapshotStore;
use crate::twitter::{ClientError, TwitterClient, UserRef};
use anyhow::Context;
use std::collections::BTreeSet;

/// Outcome of one lookup within a batch request. Unavailable accounts are
/// recorded instead of aborting the rest of the batch.
#[derive(Debug, Clone)]
pub enum Lookup {
    Found(UserProfile),
    Unavailable(String),
}

impl Lookup {
    /// The user's display name, or the placeholder marker for accounts that
    /// could not be resolved.
    pub fn display_name(&self) -> String {
        match self {
            Lookup::Found(profile) => profile.name.clone(),
            Lookup::Unavailable(identifier) => unavailable_placeholder(identifier),
        }
    }

    pub fn id(&self) -> Option<u64> {
        match self {
            Lookup::Found(profile) => Some(profile.id),
            Lookup::Unavailable(_) => None,
        }
    }
}

pub fn unavailable_placeholder(identifier: &str) -> String {
    format!("{identifier} (unavailable/deactivated)")
}

/// Result of comparing the live follower set against the last stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowerDiff {
    /// Ids present in the previous snapshot but gone from the current fetch
    pub unfollowers: BTreeSet<u64>,
    /// Ids present in the current fetch but absent from the previous snapshot
    pub new_followers: BTreeSet<u64>,
    pub followers_count: usize,
}

pub struct FollowerSnapshotService {
    client: Box<dyn TwitterClient>,
    store: SnapshotStore,
}

impl FollowerSnapshotService {
    pub fn new(client: Box<dyn TwitterClient>, store: SnapshotStore) -> Self {
        Self { client, store }
    }

    /// Resolve every identifier, in input order. Unavailable accounts degrade
    /// to `Lookup::Unavailable`; any other client failure aborts the batch.
    pub async fn get_user_profiles(&self, identifiers: &[String]) -> anyhow::Result<Vec<Lookup>> {
        let mut profiles = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            profiles.push(self.lookup(&UserRef::parse(identifier)).await?);
        }
        Ok(profiles)
    }

    /// Display names for a batch of numeric ids. Failed lookups yield the
    /// placeholder string in the result list.
    pub async fn get_names_from_ids(&self, user_ids: &[u64]) -> anyhow::Result<Vec<String>> {
        let mut names = Vec::with_capacity(user_ids.len());
        for &user_id in user_ids {
            names.push(self.lookup(&UserRef::Id(user_id)).await?.display_name());
        }
        Ok(names)
    }

    /// Ids for a batch of screen names. Failed lookups are tagged in the
    /// result list, never mixed back into the input.
    pub async fn get_ids_from_names(&self, user_names: &[String]) -> anyhow::Result<Vec<Lookup>> {
        let mut ids = Vec::with_capacity(user_names.len());
        for user_name in user_names {
            ids.push(
                self.lookup(&UserRef::ScreenName(user_name.clone()))
                    .await?,
            );
        }
        Ok(ids)
    }

    async fn lookup(&self, user: &UserRef) -> anyhow::Result<Lookup> {
        log::debug!("Getting data for user {}", user);
        match self.client.get_user(user).await {
            Ok(profile) => Ok(Lookup::Found(profile)),
            Err(ClientError::UserUnavailable(identifier)) => {
                log::debug!("Failed to get user info for {}", identifier);
                Ok(Lookup::Unavailable(identifier))
            }
            Err(e) => Err(e).context("Unable to look up user"),
        }
    }

    /// The user's complete follower-id set, sorted ascending so downstream
    /// set comparisons are deterministic.
    pub async fn get_follower_ids(&self, user_id: u64) -> anyhow::Result<Vec<u64>> {
        let mut ids = self
            .client
            .get_follower_ids(user_id)
            .await
            .context("Unable to fetch follower ids")?;
        ids.sort_unstable();
        Ok(ids)
    }

    /// Up to `count` of the user's most recent tweets, newest first.
    pub async fn get_user_timeline(
        &self,
        user_id: u64,
        count: usize,
        since_id: Option<u64>,
    ) -> anyhow::Result<Vec<Tweet>> {
        self.client
            .get_user_timeline(user_id, count, since_id)
            .await
            .context("Unable to fetch timeline")
    }

    /// Fetch the live follower set, diff it against the most recent stored
    /// snapshot and append a new snapshot record. On the first run for a user
    /// every current follower counts as new.
    pub async fn compare_followers(&self, user: &UserRef) -> anyhow::Result<FollowerDiff> {
        let profile = self
            .client
            .get_user(user)
            .await
            .context("Unable to resolve user")?;
        let current_ids = self.get_follower_ids(profile.id).await?;
        log::info!(
            "Comparing followers for {} ({} current followers)",
            profile.name,
            current_ids.len()
        );
        let snapshot = FollowerSnapshot::capture(&profile, current_ids.clone());

        let previous = self
            .store
            .read_last(profile.id, &profile.name)
            .await
            .context("Unable to read snapshot store")?;
        let (unfollowers, new_followers) = match previous {
            Some(previous) => {
                let previous: BTreeSet<u64> = previous.followers_ids.into_iter().collect();
                let current: BTreeSet<u64> = current_ids.iter().copied().collect();
                (
                    previous.difference(&current).copied().collect(),
                    current.difference(&previous).copied().collect(),
                )
            }
            None => {
                log::info!("No previous snapshot for {}, treating as first run", profile.name);
                (BTreeSet::new(), current_ids.iter().copied().collect())
            }
        };

        self.store
            .append(&snapshot)
            .await
            .context("Unable to append snapshot")?;

        Ok(FollowerDiff {
            unfollowers,
            new_followers,
            followers_count: current_ids.len(),
        })
    }
}
