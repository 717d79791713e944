use anyhow::Context;
use clap::{Parser, Subcommand};
use follower_watch::service::{unavailable_placeholder, FollowerSnapshotService, Lookup};
use follower_watch::store::SnapshotStore;
use follower_watch::twitter::v1::TwitterClientV1;
use follower_watch::twitter::v2::TwitterClientV2;
use follower_watch::twitter::{Authentication, TwitterClient, UserRef};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Parser, Debug)]
#[clap(version)]
struct Args {
    /// Path to the authentication details file (falls back to TWITTER_*
    /// environment variables when the file does not exist)
    #[clap(short, long, default_value = "./auth.json")]
    auth: PathBuf,
    /// Directory where follower snapshot files are kept
    #[clap(short, long, default_value = "./")]
    out: PathBuf,
    /// Use Twitter API 2 (requires a bearer token)
    #[clap(long)]
    api_v2: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Diff the live follower set against the last stored snapshot
    Compare {
        /// User to compare, by numeric id or screen name
        user: String,
    },
    /// Look up profiles for the given users
    Profiles {
        /// Users to resolve (comma separated ids or screen names)
        users: String,
    },
    /// Print a user's most recent tweets
    Timeline {
        /// User whose timeline to fetch, by numeric id or screen name
        user: String,
        /// Maximum number of tweets to print
        #[clap(long, default_value_t = 20)]
        count: usize,
        /// Only fetch tweets newer than this id
        #[clap(long)]
        since_id: Option<u64>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = main2().await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn main2() -> anyhow::Result<()> {
    env_logger::init();
    let args: Args = Args::parse();
    let auth = load_authentication(&args.auth).await?;

    let client: Box<dyn TwitterClient> = if args.api_v2 {
        log::info!("Using Twitter API v2");
        Box::new(TwitterClientV2::new(&auth)?)
    } else {
        log::info!("Using Twitter API v1.1");
        Box::new(TwitterClientV1::new(&auth))
    };
    let service = FollowerSnapshotService::new(client, SnapshotStore::new(&args.out));

    match args.command {
        Command::Compare { user } => compare(&service, &user).await,
        Command::Profiles { users } => profiles(&service, &users).await,
        Command::Timeline {
            user,
            count,
            since_id,
        } => timeline(&service, &user, count, since_id).await,
    }
}

async fn load_authentication(path: &Path) -> anyhow::Result<Authentication> {
    match fs::read_to_string(path).await {
        Ok(auth) => serde_json::from_str(&auth).context("Unable to deserialize auth file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::info!("No auth file at {}, using environment", path.display());
            Authentication::from_env()
        }
        Err(e) => Err(e).context("Unable to read auth file"),
    }
}

async fn compare(service: &FollowerSnapshotService, user: &str) -> anyhow::Result<()> {
    let diff = service.compare_followers(&UserRef::parse(user)).await?;
    println!("Current followers: {}", diff.followers_count);
    if diff.new_followers.is_empty() && diff.unfollowers.is_empty() {
        println!("No changes since the last snapshot");
        return Ok(());
    }
    print_named_ids(service, "+", &diff.new_followers.iter().copied().collect::<Vec<_>>()).await?;
    print_named_ids(service, "-", &diff.unfollowers.iter().copied().collect::<Vec<_>>()).await?;
    Ok(())
}

async fn print_named_ids(
    service: &FollowerSnapshotService,
    prefix: &str,
    ids: &[u64],
) -> anyhow::Result<()> {
    let names = service.get_names_from_ids(ids).await?;
    for (id, name) in ids.iter().zip(names) {
        println!("{} {} ({})", prefix, id, name);
    }
    Ok(())
}

async fn profiles(service: &FollowerSnapshotService, users: &str) -> anyhow::Result<()> {
    let identifiers: Vec<String> = users.split(',').map(|s| s.trim().to_string()).collect();
    for lookup in service.get_user_profiles(&identifiers).await? {
        match lookup {
            Lookup::Found(profile) => println!(
                "{} @{} ({}): {} followers",
                profile.name, profile.screen_name, profile.id, profile.followers_count
            ),
            Lookup::Unavailable(identifier) => {
                println!("{}", unavailable_placeholder(&identifier))
            }
        }
    }
    Ok(())
}

async fn timeline(
    service: &FollowerSnapshotService,
    user: &str,
    count: usize,
    since_id: Option<u64>,
) -> anyhow::Result<()> {
    let profile = match service.get_user_profiles(&[user.to_string()]).await?.remove(0) {
        Lookup::Found(profile) => profile,
        Lookup::Unavailable(identifier) => {
            anyhow::bail!("Unable to find user: {}", identifier)
        }
    };
    for tweet in service
        .get_user_timeline(profile.id, count, since_id)
        .await?
    {
        println!("[{}] {}", tweet.id, tweet.text);
    }
    Ok(())
}
