#![forbid(unsafe_code)]

//! Loads a JSON fixture into the catalog database. Useful for demos,
//! integration setups and rebuilding a local instance from an export.

use anyhow::{Context, Result, bail};
use opentube_tools::{
    catalog::{CatalogStore, ChannelRecord, ContentKind, ContentRecord, PlaylistRecord, UserRecord},
    config::{RuntimeOverrides, resolve_runtime_config},
    security::ensure_not_root,
};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

const CATALOG_DB_FILE: &str = "catalog.db";

#[derive(Debug, Clone)]
struct SeedArgs {
    data_root: PathBuf,
    fixture: PathBuf,
}

impl SeedArgs {
    fn parse() -> Result<Self> {
        Self::from_iter(env::args().skip(1))
    }

    #[cfg(test)]
    fn from_slice(values: &[&str]) -> Result<Self> {
        Self::from_iter(values.iter().map(|value| value.to_string()))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut data_root_override: Option<PathBuf> = None;
        let mut fixture: Option<PathBuf> = None;
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--data-root=") {
                data_root_override = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--fixture=") {
                fixture = Some(PathBuf::from(value));
                continue;
            }

            match arg.as_str() {
                "--data-root" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--data-root requires a value"))?;
                    data_root_override = Some(PathBuf::from(value));
                }
                "--fixture" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--fixture requires a value"))?;
                    fixture = Some(PathBuf::from(value));
                }
                _ => {
                    bail!("unknown argument: {arg}");
                }
            }
        }

        let fixture = fixture.ok_or_else(|| anyhow::anyhow!("--fixture is required"))?;
        let config = resolve_runtime_config(RuntimeOverrides {
            data_root: data_root_override,
            ..RuntimeOverrides::default()
        })?;

        Ok(Self {
            data_root: config.data_root,
            fixture,
        })
    }
}

/// Top-level fixture shape. Every section is optional so partial fixtures
/// (say, channels only) work too.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFixture {
    #[serde(default)]
    channels: Vec<ChannelRecord>,
    #[serde(default)]
    videos: Vec<ContentRecord>,
    #[serde(default)]
    shorts: Vec<ContentRecord>,
    #[serde(default)]
    playlists: Vec<PlaylistRecord>,
    #[serde(default)]
    users: Vec<UserRecord>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = SeedArgs::parse()?;
    ensure_not_root("seed_catalog")?;

    let raw = fs::read_to_string(&args.fixture)
        .with_context(|| format!("reading fixture {}", args.fixture.display()))?;
    let fixture: CatalogFixture = serde_json::from_str(&raw)
        .with_context(|| format!("parsing fixture {}", args.fixture.display()))?;

    let db_path = args.data_root.join(CATALOG_DB_FILE);
    let store = CatalogStore::open(&db_path)
        .await
        .context("opening catalog store")?;

    let counts = seed(&store, &fixture).await?;
    println!(
        "seeded {} channels, {} videos, {} shorts, {} playlists, {} users into {}",
        counts.channels,
        counts.videos,
        counts.shorts,
        counts.playlists,
        counts.users,
        db_path.display()
    );

    Ok(())
}

struct SeedCounts {
    channels: usize,
    videos: usize,
    shorts: usize,
    playlists: usize,
    users: usize,
}

async fn seed(store: &CatalogStore, fixture: &CatalogFixture) -> Result<SeedCounts> {
    for channel in &fixture.channels {
        store
            .upsert_channel(channel)
            .await
            .with_context(|| format!("seeding channel {}", channel.id))?;
    }
    for video in &fixture.videos {
        store
            .upsert_content(ContentKind::Video, video)
            .await
            .with_context(|| format!("seeding video {}", video.id))?;
    }
    for short in &fixture.shorts {
        store
            .upsert_content(ContentKind::Short, short)
            .await
            .with_context(|| format!("seeding short {}", short.id))?;
    }
    for playlist in &fixture.playlists {
        store
            .upsert_playlist(playlist)
            .await
            .with_context(|| format!("seeding playlist {}", playlist.id))?;
    }
    for user in &fixture.users {
        store
            .upsert_user(user)
            .await
            .with_context(|| format!("seeding user {}", user.id))?;
    }

    Ok(SeedCounts {
        channels: fixture.channels.len(),
        videos: fixture.videos.len(),
        shorts: fixture.shorts.len(),
        playlists: fixture.playlists.len(),
        users: fixture.users.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentube_tools::catalog::CatalogReader;
    use tempfile::tempdir;

    #[test]
    fn fixture_path_is_required() {
        assert!(SeedArgs::from_slice(&["--data-root", "/tmp/x"]).is_err());
    }

    #[test]
    fn equals_form_arguments_parse() {
        let args =
            SeedArgs::from_slice(&["--data-root=/tmp/x", "--fixture=/tmp/seed.json"]).unwrap();
        assert_eq!(args.data_root, PathBuf::from("/tmp/x"));
        assert_eq!(args.fixture, PathBuf::from("/tmp/seed.json"));
    }

    #[tokio::test]
    async fn seed_round_trips_through_the_reader() {
        let temp = tempdir().unwrap();
        let db_path = temp.path().join(CATALOG_DB_FILE);
        let store = CatalogStore::open(&db_path).await.unwrap();

        let fixture: CatalogFixture = serde_json::from_str(
            r#"{
                "channels": [
                    {"id": "c1", "ownerId": "u1", "name": "Lofi Radio",
                     "category": "Music", "subscriberIds": [], "createdAt": ""}
                ],
                "videos": [
                    {"id": "v1", "channelId": "c1", "title": "Music mix",
                     "createdAt": ""}
                ],
                "users": [
                    {"id": "u1", "username": "ana", "email": "ana@example.com"}
                ]
            }"#,
        )
        .unwrap();

        let counts = seed(&store, &fixture).await.unwrap();
        assert_eq!(counts.channels, 1);
        assert_eq!(counts.videos, 1);
        assert_eq!(counts.users, 1);

        let reader = CatalogReader::new(&db_path).await.unwrap();
        let videos = reader.list_content(ContentKind::Video).await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].channel_id, "c1");
        let channel = reader.get_channel("c1").await.unwrap().unwrap();
        assert_eq!(channel.name, "Lofi Radio");
    }

    #[tokio::test]
    async fn empty_fixture_is_a_no_op() {
        let temp = tempdir().unwrap();
        let store = CatalogStore::open(&temp.path().join(CATALOG_DB_FILE))
            .await
            .unwrap();
        let counts = seed(&store, &CatalogFixture::default()).await.unwrap();
        assert_eq!(counts.videos, 0);
    }
}
