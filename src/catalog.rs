//! Catalog persistence layer for OpenTube.
//!
//! All structs in this module mirror how catalog documents are serialized to
//! disk and exposed to the API. Array-valued fields (tags, membership sets,
//! watch history) are stored as JSON text columns so the tables stay close to
//! the document shapes the frontend consumes.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Row, params};
use serde::{Deserialize, Serialize};

/// Distinguishes the two content tables. Videos and shorts share a schema but
/// live in separate collections with separate feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Video,
    Short,
}

impl ContentKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Video => "videos",
            Self::Short => "shorts",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "video" | "videos" => Some(Self::Video),
            "short" | "shorts" => Some(Self::Short),
            _ => None,
        }
    }
}

/// Rows stored in the `videos` and `shorts` tables.
///
/// `liked_by` and `disliked_by` are kept disjoint by the toggle operations;
/// nothing else writes those columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub view_count: i64,
    #[serde(default)]
    pub liked_by: Vec<String>,
    #[serde(default)]
    pub disliked_by: Vec<String>,
    #[serde(default)]
    pub saved_by: Vec<String>,
    #[serde(default)]
    pub created_at: String,
}

/// Rows stored in the `channels` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner_url: Option<String>,
    #[serde(default)]
    pub subscriber_ids: Vec<String>,
    #[serde(default)]
    pub created_at: String,
}

/// Rows stored in the `playlists` table. `video_ids` reference the `videos`
/// table; resolution to full records happens at the API layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistRecord {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub video_ids: Vec<String>,
    #[serde(default)]
    pub saved_by: Vec<String>,
    #[serde(default)]
    pub created_at: String,
}

/// One watch-history entry. Re-watching replaces the previous entry for the
/// same content, so the list holds at most one entry per item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub content_id: String,
    pub content_type: ContentKind,
    pub watched_at: String,
}

/// Rows stored in the `users` table. Credentials and tokens are handled by
/// an external identity layer; only what the matching core needs lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// RFC 3339 timestamp used for `created_at` and `watched_at` columns.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

async fn configure_connection(conn: &Connection) -> Result<()> {
    // `execute_batch` rejects statements that return rows (e.g. the
    // `journal_mode` pragma), so issue each pragma through `query`.
    conn.query("PRAGMA journal_mode=WAL", params![]).await?;
    conn.query("PRAGMA synchronous=NORMAL", params![]).await?;
    conn.query("PRAGMA foreign_keys=ON", params![]).await?;
    Ok(())
}

async fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS channels (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT DEFAULT '',
            description TEXT DEFAULT '',
            avatar_url TEXT,
            banner_url TEXT,
            subscriber_ids_json TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS videos (
            id TEXT PRIMARY KEY,
            channel_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT DEFAULT '',
            tags_json TEXT NOT NULL DEFAULT '[]',
            view_count INTEGER NOT NULL DEFAULT 0,
            liked_by_json TEXT NOT NULL DEFAULT '[]',
            disliked_by_json TEXT NOT NULL DEFAULT '[]',
            saved_by_json TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS shorts (
            id TEXT PRIMARY KEY,
            channel_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT DEFAULT '',
            tags_json TEXT NOT NULL DEFAULT '[]',
            view_count INTEGER NOT NULL DEFAULT 0,
            liked_by_json TEXT NOT NULL DEFAULT '[]',
            disliked_by_json TEXT NOT NULL DEFAULT '[]',
            saved_by_json TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS playlists (
            id TEXT PRIMARY KEY,
            channel_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT DEFAULT '',
            video_ids_json TEXT NOT NULL DEFAULT '[]',
            saved_by_json TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            email TEXT NOT NULL,
            history_json TEXT NOT NULL DEFAULT '[]'
        );

        CREATE INDEX IF NOT EXISTS idx_videos_channel ON videos(channel_id);
        CREATE INDEX IF NOT EXISTS idx_shorts_channel ON shorts(channel_id);
        CREATE INDEX IF NOT EXISTS idx_playlists_channel ON playlists(channel_id);
        "#,
    )
    .await?;
    Ok(())
}

/// Wrapper around the SQLite-compatible connection that performs write
/// operations: upserts from the seeding helper plus the toggle/history
/// mutations the API exposes.
pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    /// Opens (and if necessary creates) the catalog DB and ensures the
    /// expected schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating catalog directory {}", parent.display()))?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("opening catalog DB {}", path.display()))?;

        let conn = db.connect()?;
        configure_connection(&conn).await?;
        ensure_schema(&conn).await?;
        Ok(Self { conn })
    }

    pub async fn upsert_channel(&self, record: &ChannelRecord) -> Result<()> {
        let subscriber_ids_json =
            serde_json::to_string(&record.subscriber_ids).context("serializing subscribers")?;
        let created_at = non_empty_or_now(&record.created_at);

        self.conn
            .execute(
                r#"
                INSERT INTO channels (
                    id, owner_id, name, category, description,
                    avatar_url, banner_url, subscriber_ids_json, created_at
                ) VALUES (
                    :id, :owner_id, :name, :category, :description,
                    :avatar_url, :banner_url, :subscriber_ids_json, :created_at
                )
                ON CONFLICT(id) DO UPDATE SET
                    owner_id = excluded.owner_id,
                    name = excluded.name,
                    category = excluded.category,
                    description = excluded.description,
                    avatar_url = excluded.avatar_url,
                    banner_url = excluded.banner_url,
                    subscriber_ids_json = excluded.subscriber_ids_json
                "#,
                params![
                    record.id.as_str(),
                    record.owner_id.as_str(),
                    record.name.as_str(),
                    record.category.as_str(),
                    record.description.as_str(),
                    record.avatar_url.as_deref(),
                    record.banner_url.as_deref(),
                    subscriber_ids_json,
                    created_at,
                ],
            )
            .await?;

        Ok(())
    }

    /// Shared upsert for the `videos` and `shorts` tables.
    pub async fn upsert_content(&self, kind: ContentKind, record: &ContentRecord) -> Result<()> {
        let tags_json = serde_json::to_string(&record.tags).context("serializing tags")?;
        let liked_by_json =
            serde_json::to_string(&record.liked_by).context("serializing likes")?;
        let disliked_by_json =
            serde_json::to_string(&record.disliked_by).context("serializing dislikes")?;
        let saved_by_json =
            serde_json::to_string(&record.saved_by).context("serializing saves")?;
        let created_at = non_empty_or_now(&record.created_at);
        let table = kind.table();

        self.conn
            .execute(
                &format!(
                    r#"
                    INSERT INTO {table} (
                        id, channel_id, title, description, tags_json, view_count,
                        liked_by_json, disliked_by_json, saved_by_json, created_at
                    ) VALUES (
                        :id, :channel_id, :title, :description, :tags_json, :view_count,
                        :liked_by_json, :disliked_by_json, :saved_by_json, :created_at
                    )
                    ON CONFLICT(id) DO UPDATE SET
                        channel_id = excluded.channel_id,
                        title = excluded.title,
                        description = excluded.description,
                        tags_json = excluded.tags_json,
                        view_count = excluded.view_count,
                        liked_by_json = excluded.liked_by_json,
                        disliked_by_json = excluded.disliked_by_json,
                        saved_by_json = excluded.saved_by_json
                    "#,
                ),
                params![
                    record.id.as_str(),
                    record.channel_id.as_str(),
                    record.title.as_str(),
                    record.description.as_str(),
                    tags_json,
                    record.view_count,
                    liked_by_json,
                    disliked_by_json,
                    saved_by_json,
                    created_at,
                ],
            )
            .await?;

        Ok(())
    }

    pub async fn upsert_playlist(&self, record: &PlaylistRecord) -> Result<()> {
        let video_ids_json =
            serde_json::to_string(&record.video_ids).context("serializing playlist videos")?;
        let saved_by_json =
            serde_json::to_string(&record.saved_by).context("serializing saves")?;
        let created_at = non_empty_or_now(&record.created_at);

        self.conn
            .execute(
                r#"
                INSERT INTO playlists (
                    id, channel_id, title, description,
                    video_ids_json, saved_by_json, created_at
                ) VALUES (
                    :id, :channel_id, :title, :description,
                    :video_ids_json, :saved_by_json, :created_at
                )
                ON CONFLICT(id) DO UPDATE SET
                    channel_id = excluded.channel_id,
                    title = excluded.title,
                    description = excluded.description,
                    video_ids_json = excluded.video_ids_json,
                    saved_by_json = excluded.saved_by_json
                "#,
                params![
                    record.id.as_str(),
                    record.channel_id.as_str(),
                    record.title.as_str(),
                    record.description.as_str(),
                    video_ids_json,
                    saved_by_json,
                    created_at,
                ],
            )
            .await?;

        Ok(())
    }

    pub async fn upsert_user(&self, record: &UserRecord) -> Result<()> {
        let history_json =
            serde_json::to_string(&record.history).context("serializing history")?;

        self.conn
            .execute(
                r#"
                INSERT INTO users (id, username, email, history_json)
                VALUES (:id, :username, :email, :history_json)
                ON CONFLICT(id) DO UPDATE SET
                    username = excluded.username,
                    email = excluded.email,
                    history_json = excluded.history_json
                "#,
                params![
                    record.id.as_str(),
                    record.username.as_str(),
                    record.email.as_str(),
                    history_json,
                ],
            )
            .await?;

        Ok(())
    }

    /// Toggles `user_id` in the like set. Adding a like always removes the
    /// user from the dislike set so the two stay disjoint.
    pub async fn toggle_like(
        &self,
        kind: ContentKind,
        content_id: &str,
        user_id: &str,
    ) -> Result<ContentRecord> {
        let mut record = self.require_content(kind, content_id).await?;
        if let Some(pos) = record.liked_by.iter().position(|id| id == user_id) {
            record.liked_by.remove(pos);
        } else {
            record.liked_by.push(user_id.to_owned());
            record.disliked_by.retain(|id| id != user_id);
        }
        self.write_reaction_sets(kind, &record).await?;
        Ok(record)
    }

    /// Mirror image of [`CatalogStore::toggle_like`] for the dislike set.
    pub async fn toggle_dislike(
        &self,
        kind: ContentKind,
        content_id: &str,
        user_id: &str,
    ) -> Result<ContentRecord> {
        let mut record = self.require_content(kind, content_id).await?;
        if let Some(pos) = record.disliked_by.iter().position(|id| id == user_id) {
            record.disliked_by.remove(pos);
        } else {
            record.disliked_by.push(user_id.to_owned());
            record.liked_by.retain(|id| id != user_id);
        }
        self.write_reaction_sets(kind, &record).await?;
        Ok(record)
    }

    pub async fn toggle_save(
        &self,
        kind: ContentKind,
        content_id: &str,
        user_id: &str,
    ) -> Result<ContentRecord> {
        let mut record = self.require_content(kind, content_id).await?;
        if let Some(pos) = record.saved_by.iter().position(|id| id == user_id) {
            record.saved_by.remove(pos);
        } else {
            record.saved_by.push(user_id.to_owned());
        }
        self.write_reaction_sets(kind, &record).await?;
        Ok(record)
    }

    pub async fn toggle_subscription(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<ChannelRecord> {
        let mut channel = fetch_channel(&self.conn, channel_id)
            .await?
            .ok_or_else(|| anyhow!("channel {channel_id} not found"))?;
        if let Some(pos) = channel.subscriber_ids.iter().position(|id| id == user_id) {
            channel.subscriber_ids.remove(pos);
        } else {
            channel.subscriber_ids.push(user_id.to_owned());
        }
        let subscriber_ids_json =
            serde_json::to_string(&channel.subscriber_ids).context("serializing subscribers")?;
        self.conn
            .execute(
                "UPDATE channels SET subscriber_ids_json = ?1 WHERE id = ?2",
                params![subscriber_ids_json, channel_id],
            )
            .await?;
        Ok(channel)
    }

    pub async fn increment_view_count(&self, kind: ContentKind, content_id: &str) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "UPDATE {} SET view_count = view_count + 1 WHERE id = ?1",
                    kind.table()
                ),
                params![content_id],
            )
            .await?;
        Ok(())
    }

    /// Appends a watch-history entry with a fresh timestamp. Any previous
    /// entry for the same content is removed first, so history keeps
    /// most-recent-per-item semantics rather than a full log.
    pub async fn record_watch(
        &self,
        user_id: &str,
        content_id: &str,
        kind: ContentKind,
    ) -> Result<()> {
        let mut user = fetch_user(&self.conn, user_id)
            .await?
            .ok_or_else(|| anyhow!("user {user_id} not found"))?;

        user.history
            .retain(|entry| !(entry.content_id == content_id && entry.content_type == kind));
        user.history.push(HistoryEntry {
            content_id: content_id.to_owned(),
            content_type: kind,
            watched_at: now_timestamp(),
        });

        let history_json = serde_json::to_string(&user.history).context("serializing history")?;
        self.conn
            .execute(
                "UPDATE users SET history_json = ?1 WHERE id = ?2",
                params![history_json, user_id],
            )
            .await?;
        Ok(())
    }

    async fn require_content(&self, kind: ContentKind, content_id: &str) -> Result<ContentRecord> {
        fetch_content(&self.conn, kind, content_id)
            .await?
            .ok_or_else(|| anyhow!("{} {content_id} not found", kind.table()))
    }

    async fn write_reaction_sets(&self, kind: ContentKind, record: &ContentRecord) -> Result<()> {
        let liked_by_json =
            serde_json::to_string(&record.liked_by).context("serializing likes")?;
        let disliked_by_json =
            serde_json::to_string(&record.disliked_by).context("serializing dislikes")?;
        let saved_by_json =
            serde_json::to_string(&record.saved_by).context("serializing saves")?;
        self.conn
            .execute(
                &format!(
                    r#"
                    UPDATE {} SET
                        liked_by_json = ?1,
                        disliked_by_json = ?2,
                        saved_by_json = ?3
                    WHERE id = ?4
                    "#,
                    kind.table()
                ),
                params![
                    liked_by_json,
                    disliked_by_json,
                    saved_by_json,
                    record.id.as_str()
                ],
            )
            .await?;
        Ok(())
    }
}

/// Read-only handle used by the backend. Listings come back newest-first so
/// the "remaining" half of the recommendation response can be served without
/// re-sorting.
#[derive(Clone)]
pub struct CatalogReader {
    conn: Connection,
}

impl CatalogReader {
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = Builder::new_local(path.as_ref())
            .build()
            .await
            .with_context(|| format!("opening catalog DB {}", path.as_ref().display()))?;
        let conn = db.connect()?;
        configure_connection(&conn).await?;
        ensure_schema(&conn).await?;
        Ok(Self { conn })
    }

    pub async fn list_content(&self, kind: ContentKind) -> Result<Vec<ContentRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                r#"
                SELECT id, channel_id, title, description, tags_json, view_count,
                       liked_by_json, disliked_by_json, saved_by_json, created_at
                FROM {}
                ORDER BY datetime(created_at) DESC, rowid DESC
                "#,
                kind.table()
            ))
            .await?;

        let mut rows = stmt.query(params![]).await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_content(&row)?);
        }
        Ok(records)
    }

    pub async fn get_content(
        &self,
        kind: ContentKind,
        content_id: &str,
    ) -> Result<Option<ContentRecord>> {
        fetch_content(&self.conn, kind, content_id).await
    }

    pub async fn list_channels(&self) -> Result<Vec<ChannelRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT id, owner_id, name, category, description,
                       avatar_url, banner_url, subscriber_ids_json, created_at
                FROM channels
                ORDER BY datetime(created_at) DESC, rowid DESC
                "#,
            )
            .await?;

        let mut rows = stmt.query(params![]).await?;
        let mut channels = Vec::new();
        while let Some(row) = rows.next().await? {
            channels.push(row_to_channel(&row)?);
        }
        Ok(channels)
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<Option<ChannelRecord>> {
        fetch_channel(&self.conn, channel_id).await
    }

    pub async fn list_playlists(&self) -> Result<Vec<PlaylistRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                r#"
                SELECT id, channel_id, title, description,
                       video_ids_json, saved_by_json, created_at
                FROM playlists
                ORDER BY datetime(created_at) DESC, rowid DESC
                "#,
            )
            .await?;

        let mut rows = stmt.query(params![]).await?;
        let mut playlists = Vec::new();
        while let Some(row) = rows.next().await? {
            playlists.push(row_to_playlist(&row)?);
        }
        Ok(playlists)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>> {
        fetch_user(&self.conn, user_id).await
    }

    /// Watch history for a user, most recent first.
    pub async fn history(&self, user_id: &str) -> Result<Vec<HistoryEntry>> {
        let user = fetch_user(&self.conn, user_id)
            .await?
            .ok_or_else(|| anyhow!("user {user_id} not found"))?;
        let mut entries = user.history;
        entries.sort_by_key(|entry| {
            std::cmp::Reverse(
                DateTime::parse_from_rfc3339(&entry.watched_at)
                    .map(|time| time.with_timezone(&Utc))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            )
        });
        Ok(entries)
    }

    /// SQLite bumps this counter whenever another connection commits, which
    /// lets the backend invalidate its list cache cheaply.
    pub async fn data_version(&self) -> Result<i64> {
        let mut rows = self.conn.query("PRAGMA data_version", params![]).await?;
        let row = rows.next().await?.context("missing data_version row")?;
        Ok(row.get(0)?)
    }
}

fn non_empty_or_now(created_at: &str) -> String {
    if created_at.trim().is_empty() {
        now_timestamp()
    } else {
        created_at.to_owned()
    }
}

async fn fetch_content(
    conn: &Connection,
    kind: ContentKind,
    content_id: &str,
) -> Result<Option<ContentRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            r#"
            SELECT id, channel_id, title, description, tags_json, view_count,
                   liked_by_json, disliked_by_json, saved_by_json, created_at
            FROM {}
            WHERE id = ?1
            "#,
            kind.table()
        ))
        .await?;

    let mut rows = stmt.query([content_id]).await?;
    if let Some(row) = rows.next().await? {
        Ok(Some(row_to_content(&row)?))
    } else {
        Ok(None)
    }
}

async fn fetch_channel(conn: &Connection, channel_id: &str) -> Result<Option<ChannelRecord>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT id, owner_id, name, category, description,
                   avatar_url, banner_url, subscriber_ids_json, created_at
            FROM channels
            WHERE id = ?1
            "#,
        )
        .await?;

    let mut rows = stmt.query([channel_id]).await?;
    if let Some(row) = rows.next().await? {
        Ok(Some(row_to_channel(&row)?))
    } else {
        Ok(None)
    }
}

async fn fetch_user(conn: &Connection, user_id: &str) -> Result<Option<UserRecord>> {
    let mut stmt = conn
        .prepare("SELECT id, username, email, history_json FROM users WHERE id = ?1")
        .await?;

    let mut rows = stmt.query([user_id]).await?;
    if let Some(row) = rows.next().await? {
        Ok(Some(row_to_user(&row)?))
    } else {
        Ok(None)
    }
}

/// Converts a SQL row into a `ContentRecord`, deserializing the JSON fields.
fn row_to_content(row: &Row) -> Result<ContentRecord> {
    // Column order must match the SELECT statements above.
    let tags_json: String = row.get(4)?;
    let liked_by_json: String = row.get(6)?;
    let disliked_by_json: String = row.get(7)?;
    let saved_by_json: String = row.get(8)?;

    let tags: Vec<String> = serde_json::from_str(&tags_json).context("parsing stored tags")?;
    let liked_by: Vec<String> =
        serde_json::from_str(&liked_by_json).context("parsing stored likes")?;
    let disliked_by: Vec<String> =
        serde_json::from_str(&disliked_by_json).context("parsing stored dislikes")?;
    let saved_by: Vec<String> =
        serde_json::from_str(&saved_by_json).context("parsing stored saves")?;

    Ok(ContentRecord {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        tags,
        view_count: row.get(5)?,
        liked_by,
        disliked_by,
        saved_by,
        created_at: row.get(9)?,
    })
}

fn row_to_channel(row: &Row) -> Result<ChannelRecord> {
    let subscriber_ids_json: String = row.get(7)?;
    let subscriber_ids: Vec<String> =
        serde_json::from_str(&subscriber_ids_json).context("parsing stored subscribers")?;

    Ok(ChannelRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        avatar_url: row.get(5)?,
        banner_url: row.get(6)?,
        subscriber_ids,
        created_at: row.get(8)?,
    })
}

fn row_to_playlist(row: &Row) -> Result<PlaylistRecord> {
    let video_ids_json: String = row.get(4)?;
    let saved_by_json: String = row.get(5)?;
    let video_ids: Vec<String> =
        serde_json::from_str(&video_ids_json).context("parsing stored playlist videos")?;
    let saved_by: Vec<String> =
        serde_json::from_str(&saved_by_json).context("parsing stored saves")?;

    Ok(PlaylistRecord {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        video_ids,
        saved_by,
        created_at: row.get(6)?,
    })
}

fn row_to_user(row: &Row) -> Result<UserRecord> {
    let history_json: String = row.get(3)?;
    // An undecodable history column reads as an empty history; the next
    // recorded watch rewrites the column.
    let history: Vec<HistoryEntry> = serde_json::from_str(&history_json).unwrap_or_default();

    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        history,
    })
}
