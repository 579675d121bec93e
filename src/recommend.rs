//! Personalized feed partitioning.
//!
//! A user's taste profile is just the words of the titles they watched,
//! liked or saved. Those words become one OR predicate, and the catalog is
//! split into "recommended" (predicate hits, store order) and "remaining"
//! (everything else, newest first). There is no scoring model and nothing is
//! persisted between requests; the partition is recomputed from the catalog
//! snapshot every time.

use std::collections::HashMap;

use anyhow::Result;

use crate::catalog::{CatalogReader, ContentKind, ContentRecord, UserRecord};
use crate::keywords::keywords_from_titles;
use crate::matching::MatchPredicate;

/// Four-way partition returned by the recommendations endpoint. The
/// recommended/remaining halves are complementary by construction: together
/// they cover the catalog and never overlap.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationFeed {
    pub recommended_videos: Vec<ContentRecord>,
    pub recommended_shorts: Vec<ContentRecord>,
    pub remaining_videos: Vec<ContentRecord>,
    pub remaining_shorts: Vec<ContentRecord>,
    pub used_keywords: Vec<String>,
}

/// Collects the title words driving a user's feed: watch history first,
/// then liked videos, liked shorts, saved shorts and saved videos, each in
/// source order, word-split with no dedup. History entries pointing at
/// content that no longer exists contribute nothing; a user with no signals
/// yields an empty list, which downstream means "recommend nothing".
pub fn profile_keywords(
    user: &UserRecord,
    videos: &[ContentRecord],
    shorts: &[ContentRecord],
) -> Vec<String> {
    let video_titles: HashMap<&str, &str> = videos
        .iter()
        .map(|record| (record.id.as_str(), record.title.as_str()))
        .collect();
    let short_titles: HashMap<&str, &str> = shorts
        .iter()
        .map(|record| (record.id.as_str(), record.title.as_str()))
        .collect();

    let mut titles: Vec<&str> = Vec::new();
    for entry in &user.history {
        let resolved = match entry.content_type {
            ContentKind::Video => video_titles.get(entry.content_id.as_str()),
            ContentKind::Short => short_titles.get(entry.content_id.as_str()),
        };
        if let Some(title) = resolved {
            titles.push(title);
        }
    }

    let user_id = user.id.as_str();
    titles.extend(
        videos
            .iter()
            .filter(|record| record.liked_by.iter().any(|id| id == user_id))
            .map(|record| record.title.as_str()),
    );
    titles.extend(
        shorts
            .iter()
            .filter(|record| record.liked_by.iter().any(|id| id == user_id))
            .map(|record| record.title.as_str()),
    );
    titles.extend(
        shorts
            .iter()
            .filter(|record| record.saved_by.iter().any(|id| id == user_id))
            .map(|record| record.title.as_str()),
    );
    titles.extend(
        videos
            .iter()
            .filter(|record| record.saved_by.iter().any(|id| id == user_id))
            .map(|record| record.title.as_str()),
    );

    keywords_from_titles(titles)
}

/// Partitions newest-first catalog listings against the user's profile.
/// Pure; the caller supplies the snapshot.
pub fn build_feed(
    user: &UserRecord,
    videos: Vec<ContentRecord>,
    shorts: Vec<ContentRecord>,
) -> RecommendationFeed {
    let used_keywords = profile_keywords(user, &videos, &shorts);
    let predicate = MatchPredicate::new(&used_keywords);

    let (recommended_videos, remaining_videos): (Vec<_>, Vec<_>) = videos
        .into_iter()
        .partition(|record| predicate.matches_content(record));
    let (recommended_shorts, remaining_shorts): (Vec<_>, Vec<_>) = shorts
        .into_iter()
        .partition(|record| predicate.matches_content_title_tags(record));

    RecommendationFeed {
        recommended_videos,
        recommended_shorts,
        remaining_videos,
        remaining_shorts,
        used_keywords,
    }
}

/// Store-reading wrapper used by the backend. Returns `None` for an unknown
/// user; store failures fail the whole operation (no partial feeds).
pub async fn recommendations_for_user(
    reader: &CatalogReader,
    user_id: &str,
) -> Result<Option<RecommendationFeed>> {
    let Some(user) = reader.get_user(user_id).await? else {
        return Ok(None);
    };
    let videos = reader.list_content(ContentKind::Video).await?;
    let shorts = reader.list_content(ContentKind::Short).await?;
    Ok(Some(build_feed(&user, videos, shorts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::HistoryEntry;
    use std::collections::HashSet;

    fn content(id: &str, title: &str) -> ContentRecord {
        ContentRecord {
            id: id.into(),
            channel_id: "chan".into(),
            title: title.into(),
            description: String::new(),
            tags: Vec::new(),
            view_count: 0,
            liked_by: Vec::new(),
            disliked_by: Vec::new(),
            saved_by: Vec::new(),
            created_at: String::new(),
        }
    }

    fn user(id: &str) -> UserRecord {
        UserRecord {
            id: id.into(),
            username: id.into(),
            email: format!("{id}@example.com"),
            history: Vec::new(),
        }
    }

    fn watched(content_id: &str, kind: ContentKind) -> HistoryEntry {
        HistoryEntry {
            content_id: content_id.into(),
            content_type: kind,
            watched_at: "2024-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn history_keywords_come_before_liked_and_saved() {
        let mut viewer = user("u1");
        viewer.history.push(watched("v1", ContentKind::Video));

        let mut liked = content("v2", "Dog Park");
        liked.liked_by.push("u1".into());
        let mut saved = content("v3", "Bird Watching");
        saved.saved_by.push("u1".into());
        let videos = vec![content("v1", "Cats 101"), liked, saved];

        let keywords = profile_keywords(&viewer, &videos, &[]);
        assert_eq!(
            keywords,
            vec!["Cats", "101", "Dog", "Park", "Bird", "Watching"]
        );
    }

    #[test]
    fn dangling_history_entries_contribute_nothing() {
        let mut viewer = user("u1");
        viewer.history.push(watched("deleted", ContentKind::Video));
        let keywords = profile_keywords(&viewer, &[content("v1", "Cats")], &[]);
        assert!(keywords.is_empty());
    }

    #[test]
    fn other_users_signals_are_ignored() {
        let mut liked_by_someone_else = content("v1", "Dog Park");
        liked_by_someone_else.liked_by.push("u2".into());
        let keywords = profile_keywords(&user("u1"), &[liked_by_someone_else], &[]);
        assert!(keywords.is_empty());
    }

    /// Recommended and remaining are disjoint and together cover the whole
    /// catalog, for videos and shorts alike.
    #[test]
    fn partition_is_complete_and_disjoint() {
        let mut viewer = user("u1");
        viewer.history.push(watched("v1", ContentKind::Video));

        let videos = vec![
            content("v1", "Cat Compilation"),
            content("v2", "Cat Tricks"),
            content("v3", "Woodworking"),
        ];
        let shorts = vec![content("s1", "Quick Cat Clip"), content("s2", "Car Clip")];

        let feed = build_feed(&viewer, videos.clone(), shorts.clone());

        let recommended: HashSet<&str> = feed
            .recommended_videos
            .iter()
            .map(|record| record.id.as_str())
            .collect();
        let remaining: HashSet<&str> = feed
            .remaining_videos
            .iter()
            .map(|record| record.id.as_str())
            .collect();
        assert!(recommended.is_disjoint(&remaining));
        let all: HashSet<&str> = videos.iter().map(|record| record.id.as_str()).collect();
        let union: HashSet<&str> = recommended.union(&remaining).copied().collect();
        assert_eq!(union, all);

        assert_eq!(
            feed.recommended_shorts.len() + feed.remaining_shorts.len(),
            shorts.len()
        );
    }

    /// A brand-new user gets an empty recommended set and the full catalog
    /// as "remaining", in the order the listing arrived (newest first).
    #[test]
    fn cold_start_returns_full_catalog_as_remaining() {
        let videos = vec![content("v-new", "Newest"), content("v-old", "Oldest")];
        let feed = build_feed(&user("fresh"), videos, vec![content("s1", "A Short")]);

        assert!(feed.recommended_videos.is_empty());
        assert!(feed.recommended_shorts.is_empty());
        assert!(feed.used_keywords.is_empty());
        let remaining: Vec<&str> = feed
            .remaining_videos
            .iter()
            .map(|record| record.id.as_str())
            .collect();
        assert_eq!(remaining, vec!["v-new", "v-old"]);
        assert_eq!(feed.remaining_shorts.len(), 1);
    }

    /// Profile words hit shorts through title and tags only; a short whose
    /// description mentions the keyword stays in "remaining".
    #[test]
    fn shorts_match_on_title_and_tags_only() {
        let mut viewer = user("u1");
        viewer.history.push(watched("v1", ContentKind::Video));
        let videos = vec![content("v1", "Cooking")];

        let mut desc_only = content("s1", "Untitled");
        desc_only.description = "cooking tips".into();
        let mut tagged = content("s2", "Other");
        tagged.tags = vec!["cooking".into()];

        let feed = build_feed(&viewer, videos, vec![desc_only, tagged]);
        let recommended: Vec<&str> = feed
            .recommended_shorts
            .iter()
            .map(|record| record.id.as_str())
            .collect();
        assert_eq!(recommended, vec!["s2"]);
    }
}
