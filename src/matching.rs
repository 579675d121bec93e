//! Keyword predicate construction and catalog matching.
//!
//! A [`MatchPredicate`] is the OR of all (keyword, field) pairs: a document
//! matches when any keyword appears as a case-insensitive substring of any
//! target field. Substring semantics are deliberate and load-bearing —
//! `"cat"` matches `"concatenation"` — because the shipped product behaves
//! that way and saved searches depend on it.
//!
//! Predicates are pure values; they never query the store. The matcher
//! functions below run them over listings already read from the catalog,
//! preserving listing order.

use std::collections::HashSet;

use crate::catalog::ContentRecord;

/// Disjunctive keyword predicate with case-insensitive substring semantics.
#[derive(Debug, Clone)]
pub struct MatchPredicate {
    /// Lowercased at construction so each field is lowercased once per test.
    keywords: Vec<String>,
}

impl MatchPredicate {
    /// Builds a predicate from a keyword sequence. Blank keywords are
    /// dropped; an empty sequence yields a predicate that matches nothing,
    /// never one that matches everything.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|keyword| keyword.as_ref().trim().to_lowercase())
            .filter(|keyword| !keyword.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// True when any keyword is a substring of any of `fields`.
    pub fn matches_fields(&self, fields: &[&str]) -> bool {
        if self.keywords.is_empty() {
            return false;
        }
        fields.iter().any(|field| {
            let haystack = field.to_lowercase();
            self.keywords
                .iter()
                .any(|keyword| haystack.contains(keyword.as_str()))
        })
    }

    /// Like [`MatchPredicate::matches_fields`] but additionally tests each
    /// tag individually, mirroring how the store's regex match treats
    /// array-valued fields (any element may match).
    pub fn matches_fields_or_tags(&self, fields: &[&str], tags: &[String]) -> bool {
        self.matches_fields(fields) || tags.iter().any(|tag| self.matches_fields(&[tag]))
    }

    /// Field set used for videos everywhere and shorts in search.
    pub fn matches_content(&self, record: &ContentRecord) -> bool {
        self.matches_fields_or_tags(&[&record.title, &record.description], &record.tags)
    }

    /// Narrower field set used for shorts in category filtering and
    /// recommendations (no description).
    pub fn matches_content_title_tags(&self, record: &ContentRecord) -> bool {
        self.matches_fields_or_tags(&[&record.title], &record.tags)
    }
}

/// Selects items that either match directly or belong to a matched channel.
/// The two paths are a union, not an intersection: one is enough. Results
/// keep listing order and each item appears exactly once even when both
/// paths hit.
pub fn select_with_channel_expansion<T, F, G>(
    items: &[T],
    matched_channel_ids: &HashSet<String>,
    mut channel_id_of: F,
    mut id_of: G,
    mut direct: impl FnMut(&T) -> bool,
) -> Vec<T>
where
    T: Clone,
    F: FnMut(&T) -> &str,
    G: FnMut(&T) -> &str,
{
    let mut seen = HashSet::new();
    let mut selected = Vec::new();
    for item in items {
        let included = direct(item) || matched_channel_ids.contains(channel_id_of(item));
        if included && seen.insert(id_of(item).to_owned()) {
            selected.push(item.clone());
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ContentRecord;

    fn content(id: &str, channel_id: &str, title: &str) -> ContentRecord {
        ContentRecord {
            id: id.into(),
            channel_id: channel_id.into(),
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

    /// An empty keyword set matches zero documents, not all of them.
    #[test]
    fn empty_keywords_match_nothing() {
        let predicate = MatchPredicate::new(Vec::<String>::new());
        assert!(predicate.is_empty());
        assert!(!predicate.matches_fields(&["anything at all"]));
        assert!(!predicate.matches_content(&content("v1", "c1", "Cats 101")));
    }

    /// Blank keywords are dropped rather than turned into match-everything
    /// clauses.
    #[test]
    fn blank_keywords_are_dropped() {
        let predicate = MatchPredicate::new(["  ", ""]);
        assert!(predicate.is_empty());
    }

    /// Substring containment, not token match: "cat" hits "concatenation".
    #[test]
    fn keyword_matches_as_substring() {
        let predicate = MatchPredicate::new(["cat"]);
        assert!(predicate.matches_fields(&["concatenation"]));
        assert!(predicate.matches_fields(&["CAT videos"]));
        assert!(!predicate.matches_fields(&["dogs only"]));
    }

    #[test]
    fn any_tag_element_can_match() {
        let predicate = MatchPredicate::new(["music"]);
        let mut record = content("v1", "c1", "Untitled");
        record.tags = vec!["gaming".into(), "Music Mix".into()];
        assert!(predicate.matches_content(&record));
    }

    #[test]
    fn title_tags_field_set_ignores_description() {
        let predicate = MatchPredicate::new(["hidden"]);
        let mut record = content("s1", "c1", "Plain title");
        record.description = "hidden gem".into();
        assert!(predicate.matches_content(&record));
        assert!(!predicate.matches_content_title_tags(&record));
    }

    /// Concrete scenario from the product behavior: keywords [cat, dog] over
    /// a three-item catalog select the first two, in catalog order, no
    /// duplicates.
    #[test]
    fn multi_keyword_selection_preserves_catalog_order() {
        let predicate = MatchPredicate::new(["cat", "dog"]);
        let catalog = [
            content("1", "c1", "Cats 101"),
            content("2", "c1", "Dog Park"),
            content("3", "c1", "Birds"),
        ];
        let matched: Vec<&str> = catalog
            .iter()
            .filter(|record| predicate.matches_content(record))
            .map(|record| record.id.as_str())
            .collect();
        assert_eq!(matched, vec!["1", "2"]);
    }

    /// A video that does not match directly still rides along when its
    /// channel matched, and appears exactly once even if both paths hit.
    #[test]
    fn channel_expansion_is_a_union_without_duplicates() {
        let predicate = MatchPredicate::new(["cooking"]);
        let catalog = [
            content("v1", "cooking-channel", "Knife skills"),
            content("v2", "cooking-channel", "Cooking pasta"),
            content("v3", "other-channel", "Car review"),
        ];
        let matched_channels: HashSet<String> = ["cooking-channel".to_string()].into();

        let selected = select_with_channel_expansion(
            &catalog,
            &matched_channels,
            |record| record.channel_id.as_str(),
            |record| record.id.as_str(),
            |record| predicate.matches_content(record),
        );

        let ids: Vec<&str> = selected.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v2"]);
    }

    #[test]
    fn channel_expansion_with_no_matches_selects_nothing() {
        let predicate = MatchPredicate::new(["absent"]);
        let catalog = [content("v1", "c1", "Title")];
        let selected = select_with_channel_expansion(
            &catalog,
            &HashSet::new(),
            |record| record.channel_id.as_str(),
            |record| record.id.as_str(),
            |record| predicate.matches_content(record),
        );
        assert!(selected.is_empty());
    }
}
