//! Keyword extraction for search and recommendations.
//!
//! Two modes feed the matcher: free-text queries (optionally cleaned up by
//! the external text generator, which replies with a comma-separated keyword
//! list) and content titles from a user's history/likes/saves, which are
//! word-split. Neither mode deduplicates; repeated keywords only add
//! redundant OR clauses downstream.

/// Normalizes the generator's reply into search keywords. `reply` is the
/// typo-corrected, comma-separated list from the text generator; when it is
/// absent or unusable the raw query is used as-is, unsplit.
pub fn keywords_from_reply(raw_query: &str, reply: Option<&str>) -> Vec<String> {
    let text = match reply {
        Some(reply) if !reply.trim().is_empty() => reply,
        _ => raw_query,
    };
    let flattened = text.replace(['\n', '\r'], " ");
    flattened
        .split(',')
        .map(str::trim)
        .filter(|word| !word.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Word-splits a set of content titles into one flat keyword sequence.
/// Source order is preserved; empty titles are skipped.
pub fn keywords_from_titles<I, S>(titles: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut keywords = Vec::new();
    for title in titles {
        for word in title.as_ref().split_whitespace() {
            keywords.push(word.to_owned());
        }
    }
    keywords
}
