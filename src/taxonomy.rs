//! The fixed category taxonomy and the classifier that maps free text onto
//! it.
//!
//! The list ships with the code; it is not editable at runtime. `"All"` is a
//! sentinel meaning "do not filter" — callers that see it bypass matching
//! entirely and return full catalogs.

use anyhow::{Context, Result, bail};

use crate::ai::{TextGenerator, category_prompt};

/// Sentinel entry that disables category filtering.
pub const ALL_SENTINEL: &str = "All";

/// Category names shown in the frontend chip bar, in display order.
pub const CATEGORIES: &[&str] = &[
    ALL_SENTINEL,
    "Music",
    "Gaming",
    "News",
    "Entertainment",
    "Sports",
    "Movies",
    "Live",
    "DSA",
    "Science & Tech",
    "TV Shows",
    "Art",
    "Comedy",
    "Vlogs",
    "Education",
    "Gadgets",
    "Health",
    "Horror",
    "Cooking",
    "Dance",
    "Fashion",
    "Travel",
    "Beauty",
    "DIY & Crafts",
    "Animals & Pets",
    "Automotive",
    "Animation",
    "Documentary",
    "History",
    "Finance & Business",
    "Fitness",
    "How-to & Style",
    "People & Blogs",
    "Trailers",
    "ASMR",
    "Podcasts",
    "Reviews",
    "Tutorials",
    "Unboxing",
    "Challenges",
    "Pranks",
    "Family",
    "Nature & Outdoors",
    "Photography",
    "Filmmaking",
    "Real Estate",
    "Spirituality",
    "Motivation",
    "Coding & Programming",
    "Web Development",
    "Mobile Development",
];

/// Maps free text onto taxonomy entries by delegating to the text
/// generator. The reply is split and trimmed but deliberately not
/// re-validated against [`CATEGORIES`]: an off-taxonomy name flows through
/// as a literal search string and simply matches nothing downstream.
pub fn classify_categories(generator: &dyn TextGenerator, input: &str) -> Result<Vec<String>> {
    let reply = generator
        .generate(&category_prompt(input, CATEGORIES))
        .context("classifying query against the category taxonomy")?;

    let categories: Vec<String> = reply
        .replace(['\n', '\r'], " ")
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| name.trim_matches('"').to_owned())
        .collect();

    if categories.is_empty() {
        bail!("classifier returned no category names");
    }
    Ok(categories)
}
