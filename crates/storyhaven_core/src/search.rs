//! crates/storyhaven_core/src/search.rs
//!
//! Ad-hoc search filtering over an in-memory story list, as used by the
//! browse page. Single-pass, case-insensitive substring match over title,
//! author, and genre tags.

use crate::domain::Story;

/// Filters `stories` by `query`. An empty or whitespace-only query matches
/// everything.
pub fn search_stories<'a>(stories: &'a [Story], query: &str) -> Vec<&'a Story> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return stories.iter().collect();
    }
    stories
        .iter()
        .filter(|story| {
            story.title.to_lowercase().contains(&needle)
                || story
                    .author
                    .as_deref()
                    .is_some_and(|a| a.to_lowercase().contains(&needle))
                || story
                    .genres
                    .iter()
                    .any(|g| g.to_lowercase().contains(&needle))
        })
        .collect()
}
