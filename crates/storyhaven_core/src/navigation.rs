//! crates/storyhaven_core/src/navigation.rs
//!
//! Chapter ordering and previous/next resolution.
//!
//! The slug is the single addressing scheme: chapters are looked up, linked,
//! and ordered by the same identifier everywhere. Slugs are derived from the
//! chapter title and deduplicated per story at creation time.

use std::collections::HashSet;

use crate::domain::Chapter;

/// Previous and next chapters relative to a position in the list. Absent at
/// the respective end of the story.
#[derive(Debug, Default)]
pub struct Neighbors<'a> {
    pub previous: Option<&'a Chapter>,
    pub next: Option<&'a Chapter>,
}

/// The ordered chapters of one story.
///
/// Ordering is total: explicit sequence number first (chapters without one
/// sort last), then creation time, then id as the final tiebreak.
#[derive(Debug)]
pub struct ChapterList {
    chapters: Vec<Chapter>,
}

impl ChapterList {
    /// Sorts the given chapters into canonical order.
    pub fn new(mut chapters: Vec<Chapter>) -> Self {
        chapters.sort_by(|a, b| {
            let a_key = (a.number.is_none(), a.number, a.created_at, a.id);
            let b_key = (b.number.is_none(), b.number, b.created_at, b.id);
            a_key.cmp(&b_key)
        });
        Self { chapters }
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// Index of the chapter with this slug, if it exists in the story.
    pub fn position_of(&self, slug: &str) -> Option<usize> {
        self.chapters.iter().position(|c| c.slug == slug)
    }

    pub fn resolve(&self, slug: &str) -> Option<&Chapter> {
        self.position_of(slug).map(|i| &self.chapters[i])
    }

    /// Previous/next by linear index lookup. `previous` is absent at index
    /// 0 and `next` at the last index, matching the reader's nav buttons.
    pub fn neighbors(&self, slug: &str) -> Neighbors<'_> {
        let Some(index) = self.position_of(slug) else {
            return Neighbors::default();
        };
        Neighbors {
            previous: index.checked_sub(1).map(|i| &self.chapters[i]),
            next: self.chapters.get(index + 1),
        }
    }

    pub fn first(&self) -> Option<&Chapter> {
        self.chapters.first()
    }
}

/// Derives a URL slug from a title: accents folded, lowercased, runs of
/// non-alphanumerics collapsed to single hyphens.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;
    for ch in title.chars() {
        let folded = fold_char(ch);
        for c in folded.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_hyphen && !slug.is_empty() {
                    slug.push('-');
                }
                pending_hyphen = false;
                slug.push(c.to_ascii_lowercase());
            } else {
                pending_hyphen = true;
            }
        }
    }
    slug
}

/// Maps the accented Latin letters that show up in story titles to their
/// ASCII base. Anything else passes through untouched.
fn fold_char(ch: char) -> String {
    match ch {
        'à'..='å' | 'À'..='Å' | 'ā' | 'ă' | 'ạ' | 'ả' | 'ấ' | 'ầ' | 'ẩ' | 'ẫ' | 'ậ' | 'ắ'
        | 'ằ' | 'ẳ' | 'ẵ' | 'ặ' => "a".to_string(),
        'è'..='ë' | 'È'..='Ë' | 'ē' | 'ẹ' | 'ẻ' | 'ẽ' | 'ế' | 'ề' | 'ể' | 'ễ' | 'ệ' => {
            "e".to_string()
        }
        'ì'..='ï' | 'Ì'..='Ï' | 'ĩ' | 'ị' | 'ỉ' => "i".to_string(),
        'ò'..='ö' | 'Ò'..='Ö' | 'ø' | 'ō' | 'ơ' | 'ọ' | 'ỏ' | 'ố' | 'ồ' | 'ổ' | 'ỗ' | 'ộ'
        | 'ớ' | 'ờ' | 'ở' | 'ỡ' | 'ợ' => "o".to_string(),
        'ù'..='ü' | 'Ù'..='Ü' | 'ū' | 'ư' | 'ụ' | 'ủ' | 'ũ' | 'ứ' | 'ừ' | 'ử' | 'ữ' | 'ự' => {
            "u".to_string()
        }
        'ý' | 'ỳ' | 'ỷ' | 'ỹ' | 'ỵ' => "y".to_string(),
        'đ' | 'Đ' => "d".to_string(),
        'ñ' | 'Ñ' => "n".to_string(),
        'ç' | 'Ç' => "c".to_string(),
        _ => ch.to_string(),
    }
}

/// Makes `base` unique against the set of slugs already taken in a story by
/// appending `-2`, `-3`, ... An empty base becomes "chapter".
pub fn dedup_slug(base: &str, taken: &HashSet<String>) -> String {
    let base = if base.is_empty() { "chapter" } else { base };
    if !taken.contains(base) {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{base}-{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn chapter(slug: &str, number: Option<i32>, minutes: i64) -> Chapter {
        Chapter {
            id: Uuid::new_v4(),
            story_id: Uuid::new_v4(),
            slug: slug.to_string(),
            title: slug.to_string(),
            content: String::new(),
            number,
            word_count: 0,
            created_at: Utc::now() + Duration::minutes(minutes),
        }
    }

    #[test]
    fn orders_by_sequence_number_first() {
        let list = ChapterList::new(vec![
            chapter("c3", Some(3), 0),
            chapter("c1", Some(1), 5),
            chapter("c2", Some(2), 2),
        ]);
        let slugs: Vec<_> = list.chapters().iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(slugs, ["c1", "c2", "c3"]);
    }

    #[test]
    fn unnumbered_chapters_sort_last_by_creation_time() {
        let list = ChapterList::new(vec![
            chapter("late", None, 10),
            chapter("early", None, 1),
            chapter("numbered", Some(7), 20),
        ]);
        let slugs: Vec<_> = list.chapters().iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(slugs, ["numbered", "early", "late"]);
    }

    #[test]
    fn neighbors_at_the_ends() {
        let list = ChapterList::new(vec![
            chapter("c1", Some(1), 0),
            chapter("c2", Some(2), 0),
            chapter("c3", Some(3), 0),
        ]);

        let first = list.neighbors("c1");
        assert!(first.previous.is_none());
        assert_eq!(first.next.unwrap().slug, "c2");

        let mid = list.neighbors("c2");
        assert_eq!(mid.previous.unwrap().slug, "c1");
        assert_eq!(mid.next.unwrap().slug, "c3");

        let last = list.neighbors("c3");
        assert_eq!(last.previous.unwrap().slug, "c2");
        assert!(last.next.is_none());
    }

    #[test]
    fn neighbors_of_unknown_slug_is_empty() {
        let list = ChapterList::new(vec![chapter("c1", Some(1), 0)]);
        let n = list.neighbors("missing");
        assert!(n.previous.is_none() && n.next.is_none());
    }

    #[test]
    fn slugify_basics() {
        assert_eq!(slugify("Chapter 1: The Beginning"), "chapter-1-the-beginning");
        assert_eq!(slugify("  --Weird__ Title!!  "), "weird-title");
        assert_eq!(slugify("Đêm Trắng ở Hà Nội"), "dem-trang-o-ha-noi");
    }

    #[test]
    fn dedup_slug_appends_counters() {
        let mut taken = HashSet::new();
        assert_eq!(dedup_slug("intro", &taken), "intro");
        taken.insert("intro".to_string());
        assert_eq!(dedup_slug("intro", &taken), "intro-2");
        taken.insert("intro-2".to_string());
        assert_eq!(dedup_slug("intro", &taken), "intro-3");
        assert_eq!(dedup_slug("", &taken), "chapter");
    }
}
