use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The two daily thread families harvested from the subreddit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostCategory {
    DailyDiscussion,
    MovesTomorrow,
}

impl PostCategory {
    pub const ALL: [PostCategory; 2] = [PostCategory::DailyDiscussion, PostCategory::MovesTomorrow];

    /// Prefix of the rendered post title, immediately followed by `Month DD, YYYY`.
    pub fn title_prefix(&self) -> &'static str {
        match self {
            PostCategory::DailyDiscussion => "Daily Discussion Thread for ",
            PostCategory::MovesTomorrow => "What Are Your Moves Tomorrow, ",
        }
    }

    /// Fragment every permalink of this category contains.
    pub fn path_fragment(&self) -> &'static str {
        match self {
            PostCategory::DailyDiscussion => "daily_discussion_thread",
            PostCategory::MovesTomorrow => "what_are_your_moves",
        }
    }

    pub fn file_prefix(&self) -> &'static str {
        match self {
            PostCategory::DailyDiscussion => "Daily_Discussion_Thread_Comments_",
            PostCategory::MovesTomorrow => "What_Are_Your_Moves_Tomorrow_Comments_",
        }
    }

    /// Both thread families carry the same flair.
    pub fn search_flair(&self) -> &'static str {
        "Daily Discussion"
    }
}

impl fmt::Display for PostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostCategory::DailyDiscussion => write!(f, "daily-discussion"),
            PostCategory::MovesTomorrow => write!(f, "moves-tomorrow"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub date: NaiveDate,
    pub identifier: String,
    pub url: String,
}

/// Posts of one category keyed by calendar date, iterated oldest first.
pub type LinkMap = BTreeMap<NaiveDate, PostRecord>;

/// Raw comment bodies in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentList {
    bodies: Vec<String>,
}

impl CommentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, body: impl Into<String>) {
        self.bodies.push(body.into());
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.bodies.iter().map(String::as_str)
    }

    /// Drops every entry exactly equal to one of `markers`.
    pub fn without_markers(self, markers: &[String]) -> Self {
        let bodies = self
            .bodies
            .into_iter()
            .filter(|body| !markers.iter().any(|marker| marker == body))
            .collect();
        Self { bodies }
    }

    pub fn into_inner(self) -> Vec<String> {
        self.bodies
    }
}

impl From<Vec<String>> for CommentList {
    fn from(bodies: Vec<String>) -> Self {
        Self { bodies }
    }
}

impl FromIterator<String> for CommentList {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            bodies: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalResult {
    pub comments: CommentList,
    /// False when the strategy ran but its answer may lag behind the forum.
    pub complete: bool,
}

impl RetrievalResult {
    pub fn complete(comments: CommentList) -> Self {
        Self {
            comments,
            complete: true,
        }
    }

    pub fn incomplete(comments: CommentList) -> Self {
        Self {
            comments,
            complete: false,
        }
    }
}

/// One node of a paginated comment tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentNode {
    Comment {
        id: String,
        body: String,
        replies: Vec<CommentNode>,
    },
    /// "Load more comments" placeholder. Empty `children` means the rest of
    /// the thread hangs below `parent_id` and has to be fetched as a subtree.
    More {
        parent_id: String,
        children: Vec<String>,
        count: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_naming() {
        assert_eq!(
            PostCategory::DailyDiscussion.file_prefix(),
            "Daily_Discussion_Thread_Comments_"
        );
        assert_eq!(
            PostCategory::MovesTomorrow.path_fragment(),
            "what_are_your_moves"
        );
        assert_eq!(PostCategory::MovesTomorrow.to_string(), "moves-tomorrow");
    }

    #[test]
    fn test_removed_markers_are_dropped() {
        let comments: CommentList = vec![
            "first".to_string(),
            "[removed]".to_string(),
            "second".to_string(),
            "[removed] but not exactly".to_string(),
        ]
        .into();

        let cleaned = comments.without_markers(&["[removed]".to_string()]);
        assert_eq!(
            cleaned.into_inner(),
            vec!["first", "second", "[removed] but not exactly"]
        );
    }
}
