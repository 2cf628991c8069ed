//! List filters shared by the remote query and the client-side merge

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::{normalize_tag, EntityId, Snippet};

/// Sort key for snippet listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    UpdatedAt,
    CreatedAt,
    Title,
}

impl SortBy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpdatedAt => "updated_at",
            Self::CreatedAt => "created_at",
            Self::Title => "title",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Query for `MergeView::list` and the remote `list` verb
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilters {
    /// Case-insensitive substring over body and tags
    pub query: Option<String>,
    pub tag: Option<String>,
    pub folder_id: Option<EntityId>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

impl ListFilters {
    /// Normalized query text, if any
    fn query_text(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|query| !query.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether a snippet passes the query and tag filters.
    ///
    /// The folder filter is applied by the caller, which knows how to resolve ids.
    #[must_use]
    pub fn matches_text(&self, snippet: &Snippet) -> bool {
        if let Some(tag) = self.tag.as_deref() {
            match normalize_tag(tag) {
                Some(tag) if snippet.tags.contains(&tag) => {}
                _ => return false,
            }
        }

        if let Some(query) = self.query_text() {
            let in_body = snippet.body.to_lowercase().contains(&query);
            let in_tags = snippet.tags.iter().any(|tag| tag.contains(&query));
            if !in_body && !in_tags {
                return false;
            }
        }

        true
    }

    /// Compare two snippets under the requested sort key and direction.
    #[must_use]
    pub fn compare(&self, left: &Snippet, right: &Snippet) -> Ordering {
        let ordering = match self.sort_by {
            SortBy::UpdatedAt => left.updated_at.cmp(&right.updated_at),
            SortBy::CreatedAt => left.created_at.cmp(&right.created_at),
            SortBy::Title => left
                .title_preview(usize::MAX)
                .to_lowercase()
                .cmp(&right.title_preview(usize::MAX).to_lowercase()),
        }
        .then_with(|| left.id.cmp(&right.id));

        match self.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }

    /// Sort in place and apply `limit`.
    pub fn sort_and_truncate(&self, snippets: &mut Vec<Snippet>) {
        snippets.sort_by(|left, right| self.compare(left, right));
        if let Some(limit) = self.limit {
            snippets.truncate(limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SnippetDraft, SyncEntity};

    fn snippet(body: &str, tags: &[&str], updated_at: i64) -> Snippet {
        let mut snippet = Snippet::from_draft(
            EntityId::new_local(),
            SnippetDraft::new(body).with_tags(tags.iter().copied()),
            updated_at,
        )
        .unwrap();
        snippet.updated_at = updated_at;
        snippet
    }

    #[test]
    fn query_matches_body_and_tags_case_insensitively() {
        let filters = ListFilters {
            query: Some("RUST".to_string()),
            ..ListFilters::default()
        };
        assert!(filters.matches_text(&snippet("learning rust", &[], 1)));
        assert!(filters.matches_text(&snippet("nothing here", &["rustlang"], 1)));
        assert!(!filters.matches_text(&snippet("python", &["py"], 1)));
    }

    #[test]
    fn blank_query_matches_everything() {
        let filters = ListFilters {
            query: Some("   ".to_string()),
            ..ListFilters::default()
        };
        assert!(filters.matches_text(&snippet("anything", &[], 1)));
    }

    #[test]
    fn tag_filter_is_normalized() {
        let filters = ListFilters {
            tag: Some("#Work".to_string()),
            ..ListFilters::default()
        };
        assert!(filters.matches_text(&snippet("x", &["work"], 1)));
        assert!(!filters.matches_text(&snippet("x", &["home"], 1)));
    }

    #[test]
    fn sorts_newest_first_by_default_and_truncates() {
        let filters = ListFilters {
            limit: Some(2),
            ..ListFilters::default()
        };
        let mut items = vec![
            snippet("a", &[], 1),
            snippet("b", &[], 3),
            snippet("c", &[], 2),
        ];
        filters.sort_and_truncate(&mut items);
        let bodies = items.iter().map(|s| s.body.as_str()).collect::<Vec<_>>();
        assert_eq!(bodies, vec!["b", "c"]);
    }

    #[test]
    fn sorts_by_title_ascending() {
        let filters = ListFilters {
            sort_by: SortBy::Title,
            sort_order: SortOrder::Asc,
            ..ListFilters::default()
        };
        let mut items = vec![snippet("beta", &[], 1), snippet("Alpha\nmore", &[], 2)];
        filters.sort_and_truncate(&mut items);
        assert_eq!(items[0].body, "Alpha\nmore");
    }
}
