//! Leaderboard entries derived from the remote aggregate.

use serde::Serialize;

/// Ids longer than this are shortened for display.
const DISPLAY_ID_MAX_LEN: usize = 12;
const DISPLAY_ID_KEEP: usize = 6;

/// Trip count for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub user_id: String,
    pub count: i64,
}

impl RankingEntry {
    pub fn new(user_id: impl Into<String>, count: i64) -> Self {
        Self {
            user_id: user_id.into(),
            count,
        }
    }

    /// User id shortened to `first6...last6` when it is long.
    pub fn display_user_id(&self) -> String {
        shorten_user_id(&self.user_id)
    }
}

/// Ordered leaderboard (highest count first). Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Leaderboard {
    entries: Vec<RankingEntry>,
}

impl Leaderboard {
    /// Returns `None` when there are no entries.
    pub fn from_sorted(entries: Vec<RankingEntry>) -> Option<Self> {
        if entries.is_empty() {
            None
        } else {
            Some(Self { entries })
        }
    }

    pub fn entries(&self) -> &[RankingEntry] {
        &self.entries
    }

    /// Top three entries.
    pub fn podium(&self) -> &[RankingEntry] {
        &self.entries[..self.entries.len().min(3)]
    }

    /// Entries with their 1-based position. Ties are not merged.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &RankingEntry)> {
        self.entries.iter().enumerate().map(|(i, e)| (i + 1, e))
    }
}

pub fn shorten_user_id(user_id: &str) -> String {
    let chars: Vec<char> = user_id.chars().collect();
    if chars.len() <= DISPLAY_ID_MAX_LEN {
        return user_id.to_string();
    }
    let head: String = chars[..DISPLAY_ID_KEEP].iter().collect();
    let tail: String = chars[chars.len() - DISPLAY_ID_KEEP..].iter().collect();
    format!("{}...{}", head, tail)
}
