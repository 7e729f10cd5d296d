use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Player nickname, the stable key of a profile across runs.
pub type PlayerId = String;

/// Full keyed set of records at one point in time.
///
/// A `BTreeMap` keeps the persisted file and the rendered report in a stable
/// order no matter in which order the fetch tasks completed.
pub type Snapshot = BTreeMap<PlayerId, PlayerRecord>;

/// One entry of the paginated player search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    #[serde(default)]
    pub minecraft_nickname: Option<String>,
}

impl PlayerSummary {
    /// Nickname of the listed player, ignoring blank values
    pub fn nickname(&self) -> Option<&str> {
        self.minecraft_nickname
            .as_deref()
            .map(str::trim)
            .filter(|nick| !nick.is_empty())
    }
}

/// Social network link shown on a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    pub name: String,
    pub url: String,
}

/// Role-play card (title + body) shown on a profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpCard {
    #[serde(rename = "h3", default)]
    pub title: String,
    #[serde(rename = "p", default)]
    pub body: String,
}

/// Structured data extracted from one player profile page.
///
/// Every field is optional: a section missing from the page is stored as
/// `null`. Field names match the JSON cache file layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Online/offline indicator
    #[serde(default)]
    pub status: Option<String>,

    /// Main status line. Required for validity (see [`PlayerRecord::is_valid`]).
    #[serde(default)]
    pub status_main: Option<String>,

    /// Text of the "player plus" block
    #[serde(default)]
    pub player_plus: Option<String>,

    #[serde(default)]
    pub socials: Option<Vec<SocialLink>>,

    /// Statistic lines. Required for validity (see [`PlayerRecord::is_valid`]).
    #[serde(default)]
    pub stats: Option<Vec<String>>,

    #[serde(default)]
    pub rp_cards: Option<Vec<RpCard>>,

    #[serde(default)]
    pub roles: Option<Vec<String>>,

    /// External contact link, filled by the secondary extraction step
    #[serde(default)]
    pub telegram: Option<String>,
}

impl PlayerRecord {
    /// Fields of which at least one must be present for a record to be kept
    pub const REQUIRED_FIELDS: [&'static str; 2] = ["status_main", "stats"];

    /// A record is valid when at least one required field is present.
    ///
    /// The same "any of" rule applies to cached and freshly fetched records.
    pub fn is_valid(&self) -> bool {
        self.status_main.is_some() || self.stats.is_some()
    }

    /// Whether the fields compared by the report differ between two records
    pub fn differs_from(&self, other: &Self) -> bool {
        self.status_main != other.status_main
            || self.stats != other.stats
            || self.roles != other.roles
            || self.player_plus != other.player_plus
    }
}
