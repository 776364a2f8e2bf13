//! Mapping between Hathora regions and session-network regions.
//!
//! The session network has coarser regions than Hathora. Several Hathora
//! regions share one session region, so the mapping is lossy: going
//! Hathora → session → Hathora picks a canonical region per session code.

use std::fmt;
use std::str::FromStr;

use hathora_model::Region;
use serde::{Deserialize, Serialize};

/// A session-network region code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRegion {
    Us,
    Usw,
    Eu,
    In,
    Asia,
    Jp,
    Sa,
    Kr,
}

impl SessionRegion {
    pub const ALL: [Self; 8] = [
        Self::Us,
        Self::Usw,
        Self::Eu,
        Self::In,
        Self::Asia,
        Self::Jp,
        Self::Sa,
        Self::Kr,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Us => "us",
            Self::Usw => "usw",
            Self::Eu => "eu",
            Self::In => "in",
            Self::Asia => "asia",
            Self::Jp => "jp",
            Self::Sa => "sa",
            Self::Kr => "kr",
        }
    }

    /// The session region a server in `region` joins.
    pub fn from_hathora(region: Region) -> Self {
        match region {
            Region::Seattle | Region::LosAngeles => Self::Usw,
            Region::WashingtonDC | Region::Chicago => Self::Us,
            Region::London | Region::Frankfurt => Self::Eu,
            Region::Mumbai => Self::In,
            Region::Singapore => Self::Asia,
            Region::Tokyo | Region::Sydney => Self::Jp,
            Region::SaoPaulo => Self::Sa,
        }
    }

    /// The Hathora region to deploy into for players in this session
    /// region. `kr` has no Hathora region of its own and uses Tokyo.
    pub fn to_hathora(self) -> Region {
        match self {
            Self::Us => Region::WashingtonDC,
            Self::Usw => Region::Seattle,
            Self::Eu => Region::Frankfurt,
            Self::In => Region::Mumbai,
            Self::Asia => Region::Singapore,
            Self::Jp | Self::Kr => Region::Tokyo,
            Self::Sa => Region::SaoPaulo,
        }
    }
}

impl From<Region> for SessionRegion {
    fn from(region: Region) -> Self {
        Self::from_hathora(region)
    }
}

impl fmt::Display for SessionRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Returned when a session region code is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown session region: {0}")]
pub struct UnknownSessionRegion(pub String);

impl FromStr for SessionRegion {
    type Err = UnknownSessionRegion;

    /// Case-insensitive, since session settings store codes lowercased.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|r| r.code() == lower)
            .ok_or_else(|| UnknownSessionRegion(s.to_string()))
    }
}
