use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Whether a subscriber consents to having their email opens and clicks tracked
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentToTrack {
    /// Tracking is allowed
    Yes,
    /// Tracking is not allowed
    No,
    /// Keep whatever value is currently stored
    Unchanged,
}

impl ConsentToTrack {
    /// Value as sent to the API
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Unchanged => "unchanged",
        }
    }
}

impl FromStr for ConsentToTrack {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            "unchanged" => Ok(Self::Unchanged),
            _ => Err(Error::InvalidConsentToTrack(s.to_owned())),
        }
    }
}

impl std::fmt::Display for ConsentToTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
