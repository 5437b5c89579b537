use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// NEM settlement regions with published price and demand files.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Region {
    #[serde(rename = "NSW1")]
    Nsw1,
    #[serde(rename = "QLD1")]
    Qld1,
    #[serde(rename = "VIC1")]
    Vic1,
    #[serde(rename = "SA1")]
    Sa1,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Nsw1, Region::Qld1, Region::Vic1, Region::Sa1];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Nsw1 => "NSW1",
            Region::Qld1 => "QLD1",
            Region::Vic1 => "VIC1",
            Region::Sa1 => "SA1",
        }
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NSW1" => Ok(Region::Nsw1),
            "QLD1" => Ok(Region::Qld1),
            "VIC1" => Ok(Region::Vic1),
            "SA1" => Ok(Region::Sa1),
            _ => Err(format!("Failed to parse {s} as Region")),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
