use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Mapping;

use crate::secrets::Ciphertext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 3] = [TimeUnit::Minutes, TimeUnit::Hours, TimeUnit::Days];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            TimeUnit::Minutes => "Time expressed in minutes",
            TimeUnit::Hours => "Time expressed in hours",
            TimeUnit::Days => "Time expressed in days",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.as_str() == s)
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How often the agent validates the monitored service.
///
/// Persisted as a one-entry mapping, e.g. `{minutes: 5}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frequency {
    pub unit: TimeUnit,
    pub total: u32,
}

impl Frequency {
    pub fn new(unit: TimeUnit, total: u32) -> Result<Self> {
        if total == 0 {
            anyhow::bail!("frequency must be a positive number of {unit}");
        }
        Ok(Self { unit, total })
    }
}

impl Default for Frequency {
    fn default() -> Self {
        Self {
            unit: TimeUnit::Minutes,
            total: 1,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}: {}}}", self.unit, self.total)
    }
}

impl Serialize for Frequency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.unit, &self.total)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Frequency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let entries = BTreeMap::<TimeUnit, u32>::deserialize(deserializer)?;
        if entries.len() != 1 {
            return Err(D::Error::custom(format!(
                "frequency_time must have exactly one unit, found {}",
                entries.len()
            )));
        }
        let (unit, total) = entries.into_iter().next().ok_or_else(|| {
            D::Error::custom("frequency_time must have exactly one unit, found 0")
        })?;
        Frequency::new(unit, total).map_err(D::Error::custom)
    }
}

/// The agent configuration as stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfiguration {
    pub frequency_time: Frequency,
    pub telegram_bot_token: Ciphertext,
    pub telegram_chat_id: Ciphertext,
}

impl AgentConfiguration {
    /// Plain nested mapping suitable for writing as YAML.
    pub fn to_mapping(&self) -> Result<Mapping> {
        match serde_yaml::to_value(self)? {
            serde_yaml::Value::Mapping(mapping) => Ok(mapping),
            other => anyhow::bail!("agent configuration serialized to {other:?}"),
        }
    }

    pub fn from_mapping(mapping: &Mapping) -> Result<Self> {
        serde_yaml::from_value(serde_yaml::Value::Mapping(mapping.clone()))
            .context("invalid agent configuration")
    }
}
