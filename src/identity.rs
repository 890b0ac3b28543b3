//! Composite identities.
//!
//! The LaunchDarkly API addresses flags and segments by several natural keys,
//! so the provider tracks them as `/`-joined strings:
//!
//! | Kind | Format |
//! |---|---|
//! | feature flag | `project_key/flag_key` |
//! | segment | `project_key/env_key/segment_key` |
//! | flag environment | `project_key/env_key/flag_key` |
//!
//! Webhooks use the server-assigned id as-is.

use std::fmt;
use std::str::FromStr;

use crate::error::ProviderError;

const SEPARATOR: char = '/';

fn split_exact<const N: usize>(input: &str, format: &str) -> Result<[String; N], ProviderError> {
    let parts: Vec<&str> = input.split(SEPARATOR).collect();
    if parts.len() != N || parts.iter().any(|p| p.is_empty()) {
        return Err(ProviderError::InvalidIdentity(format!(
            "expected an ID in the format '{}', got {:?}",
            format, input
        )));
    }
    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part.to_string();
    }
    Ok(out)
}

/// Identity of a feature flag: `project_key/flag_key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlagId {
    /// Project key.
    pub project_key: String,
    /// Flag key.
    pub flag_key: String,
}

impl FlagId {
    /// Build from its parts.
    pub fn new(project_key: impl Into<String>, flag_key: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            flag_key: flag_key.into(),
        }
    }
}

impl fmt::Display for FlagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project_key, self.flag_key)
    }
}

impl FromStr for FlagId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [project_key, flag_key] = split_exact(s, "project_key/flag_key")?;
        Ok(Self {
            project_key,
            flag_key,
        })
    }
}

/// Identity of an environment-scoped segment: `project_key/env_key/segment_key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentId {
    /// Project key.
    pub project_key: String,
    /// Environment key.
    pub env_key: String,
    /// Segment key.
    pub segment_key: String,
}

impl SegmentId {
    /// Build from its parts.
    pub fn new(
        project_key: impl Into<String>,
        env_key: impl Into<String>,
        segment_key: impl Into<String>,
    ) -> Self {
        Self {
            project_key: project_key.into(),
            env_key: env_key.into(),
            segment_key: segment_key.into(),
        }
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.project_key, self.env_key, self.segment_key)
    }
}

impl FromStr for SegmentId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [project_key, env_key, segment_key] =
            split_exact(s, "project_key/env_key/segment_key")?;
        Ok(Self {
            project_key,
            env_key,
            segment_key,
        })
    }
}

/// Identity of a flag's per-environment targeting: `project_key/env_key/flag_key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlagEnvironmentId {
    /// The flag.
    pub flag: FlagId,
    /// Environment key.
    pub env_key: String,
}

impl FlagEnvironmentId {
    /// Build from a flag identity and an environment key.
    pub fn new(flag: FlagId, env_key: impl Into<String>) -> Self {
        Self {
            flag,
            env_key: env_key.into(),
        }
    }
}

impl fmt::Display for FlagEnvironmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.flag.project_key, self.env_key, self.flag.flag_key
        )
    }
}

impl FromStr for FlagEnvironmentId {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [project_key, env_key, flag_key] = split_exact(s, "project_key/env_key/flag_key")?;
        Ok(Self {
            flag: FlagId {
                project_key,
                flag_key,
            },
            env_key,
        })
    }
}
