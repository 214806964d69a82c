//! Target bundle version strings.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A dotted numeric version such as `2.3000.1012345`.
///
/// Missing trailing components compare as zero, so `2.3000` == `2.3000.0`.
#[derive(Debug, Clone, Eq)]
pub struct WebVersion {
    parts: Vec<u64>,
}

impl WebVersion {
    /// First version served with the string-keyed module registry.
    pub fn modern_registry_floor() -> Self {
        Self {
            parts: vec![2, 3000, 0],
        }
    }

    pub fn parts(&self) -> &[u64] {
        &self.parts
    }

    /// Whether this version ships the modern module registry.
    pub fn has_modern_registry(&self) -> bool {
        *self >= Self::modern_registry_floor()
    }

    /// Whether `version` is safe to use as a cache file stem.
    pub fn is_valid_key(version: &str) -> bool {
        !version.is_empty()
            && !version.starts_with('.')
            && version
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    }
}

impl FromStr for WebVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty version".to_string());
        }
        let parts = s
            .split('.')
            .map(|p| {
                p.parse::<u64>()
                    .map_err(|_| format!("invalid version component '{}' in '{}'", p, s))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { parts })
    }
}

impl fmt::Display for WebVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text: Vec<String> = self.parts.iter().map(u64::to_string).collect();
        write!(f, "{}", text.join("."))
    }
}

impl Ord for WebVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.parts.len().max(other.parts.len());
        for i in 0..len {
            let a = self.parts.get(i).copied().unwrap_or(0);
            let b = other.parts.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for WebVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for WebVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
