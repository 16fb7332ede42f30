use std::collections::HashSet;
use std::path::Path;

use crate::error::{ProxyError, Result};

/// Why a digest was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Blacklisted,
    NotWhitelisted,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Blacklisted => "blacklisted",
            DenyReason::NotWhitelisted => "not_whitelisted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// Allow and deny sets of JA3 digests, fixed for the server's lifetime
#[derive(Debug, Clone, Default)]
pub struct AccessList {
    allow: HashSet<String>,
    deny: HashSet<String>,
}

impl AccessList {
    pub fn new(allow: HashSet<String>, deny: HashSet<String>) -> Self {
        Self { allow, deny }
    }

    /// Load both sets; a missing path means an empty set.
    pub fn load(whitelist: Option<&Path>, blacklist: Option<&Path>) -> Result<Self> {
        let allow = whitelist.map(load_list).transpose()?.unwrap_or_default();
        let deny = blacklist.map(load_list).transpose()?.unwrap_or_default();
        Ok(Self { allow, deny })
    }

    /// Deny wins over allow. An empty allow set places no restriction.
    pub fn evaluate(&self, digest: &str) -> AccessDecision {
        if self.deny.contains(digest) {
            return AccessDecision::Deny(DenyReason::Blacklisted);
        }
        if !self.allow.is_empty() && !self.allow.contains(digest) {
            return AccessDecision::Deny(DenyReason::NotWhitelisted);
        }
        AccessDecision::Allow
    }

    pub fn allow_len(&self) -> usize {
        self.allow.len()
    }

    pub fn deny_len(&self) -> usize {
        self.deny.len()
    }
}

/// One digest per line. Surrounding whitespace is trimmed; blank lines and
/// lines starting with `#` are skipped. Matching stays case-sensitive.
pub fn parse_list(text: &str) -> HashSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn load_list(path: &Path) -> Result<HashSet<String>> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| ProxyError::List { path: path.display().to_string(), source })?;
    Ok(parse_list(&text))
}
