//! Capture interface selection.

use std::fmt;
use std::net::IpAddr;

use pnet::datalink::NetworkInterface;

/// Description substrings that identify a wireless adapter.
pub const DEFAULT_INTERFACE_HINTS: &[&str] = &["wireless", "wi-fi"];

/// The attributes of a network interface that selection looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCandidate {
    pub name: String,
    pub description: String,
    pub addresses: Vec<IpAddr>,
}

impl From<&NetworkInterface> for InterfaceCandidate {
    fn from(iface: &NetworkInterface) -> Self {
        Self {
            name: iface.name.clone(),
            description: iface.description.clone(),
            addresses: iface.ips.iter().map(|ip| ip.ip()).collect(),
        }
    }
}

/// Criteria for picking the capture interface.
///
/// Resolution order: exact interface name, then exact address, then a
/// case-insensitive substring match of the hints against the interface
/// description or name. Explicit criteria that match nothing fall back to
/// the hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSelector {
    name: Option<String>,
    address: Option<IpAddr>,
    hints: Vec<String>,
}

impl InterfaceSelector {
    /// Selector using only the default wireless hints.
    pub fn new() -> Self {
        Self {
            name: None,
            address: None,
            hints: DEFAULT_INTERFACE_HINTS.iter().map(|h| h.to_string()).collect(),
        }
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_address(mut self, address: Option<IpAddr>) -> Self {
        self.address = address;
        self
    }

    /// Replace the description hints. Hints are stored lowercased.
    pub fn with_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.hints = hints
            .into_iter()
            .map(|h| h.as_ref().trim().to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        self
    }

    /// Index of the first candidate satisfying the selector.
    pub fn select(&self, candidates: &[InterfaceCandidate]) -> Option<usize> {
        if let Some(name) = &self.name {
            if let Some(idx) = candidates.iter().position(|c| &c.name == name) {
                return Some(idx);
            }
            tracing::warn!("Interface '{}' not found, falling back to hints", name);
        }

        if let Some(address) = self.address {
            if let Some(idx) = candidates
                .iter()
                .position(|c| c.addresses.contains(&address))
            {
                return Some(idx);
            }
            tracing::warn!(
                "No interface has address {}, falling back to hints",
                address
            );
        }

        candidates.iter().position(|c| self.matches_hint(c))
    }

    fn matches_hint(&self, candidate: &InterfaceCandidate) -> bool {
        let description = candidate.description.to_lowercase();
        let name = candidate.name.to_lowercase();
        self.hints
            .iter()
            .any(|hint| description.contains(hint) || name.contains(hint))
    }
}

impl Default for InterfaceSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InterfaceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(name) = &self.name {
            parts.push(format!("name={}", name));
        }
        if let Some(address) = &self.address {
            parts.push(format!("address={}", address));
        }
        parts.push(format!("hints=[{}]", self.hints.join(", ")));
        f.write_str(&parts.join(" "))
    }
}
