// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Component tags, aliases and the per-component lifecycle.
//!
//! # Component Phase State Machine
//!
//! ```text
//!   ┌─────────────┐
//!   │ NOT_STARTED │────── placeholder ──────► SKIPPED
//!   └──────┬──────┘
//!          ▼
//!   ┌──────────────┐   ┌──────────┐   ┌────────────────────┐
//!   │ PROVISIONING │──►│ STARTING │──►│ AWAITING_READINESS │
//!   └──────▲───────┘   └──────────┘   └─────────┬──────────┘
//!          └──────── next container ────────────┤
//!                                               ▼
//!                                           ┌───────┐
//!                                           │ READY │
//!                                           └───────┘
//! ```
//!
//! A multi-container component cycles through provisioning, starting and
//! awaiting readiness once per container. `FAILED` is reachable from every
//! non-terminal phase and ends the whole run.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// A launchable network-function component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComponentTag {
    /// Subscriber database plus Home Subscriber Server.
    Hss,
    /// Mobility Management Entity.
    Mme,
    /// Serving/PDN gateway (not implemented yet).
    Spgw,
    /// Monolithic eNodeB on a USB radio.
    Enb,
    /// Radio Cloud Center of a split eNodeB.
    Rcc,
    /// Remote Radio Unit of a split eNodeB.
    Rru,
}

impl ComponentTag {
    /// Every tag, in declaration order.
    pub const ALL: [ComponentTag; 6] = [
        ComponentTag::Hss,
        ComponentTag::Mme,
        ComponentTag::Spgw,
        ComponentTag::Enb,
        ComponentTag::Rcc,
        ComponentTag::Rru,
    ];

    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentTag::Hss => "HSS",
            ComponentTag::Mme => "MME",
            ComponentTag::Spgw => "SPGW",
            ComponentTag::Enb => "ENB",
            ComponentTag::Rcc => "RCC",
            ComponentTag::Rru => "RRU",
        }
    }
}

impl fmt::Display for ComponentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ComponentTag {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ComponentTag::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownTag(s.to_string()))
    }
}

/// A composite tag expanding to an ordered list of component tags.
#[derive(Debug, Clone, Copy)]
pub struct Alias {
    /// Alias name.
    pub name: &'static str,
    /// Constituent tags, in expansion order.
    pub expands_to: &'static [ComponentTag],
}

/// Known aliases.
pub const ALIASES: &[Alias] = &[Alias {
    name: "EPC",
    expands_to: &[ComponentTag::Hss, ComponentTag::Mme, ComponentTag::Spgw],
}];

fn find_alias(name: &str) -> Option<&'static Alias> {
    ALIASES.iter().find(|a| a.name.eq_ignore_ascii_case(name))
}

/// Expand aliases and parse tags, keeping the first occurrence of each tag.
///
/// Matching is exact and case-insensitive. An empty request or an unknown
/// tag is rejected before anything else happens.
pub fn expand_tags<S: AsRef<str>>(requested: &[S]) -> Result<Vec<ComponentTag>, ConfigError> {
    let raw: Vec<&str> = requested
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .collect();
    if raw.is_empty() {
        return Err(ConfigError::EmptyRequest);
    }

    let mut seen = HashSet::new();
    let mut expanded = Vec::new();
    for name in raw {
        let tags: Vec<ComponentTag> = match find_alias(name) {
            Some(alias) => alias.expands_to.to_vec(),
            None => vec![name.parse()?],
        };
        for tag in tags {
            if seen.insert(tag) {
                expanded.push(tag);
            }
        }
    }
    Ok(expanded)
}

/// Lifecycle phase of one component during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentPhase {
    /// Nothing has happened yet.
    NotStarted,
    /// A provisioning batch is executing.
    Provisioning,
    /// A container is being created or reused.
    Starting,
    /// Waiting for the container state and service socket.
    AwaitingReadiness,
    /// All containers of the component are ready.
    Ready,
    /// Declared but not implemented; nothing was launched.
    Skipped,
    /// A step failed; the run is aborted.
    Failed,
}

impl ComponentPhase {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ComponentPhase::Ready | ComponentPhase::Skipped | ComponentPhase::Failed
        )
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_advance_to(&self, next: ComponentPhase) -> bool {
        use ComponentPhase::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Failed) => true,
            (NotStarted, Provisioning | Starting | Skipped) => true,
            (Provisioning, Starting | Ready) => true,
            (Starting, AwaitingReadiness | Provisioning | Ready) => true,
            (AwaitingReadiness, Provisioning | Starting | Ready) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ComponentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentPhase::NotStarted => "not_started",
            ComponentPhase::Provisioning => "provisioning",
            ComponentPhase::Starting => "starting",
            ComponentPhase::AwaitingReadiness => "awaiting_readiness",
            ComponentPhase::Ready => "ready",
            ComponentPhase::Skipped => "skipped",
            ComponentPhase::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_parse_case_insensitive() {
        assert_eq!("hss".parse::<ComponentTag>().unwrap(), ComponentTag::Hss);
        assert_eq!(" Mme ".parse::<ComponentTag>().unwrap(), ComponentTag::Mme);
        assert!(matches!(
            "XYZ".parse::<ComponentTag>(),
            Err(ConfigError::UnknownTag(t)) if t == "XYZ"
        ));
    }

    #[test]
    fn test_tag_matching_is_exact() {
        // No substring matching: "MM" is not MME, "EPCX" is not EPC
        assert!("MM".parse::<ComponentTag>().is_err());
        assert!(expand_tags(&["EPCX"]).is_err());
    }

    #[test]
    fn test_expand_epc() {
        assert_eq!(
            expand_tags(&["epc"]).unwrap(),
            vec![ComponentTag::Hss, ComponentTag::Mme, ComponentTag::Spgw]
        );
    }

    #[test]
    fn test_expand_dedupes_first_seen() {
        assert_eq!(
            expand_tags(&["MME", "EPC", "enb", "hss"]).unwrap(),
            vec![
                ComponentTag::Mme,
                ComponentTag::Hss,
                ComponentTag::Spgw,
                ComponentTag::Enb
            ]
        );
    }

    #[test]
    fn test_expand_is_idempotent() {
        let requests: [&[&str]; 4] = [&["EPC"], &["RRU", "EPC"], &["spgw", "hss"], &["EPC", "RCC", "mme"]];
        for request in requests {
            let once = expand_tags(request).unwrap();
            let names: Vec<&str> = once.iter().map(|t| t.as_str()).collect();
            let twice = expand_tags(names.as_slice()).unwrap();
            assert_eq!(once, twice, "expansion of {:?} is not idempotent", request);
        }
    }

    #[test]
    fn test_expand_empty() {
        let empty: [&str; 0] = [];
        assert!(matches!(expand_tags(&empty), Err(ConfigError::EmptyRequest)));
        assert!(matches!(expand_tags(&["", "  "]), Err(ConfigError::EmptyRequest)));
    }

    #[test]
    fn test_expand_unknown() {
        assert!(matches!(
            expand_tags(&["EPC", "GNB"]),
            Err(ConfigError::UnknownTag(t)) if t == "GNB"
        ));
    }

    #[test]
    fn test_phase_transitions() {
        use ComponentPhase::*;
        assert!(NotStarted.can_advance_to(Provisioning));
        assert!(NotStarted.can_advance_to(Skipped));
        assert!(Provisioning.can_advance_to(Starting));
        assert!(Starting.can_advance_to(AwaitingReadiness));
        assert!(AwaitingReadiness.can_advance_to(Provisioning));
        assert!(AwaitingReadiness.can_advance_to(Ready));
        assert!(Starting.can_advance_to(Failed));

        assert!(!NotStarted.can_advance_to(Ready));
        assert!(!NotStarted.can_advance_to(AwaitingReadiness));
        assert!(!Ready.can_advance_to(Starting));
        assert!(!Failed.can_advance_to(Failed));
        assert!(!Skipped.can_advance_to(Starting));
    }

    #[test]
    fn test_tag_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&ComponentTag::Spgw).unwrap(), "\"SPGW\"");
    }
}
