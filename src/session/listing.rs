// src/session/listing.rs

//! Parsing of the few tool replies the session itself depends on.

use std::collections::BTreeMap;

use crate::types::{DeviceIdentity, TargetState};

const LISTING_HEADER: &str = "List of devices attached";

/// Parse the target listing into `identity -> state`.
///
/// Each useful line is `<id><whitespace><state>`; the header, daemon
/// status lines (`* daemon ...`) and blank lines are skipped.
pub fn parse_targets(stdout: &str) -> BTreeMap<DeviceIdentity, TargetState> {
    let mut targets = BTreeMap::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('*') || line.starts_with(LISTING_HEADER) {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(id), Some(state)) = (fields.next(), fields.next()) else {
            continue;
        };
        if let Ok(identity) = DeviceIdentity::new(id) {
            targets.insert(identity, TargetState::from(state));
        }
    }
    targets
}

/// Find the listed entry for `wanted`.
///
/// An exact match wins; otherwise the first entry containing `wanted` is
/// used, so a bare IP finds its `IP:PORT` entry.
pub fn find_listed<'a>(
    targets: &'a BTreeMap<DeviceIdentity, TargetState>,
    wanted: &DeviceIdentity,
) -> Option<(&'a DeviceIdentity, &'a TargetState)> {
    targets.get_key_value(wanted).or_else(|| {
        targets
            .iter()
            .find(|(id, _)| id.as_str().contains(wanted.as_str()))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectReply {
    /// Newly connected; carries the name the tool reported.
    Connected(String),
    AlreadyConnected(String),
    Refused,
    Unrecognised,
}

pub fn parse_connect_reply(stdout: &str) -> ConnectReply {
    if let Some(name) = name_after(stdout, "already connected to ") {
        return ConnectReply::AlreadyConnected(name);
    }
    if stdout.contains("unable to connect") || stdout.contains("failed to connect") {
        return ConnectReply::Refused;
    }
    if let Some(name) = name_after(stdout, "connected to ") {
        return ConnectReply::Connected(name);
    }
    ConnectReply::Unrecognised
}

fn name_after(text: &str, marker: &str) -> Option<String> {
    let start = text.find(marker)? + marker.len();
    let name = text[start..].split_whitespace().next()?;
    Some(name.to_string())
}

/// Result of the `id` probe: `Some(true)` for uid 0, `Some(false)` for any
/// other uid and `None` when the reply carries no uid at all.
pub fn parse_uid_reply(stdout: &str) -> Option<bool> {
    if stdout.contains("uid=0(") {
        Some(true)
    } else if stdout.contains("uid=") {
        Some(false)
    } else {
        None
    }
}
