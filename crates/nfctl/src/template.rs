// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Placeholder templates for environment values and provisioning batches.
//!
//! Supported placeholders:
//!
//! | Placeholder | Value |
//! |-------------|-------|
//! | `${HOST_IP}` | host source address from the network probe |
//! | `${HOST_INTERFACE}` | host outbound interface name |
//! | `${SELF_IP}` | address of the container just started |
//! | `${IP:<unit>}` | runtime address of another launch unit |

use std::collections::HashMap;
use std::net::IpAddr;

use crate::config::ConfigError;
use crate::network::HostNetwork;

/// A placeholder found in a template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// `${HOST_IP}`
    HostIp,
    /// `${HOST_INTERFACE}`
    HostInterface,
    /// `${SELF_IP}`
    SelfIp,
    /// `${IP:<unit>}`
    UnitIp(String),
}

enum Segment<'a> {
    Text(&'a str),
    Value(Placeholder),
}

fn segments<'a>(template: &'a str, unit: &str) -> Result<Vec<Segment<'a>>, ConfigError> {
    let invalid = |placeholder: &str| ConfigError::InvalidPlaceholder {
        unit: unit.to_string(),
        placeholder: placeholder.to_string(),
    };

    let mut out = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        if start > 0 {
            out.push(Segment::Text(&rest[..start]));
        }
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| invalid(&rest[start..]))?;
        let name = &after[..end];
        let placeholder = match name {
            "HOST_IP" => Placeholder::HostIp,
            "HOST_INTERFACE" => Placeholder::HostInterface,
            "SELF_IP" => Placeholder::SelfIp,
            _ => match name.strip_prefix("IP:") {
                Some(key) if !key.is_empty() => Placeholder::UnitIp(key.to_string()),
                _ => return Err(invalid(&format!("${{{}}}", name))),
            },
        };
        out.push(Segment::Value(placeholder));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        out.push(Segment::Text(rest));
    }
    Ok(out)
}

/// List the placeholders used by a template, in order of appearance.
pub fn placeholders(template: &str, unit: &str) -> Result<Vec<Placeholder>, ConfigError> {
    Ok(segments(template, unit)?
        .into_iter()
        .filter_map(|s| match s {
            Segment::Value(p) => Some(p),
            Segment::Text(_) => None,
        })
        .collect())
}

/// Values available while rendering a template.
#[derive(Debug)]
pub struct Bindings<'a> {
    /// Host network facts.
    pub host: &'a HostNetwork,
    /// Address of the unit being provisioned, once started.
    pub self_ip: Option<IpAddr>,
    /// Resolved addresses of launch units, by unit key.
    pub units: &'a HashMap<String, IpAddr>,
}

/// Render a template, substituting every placeholder.
///
/// Fails when a placeholder is malformed or has no bound value.
pub fn render(template: &str, unit: &str, bindings: &Bindings<'_>) -> Result<String, ConfigError> {
    let unbound = |placeholder: &Placeholder| ConfigError::InvalidPlaceholder {
        unit: unit.to_string(),
        placeholder: format!("{:?} has no value", placeholder),
    };

    let mut out = String::with_capacity(template.len());
    for segment in segments(template, unit)? {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Value(Placeholder::HostIp) => out.push_str(&bindings.host.address.to_string()),
            Segment::Value(Placeholder::HostInterface) => out.push_str(&bindings.host.interface),
            Segment::Value(p @ Placeholder::SelfIp) => {
                let ip = bindings.self_ip.ok_or_else(|| unbound(&p))?;
                out.push_str(&ip.to_string());
            }
            Segment::Value(Placeholder::UnitIp(key)) => {
                let ip = bindings
                    .units
                    .get(&key)
                    .ok_or_else(|| unbound(&Placeholder::UnitIp(key.clone())))?;
                out.push_str(&ip.to_string());
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn host() -> HostNetwork {
        HostNetwork {
            interface: "eth0".to_string(),
            address: Ipv4Addr::new(192, 0, 2, 10),
        }
    }

    #[test]
    fn test_placeholders() {
        let found = placeholders("${HOST_IP}:${IP:cassandra}/${SELF_IP}", "hss").unwrap();
        assert_eq!(
            found,
            vec![
                Placeholder::HostIp,
                Placeholder::UnitIp("cassandra".to_string()),
                Placeholder::SelfIp
            ]
        );
        assert!(placeholders("plain", "hss").unwrap().is_empty());
    }

    #[test]
    fn test_placeholders_invalid() {
        assert!(matches!(
            placeholders("${NOPE}", "hss"),
            Err(ConfigError::InvalidPlaceholder { .. })
        ));
        assert!(placeholders("${IP:}", "hss").is_err());
        assert!(placeholders("prefix ${HOST_IP", "hss").is_err());
    }

    #[test]
    fn test_render() {
        let host = host();
        let mut units = HashMap::new();
        units.insert("cassandra".to_string(), "172.17.0.2".parse().unwrap());
        let bindings = Bindings {
            host: &host,
            self_ip: Some("172.17.0.3".parse().unwrap()),
            units: &units,
        };

        assert_eq!(
            render("db=${IP:cassandra} me=${SELF_IP} if=${HOST_INTERFACE} host=${HOST_IP}", "hss", &bindings)
                .unwrap(),
            "db=172.17.0.2 me=172.17.0.3 if=eth0 host=192.0.2.10"
        );
        // Braces outside placeholders are literal
        assert_eq!(
            render("{'class': 'SimpleStrategy'}", "hss", &bindings).unwrap(),
            "{'class': 'SimpleStrategy'}"
        );
    }

    #[test]
    fn test_render_unbound() {
        let host = host();
        let units = HashMap::new();
        let bindings = Bindings {
            host: &host,
            self_ip: None,
            units: &units,
        };
        assert!(render("${SELF_IP}", "hss", &bindings).is_err());
        assert!(render("${IP:mme}", "enb", &bindings).is_err());
    }
}
