// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server-Side-Request-Forgery guard for configured manager URLs.
//!
//! Base URLs pointing at loopback, link-local or private ranges are
//! rejected unless the configuration explicitly allows them (the common
//! homelab case is a manager on the same LAN, so the flag exists, but it
//! must be a deliberate choice).

use super::ArrError;
use std::net::IpAddr;
use url::{Host, Url};

/// Validate a manager base URL. Returns the parsed URL on success.
pub fn validate_base_url(base_url: &str, allow_private: bool) -> Result<Url, ArrError> {
    let url = Url::parse(base_url).map_err(|e| ArrError::InvalidUrl(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ArrError::InvalidUrl(format!(
                "unsupported scheme '{other}'"
            )))
        }
    }

    let Some(host) = url.host() else {
        return Err(ArrError::InvalidUrl("missing host".to_string()));
    };

    if allow_private {
        return Ok(url);
    }

    match host {
        Host::Ipv4(ip) => reject_ip(IpAddr::V4(ip))?,
        Host::Ipv6(ip) => reject_ip(IpAddr::V6(ip))?,
        Host::Domain(domain) => {
            let lower = domain.to_ascii_lowercase();
            if lower == "localhost" || lower.ends_with(".localhost") || lower.ends_with(".local") {
                return Err(ArrError::InvalidUrl(format!(
                    "host '{domain}' resolves locally; set allow_private_urls to permit it"
                )));
            }
        }
    }

    Ok(url)
}

fn reject_ip(ip: IpAddr) -> Result<(), ArrError> {
    let private = match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    };

    if private {
        Err(ArrError::InvalidUrl(format!(
            "address {ip} is private; set allow_private_urls to permit it"
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
#[path = "ssrf_tests.rs"]
mod tests;
