// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    loopback = { "http://127.0.0.1:7878" },
    loopback_name = { "http://localhost:8989" },
    loopback_subdomain = { "http://api.localhost" },
    mdns = { "http://radarr.local:7878" },
    private_10 = { "http://10.0.0.5:7878" },
    private_172 = { "http://172.16.3.4" },
    private_192 = { "http://192.168.1.20:8989" },
    link_local = { "http://169.254.1.1" },
    unspecified = { "http://0.0.0.0" },
    v6_loopback = { "http://[::1]:7878" },
    v6_unique_local = { "http://[fd00::1]" },
    v6_link_local = { "http://[fe80::1]" },
)]
fn private_addresses_are_rejected(url: &str) {
    let err = validate_base_url(url, false).unwrap_err();
    assert!(matches!(err, ArrError::InvalidUrl(_)), "{url}: {err}");
}

#[parameterized(
    loopback = { "http://127.0.0.1:7878" },
    private_192 = { "http://192.168.1.20:8989" },
    v6_loopback = { "http://[::1]:7878" },
)]
fn allow_private_admits_private_addresses(url: &str) {
    assert!(validate_base_url(url, true).is_ok());
}

#[parameterized(
    public_name = { "https://arr.example.com" },
    public_ip = { "http://203.0.113.10:7878" },
)]
fn public_addresses_pass(url: &str) {
    assert!(validate_base_url(url, false).is_ok());
}

#[test]
fn non_http_schemes_are_rejected() {
    let err = validate_base_url("ftp://arr.example.com", false).unwrap_err();
    assert!(matches!(err, ArrError::InvalidUrl(_)));

    let err = validate_base_url("file:///etc/passwd", true).unwrap_err();
    assert!(matches!(err, ArrError::InvalidUrl(_)));
}

#[test]
fn garbage_is_rejected() {
    assert!(validate_base_url("not a url", false).is_err());
    assert!(validate_base_url("", false).is_err());
}
