// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn uuid_gen_produces_unique_ids() {
    let gen = UuidIdGen;
    let a = gen.next();
    let b = gen.next();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
}

#[test]
fn sequential_gen_produces_predictable_ids() {
    let gen = SequentialIdGen::new("corr");
    assert_eq!(gen.next(), "corr-1");
    assert_eq!(gen.next(), "corr-2");
}

#[test]
fn sequential_gen_clones_share_counter() {
    let gen = SequentialIdGen::new("x");
    let clone = gen.clone();
    assert_eq!(gen.next(), "x-1");
    assert_eq!(clone.next(), "x-2");
}

#[test]
fn short_truncates_long_ids() {
    let id = CorruptionId::new("abcdefghijklmnop");
    assert_eq!(id.short(8), "abcdefgh");
    assert_eq!(id.short(100), "abcdefghijklmnop");
}

#[test]
fn id_equality_with_str() {
    let id = ScanPathId::new("movies");
    assert_eq!(id, "movies");
    assert_eq!(id, *"movies");
}

#[test]
fn id_display_roundtrip() {
    let id = InstanceId::new("radarr-main");
    assert_eq!(id.to_string(), "radarr-main");
    assert_eq!(InstanceId::from(id.to_string()), id);
}
