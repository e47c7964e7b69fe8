// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::id::InstanceId;
use std::path::{Path, PathBuf};

fn mapper() -> PathMapper {
    PathMapper::new(vec![
        PathMapping {
            instance_id: InstanceId::new("radarr"),
            local_prefix: PathBuf::from("/mnt/media/movies"),
            remote_prefix: PathBuf::from("/movies"),
        },
        PathMapping {
            instance_id: InstanceId::new("radarr"),
            local_prefix: PathBuf::from("/mnt/media/movies/4k"),
            remote_prefix: PathBuf::from("/movies-4k"),
        },
        PathMapping {
            instance_id: InstanceId::new("sonarr"),
            local_prefix: PathBuf::from("/mnt/media/tv"),
            remote_prefix: PathBuf::from("/tv"),
        },
    ])
}

#[test]
fn to_local_substitutes_prefix() {
    let mapped = mapper().to_local(Path::new("/movies/a/a.mkv"), &InstanceId::new("radarr"));
    assert_eq!(mapped, Mapped::Mapped(PathBuf::from("/mnt/media/movies/a/a.mkv")));
}

#[test]
fn to_remote_substitutes_prefix() {
    let mapped = mapper().to_remote(
        Path::new("/mnt/media/tv/show/s01e01.mkv"),
        &InstanceId::new("sonarr"),
    );
    assert_eq!(mapped, Mapped::Mapped(PathBuf::from("/tv/show/s01e01.mkv")));
}

#[test]
fn longest_prefix_wins() {
    let mapped = mapper().to_remote(
        Path::new("/mnt/media/movies/4k/b/b.mkv"),
        &InstanceId::new("radarr"),
    );
    assert_eq!(mapped, Mapped::Mapped(PathBuf::from("/movies-4k/b/b.mkv")));
}

#[test]
fn unmapped_path_returned_verbatim() {
    let mapped = mapper().to_local(Path::new("/music/x.flac"), &InstanceId::new("radarr"));
    assert_eq!(mapped, Mapped::Unmapped(PathBuf::from("/music/x.flac")));
    assert!(!mapped.is_mapped());
}

#[test]
fn mappings_are_scoped_by_instance() {
    // sonarr's prefix must not apply to radarr lookups
    let mapped = mapper().to_local(Path::new("/tv/show/e.mkv"), &InstanceId::new("radarr"));
    assert!(!mapped.is_mapped());
}

#[test]
fn prefix_match_respects_component_boundaries() {
    // "/movies-extended" must not match the "/movies" prefix
    let mapped = mapper().to_local(
        Path::new("/movies-extended/c.mkv"),
        &InstanceId::new("radarr"),
    );
    assert!(!mapped.is_mapped());
}

#[test]
fn into_path_returns_inner_path_either_way() {
    assert_eq!(
        Mapped::Mapped(PathBuf::from("/a")).into_path(),
        PathBuf::from("/a")
    );
    assert_eq!(
        Mapped::Unmapped(PathBuf::from("/b")).into_path(),
        PathBuf::from("/b")
    );
}
