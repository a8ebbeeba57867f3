use std::path::Path;

use super::*;
use crate::layers::source::FixedChannelSource;

#[test]
fn rgb_layer_is_kept_and_single_component_group_is_dropped() {
    let layers = classify(["beauty.R", "beauty.G", "beauty.B", "depth.Z"]);
    assert_eq!(layers.len(), 1);

    let beauty = &layers["beauty"];
    assert!(beauty.has_rgb());
    assert!(!beauty.has_rgba());
    assert!(beauty.is_displayable());
    assert!(!layers.contains_key("depth"));
}

#[test]
fn alpha_makes_rgba() {
    let layers = classify(["fx.R", "fx.G", "fx.B", "fx.A"]);
    assert!(layers["fx"].has_rgba());
    assert_eq!(layers["fx"].channels.len(), 4);
}

#[test]
fn undotted_names_are_ignored() {
    let layers = classify(["R", "G", "B", "A", "Z"]);
    assert!(layers.is_empty());
}

#[test]
fn incomplete_rgb_is_dropped() {
    let layers = classify(["specular.R", "specular.G", "specular.A"]);
    assert!(layers.is_empty());
}

#[test]
fn layer_key_keeps_every_segment_but_the_last() {
    let layers = classify([
        "light.key.R",
        "light.key.G",
        "light.key.B",
        "light.R",
        "light.G",
    ]);
    assert_eq!(layers.keys().collect::<Vec<_>>(), vec!["light.key"]);
    assert_eq!(
        layers["light.key"].rgb_selection(),
        "light.key.R,light.key.G,light.key.B"
    );
}

#[test]
fn duplicate_channel_names_collapse() {
    let layers = classify(["a.R", "a.G", "a.B", "a.R", "a.G"]);
    assert_eq!(layers["a"].channels.len(), 3);
}

#[test]
fn component_match_is_case_sensitive() {
    let layers = classify(["n.r", "n.g", "n.b"]);
    assert!(layers.is_empty());
}

#[test]
fn analyze_reads_through_source() {
    let source = FixedChannelSource::new().with_channels(
        "shot_0001.exr",
        ["beauty.R", "beauty.G", "beauty.B", "diffuse.R", "depth.Z"],
    );
    let layers = analyze_container(&source, Path::new("shot_0001.exr")).unwrap();
    assert_eq!(layers.len(), 1);
    assert!(is_displayable(&layers["beauty"]));
}

#[test]
fn analyze_missing_container_is_file_access_error() {
    let source = FixedChannelSource::new();
    let err = analyze_container(&source, Path::new("missing.exr")).unwrap_err();
    assert!(matches!(
        err,
        crate::foundation::error::SeqCacheError::FileAccess { .. }
    ));
}
