use std::path::{Path, PathBuf};

use super::*;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("unit_sequence").join(name);
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn frame_number_takes_trailing_run() {
    let n = frame_number("shot01_0100.exr").unwrap();
    assert_eq!(n.value, 100);
    assert_eq!(n.width, 4);
    assert_eq!(n.to_string(), "0100");
}

#[test]
fn frame_number_ignores_directory_digits() {
    let n = frame_number("/renders/v002/beauty.0042.exr").unwrap();
    assert_eq!(n.value, 42);
}

#[test]
fn frame_number_without_digits_is_format_error() {
    let err = frame_number("no_digits_here.exr").unwrap_err();
    assert!(matches!(err, SeqCacheError::Format(_)));
}

#[test]
fn resolve_builds_wildcard_and_padding() {
    let seq = resolve(Path::new("shot01_0100.exr")).unwrap();
    assert_eq!(seq.glob_pattern(), "shot01_*.exr");
    assert_eq!(seq.printf_pattern(), "shot01_%04d.exr");
    assert_eq!(seq.padding, 4);
    assert_eq!(seq.extension, "exr");
    assert_eq!(seq.stem(), "shot01");
    assert_eq!(seq.directory, PathBuf::from("."));
}

#[test]
fn resolve_keeps_dot_and_dash_separators() {
    let dot = resolve(Path::new("/plates/comp.1001.exr")).unwrap();
    assert_eq!(dot.glob_pattern(), "comp.*.exr");
    assert_eq!(dot.directory, PathBuf::from("/plates"));

    let dash = resolve(Path::new("bg-07.exr")).unwrap();
    assert_eq!(dash.glob_pattern(), "bg-*.exr");
    assert_eq!(dash.printf_pattern(), "bg-%02d.exr");
    assert_eq!(dash.stem(), "bg");
}

#[test]
fn resolve_without_separator_is_format_error() {
    assert!(matches!(
        resolve(Path::new("shot0100.exr")),
        Err(SeqCacheError::Format(_))
    ));
    assert!(matches!(
        resolve(Path::new("no_digits_here.exr")),
        Err(SeqCacheError::Format(_))
    ));
}

#[test]
fn frame_path_uses_sequence_padding() {
    let seq = resolve(Path::new("/plates/shot_0100.exr")).unwrap();
    assert_eq!(
        seq.frame_path(7),
        PathBuf::from("/plates").join("shot_0007.exr")
    );
}

#[test]
fn enumerate_sorts_and_filters_members() {
    let dir = scratch_dir("enumerate");
    for name in [
        "shot_0003.exr",
        "shot_0001.exr",
        "shot_0002.exr",
        "shot_0002_old.exr",
        "shot_abcd.exr",
        "other_0001.exr",
        "shot_0004.tif",
    ] {
        std::fs::write(dir.join(name), b"").unwrap();
    }
    std::fs::create_dir_all(dir.join("shot_0009.exr")).unwrap();

    let seq = resolve(&dir.join("shot_0001.exr")).unwrap();
    let members = seq.enumerate().unwrap();
    let frames = members.iter().map(|(n, _)| n.value).collect::<Vec<_>>();
    assert_eq!(frames, vec![1, 2, 3]);
    assert!(members[0].1.ends_with("shot_0001.exr"));
}

#[test]
fn enumerate_keeps_files_sharing_a_frame_number() {
    let dir = scratch_dir("shared_number");
    for name in ["shot_05.exr", "shot_005.exr", "shot_04.exr"] {
        std::fs::write(dir.join(name), b"").unwrap();
    }
    let seq = resolve(&dir.join("shot_05.exr")).unwrap();
    let frames = seq
        .enumerate()
        .unwrap()
        .into_iter()
        .map(|(n, _)| n.value)
        .collect::<Vec<_>>();
    assert_eq!(frames, vec![4, 5, 5]);
}

#[test]
fn frame_run_is_the_last_digit_run() {
    // A trailing version tag owns the last digit run and is not separator-preceded.
    assert!(matches!(
        resolve(Path::new("plate_0100_v2.exr")),
        Err(SeqCacheError::Format(_))
    ));

    let seq = resolve(Path::new("shot_01_0100.exr")).unwrap();
    assert_eq!(seq.glob_pattern(), "shot_01_*.exr");
    assert_eq!(seq.stem(), "shot_01");
    assert_eq!(seq.sample_frame, FrameNumber::new(100, 4));
}
