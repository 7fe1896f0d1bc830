use assert_cmd::Command;
use predicates::prelude::*;
use pxit_core::{FrameEncoder, Geometry};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn pxit(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pxit").unwrap();
    cmd.current_dir(dir);
    cmd
}

fn sample_file(dir: &Path, name: &str, len: usize) -> (PathBuf, Vec<u8>) {
    let data: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
    let path = dir.join(name);
    fs::write(&path, &data).unwrap();
    (path, data)
}

fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == extension))
        .collect();
    files.sort();
    files
}

/// Studio-swing YUV for each of the four saturated cell colors.
fn yuv_for(pixel: u32) -> (u8, u8, u8) {
    match pixel {
        0xFFFF_0000 => (81, 90, 240),
        0xFFFF_FFFF => (235, 128, 128),
        0xFF00_00FF => (41, 240, 110),
        0xFF00_FF00 => (145, 54, 34),
        _ => (16, 128, 128),
    }
}

/// Packs frames as a raw YUYV stream, as a capture card would deliver them.
fn yuyv_stream(data: &[u8]) -> Vec<u8> {
    let mut stream = Vec::new();
    for frame in FrameEncoder::new(Geometry::default(), data).unwrap() {
        for pair in frame.pixels().chunks_exact(2) {
            let (y0, u, v) = yuv_for(pair[0]);
            let (y1, _, _) = yuv_for(pair[1]);
            stream.extend([y0, u, y1, v]);
        }
    }
    stream
}

#[test]
fn test_encode_writes_numbered_frames() {
    let dir = TempDir::new().unwrap();
    let (input, _) = sample_file(dir.path(), "report.pdf", 1000);

    pxit(dir.path())
        .arg("encode")
        .arg(&input)
        .args(["-o", "frames", "--trailer", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("6 frames (4 data, 2 trailer)"));

    let frames = files_with_extension(&dir.path().join("frames"), "tga");
    let names: Vec<_> = frames
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "report-00.tga",
            "report-01.tga",
            "report-02.tga",
            "report-03.tga",
            "report-04.tga",
            "report-05.tga"
        ]
    );

    // Trailer frames repeat the last data frame
    let last = fs::read(&frames[3]).unwrap();
    assert_eq!(fs::read(&frames[5]).unwrap(), last);
    assert_eq!(last.len(), 18 + 720 * 480 * 4);
}

#[test]
fn test_encode_decode_round_trip() {
    let dir = TempDir::new().unwrap();
    let (input, data) = sample_file(dir.path(), "archive.7z", 2500);

    pxit(dir.path())
        .arg("encode")
        .arg(&input)
        .args(["-o", "frames", "--trailer", "3", "--depth", "24"])
        .assert()
        .success();

    pxit(dir.path())
        .args(["decode", "frames", "-o", "received"])
        .assert()
        .success()
        .stdout(predicate::str::contains("File transfer complete"));

    let received = files_with_extension(&dir.path().join("received"), "7z");
    assert_eq!(received.len(), 1);
    assert_eq!(fs::read(&received[0]).unwrap(), data);
}

#[test]
fn test_decode_reports_missing_blocks() {
    let dir = TempDir::new().unwrap();
    let (input, _) = sample_file(dir.path(), "data.bin", 1000);

    pxit(dir.path())
        .arg("encode")
        .arg(&input)
        .args(["-o", "frames", "--trailer", "0"])
        .assert()
        .success();
    fs::remove_file(dir.path().join("frames").join("data-01.tga")).unwrap();

    pxit(dir.path())
        .args(["decode", "frames", "-o", "received"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No complete file recovered"));
}

#[test]
fn test_encode_rejects_empty_file() {
    let dir = TempDir::new().unwrap();
    let (input, _) = sample_file(dir.path(), "empty.bin", 0);

    pxit(dir.path())
        .args(["-v", "encode"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot encode an empty file"));
}

#[test]
fn test_inspect_json() {
    let dir = TempDir::new().unwrap();
    let (input, _) = sample_file(dir.path(), "notes.txt", 700);

    pxit(dir.path())
        .arg("encode")
        .arg(&input)
        .args(["-o", "frames", "--trailer", "0"])
        .assert()
        .success();

    let output = pxit(dir.path())
        .args(["inspect", "--json", "frames/notes-02.tga"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let packet = &reports[0]["packet"];
    assert_eq!(packet["file_length"], 700);
    assert_eq!(packet["sequence"], 2);
    assert_eq!(packet["blocks"], 3);
    assert_eq!(packet["checksum_valid"], true);
    assert_eq!(reports[0]["unclassifiable_cells"], 0);
}

#[test]
fn test_inspect_table_flags_unreadable_images() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("junk.tga"), b"not an image").unwrap();

    pxit(dir.path())
        .args(["inspect", "junk.tga"])
        .assert()
        .success()
        .stdout(predicate::str::contains("junk.tga"))
        .stdout(predicate::str::contains("Invalid image"));
}

#[test]
fn test_scope_writes_diagnostics() {
    let dir = TempDir::new().unwrap();
    let (input, _) = sample_file(dir.path(), "shot.bin", 100);

    pxit(dir.path())
        .arg("encode")
        .arg(&input)
        .args(["-o", ".", "--trailer", "0"])
        .assert()
        .success();

    pxit(dir.path())
        .args(["scope", "shot-00.tga"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unclassifiable  0"));

    for suffix in ["-annotated.tga", "-classified.tga", "-raw.tga", "-data.txt"] {
        assert!(dir.path().join(format!("shot-00{suffix}")).exists(), "{suffix}");
    }

    let data = fs::read_to_string(dir.path().join("shot-00-data.txt")).unwrap();
    assert_eq!(data.lines().count(), 1350);
    assert!(data.starts_with("row 0, col 0: z1 = "));
}

#[test]
fn test_scope_requires_targa_extension() {
    let dir = TempDir::new().unwrap();

    pxit(dir.path())
        .args(["scope", "frame.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(".tga"));
}

#[test]
fn test_capture_from_stdin() {
    let dir = TempDir::new().unwrap();
    let data: Vec<u8> = (0..900u32).map(|i| (i % 256) as u8).collect();

    let mut stream = yuyv_stream(&data);
    // Replay the stream so the receiver sees every block twice
    stream.extend(stream.clone());

    pxit(dir.path())
        .args(["capture", "-", "-o", "received"])
        .write_stdin(stream)
        .assert()
        .success()
        .stdout(predicate::str::contains("File transfer complete"));

    let received = files_with_extension(&dir.path().join("received"), "7z");
    assert_eq!(received.len(), 1);
    assert_eq!(fs::read(&received[0]).unwrap(), data);
}

#[test]
fn test_capture_ignores_blank_frames_after_transfer() {
    let dir = TempDir::new().unwrap();
    let data: Vec<u8> = (0..900u32).map(|i| (i * 3 % 256) as u8).collect();

    let mut stream = yuyv_stream(&data);
    // The sender stops and the capture card delivers black frames
    let black_frame = [16u8, 128, 16, 128].repeat(720 * 480 / 2);
    for _ in 0..50 {
        stream.extend_from_slice(&black_frame);
    }

    pxit(dir.path())
        .args(["capture", "-", "-o", "received"])
        .write_stdin(stream)
        .assert()
        .success()
        .stdout(predicate::str::contains("File transfer complete"))
        .stdout(predicate::str::contains("Saved diagnostic frame").not());

    let received = dir.path().join("received");
    assert!(files_with_extension(&received, "tga").is_empty());
    assert_eq!(files_with_extension(&received, "7z").len(), 1);
}

#[test]
fn test_config_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let (input, _) = sample_file(dir.path(), "cfg.bin", 10);
    fs::write(
        dir.path().join("pxit.toml"),
        "[encoder]\ntrailer_frames = 1\nimage_depth = 24\n",
    )
    .unwrap();

    pxit(dir.path())
        .arg("encode")
        .arg(&input)
        .args(["-o", "frames"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 frames (1 data, 1 trailer)"));

    let frame = fs::read(dir.path().join("frames").join("cfg-00.tga")).unwrap();
    assert_eq!(frame[16], 24);
}
