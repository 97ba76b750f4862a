use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn id3_text_frame(id: &[u8; 4], text: &str) -> Vec<u8> {
    let mut frame = id.to_vec();
    frame.extend_from_slice(&((text.len() + 1) as u32).to_be_bytes());
    frame.extend_from_slice(&[0, 0, 0]); // flags, then ISO-8859-1
    frame.extend_from_slice(text.as_bytes());
    frame
}

fn mp3(artist: &str, album: &str, track: &str, title: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend(id3_text_frame(b"TPE1", artist));
    body.extend(id3_text_frame(b"TALB", album));
    body.extend(id3_text_frame(b"TRCK", track));
    body.extend(id3_text_frame(b"TIT2", title));
    body.extend_from_slice(&[0u8; 16]); // padding

    let size = body.len() as u32;
    let mut tag = b"ID3\x03\x00\x00".to_vec();
    tag.extend_from_slice(&[
        ((size >> 21) & 0x7f) as u8,
        ((size >> 14) & 0x7f) as u8,
        ((size >> 7) & 0x7f) as u8,
        (size & 0x7f) as u8,
    ]);
    tag.extend_from_slice(&body);
    tag.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x64, 0x00, 0x00]);
    tag
}

fn atom(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

fn data(type_code: u32, value: &[u8]) -> Vec<u8> {
    let mut payload = type_code.to_be_bytes().to_vec();
    payload.extend_from_slice(&[0, 0, 0, 0]);
    payload.extend_from_slice(value);
    atom(b"data", &payload)
}

fn m4a(artist: &str, title: &str, track: u16) -> Vec<u8> {
    let mut ilst = Vec::new();
    ilst.extend(atom(b"\xA9ART", &data(1, artist.as_bytes())));
    ilst.extend(atom(b"\xA9nam", &data(1, title.as_bytes())));
    let mut trkn = vec![0, 0];
    trkn.extend_from_slice(&track.to_be_bytes());
    trkn.extend_from_slice(&[0, 9, 0, 0]);
    ilst.extend(atom(b"trkn", &data(0, &trkn)));

    let mut hdlr = vec![0u8; 8];
    hdlr.extend_from_slice(b"mdirappl");
    hdlr.extend_from_slice(&[0u8; 9]);

    let mut meta = vec![0u8; 4];
    meta.extend(atom(b"hdlr", &hdlr));
    meta.extend(atom(b"ilst", &ilst));

    let moov = atom(b"moov", &atom(b"udta", &atom(b"meta", &meta)));

    let mut file = atom(b"ftyp", b"M4A \x00\x00\x00\x00M4A mp42");
    file.extend(atom(b"mdat", &[0x21; 64]));
    file.extend(moov);
    file
}

/// A small mounted-iPod lookalike.
fn ipod() -> TempDir {
    let root = TempDir::new().unwrap();
    let music = root.path().join("iPod_Control").join("Music");
    fs::create_dir_all(music.join("F00")).unwrap();
    fs::create_dir_all(music.join("F01")).unwrap();

    fs::write(
        music.join("F00").join("ABCD.mp3"),
        mp3("AC/DC", "Who Made Who", "3/10", "Ride On"),
    )
    .unwrap();
    fs::write(music.join("F01").join("EFGH.m4a"), m4a("Nina Simone", "Sinnerman", 7)).unwrap();
    fs::write(music.join("F01").join("JUNK.m4a"), [0u8; 24]).unwrap();
    fs::write(root.path().join("iPod_Control").join("iTunesDB"), b"db").unwrap();

    root
}

fn podextract(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("podextract").unwrap();
    cmd.current_dir(workdir).env_remove("RUST_LOG");
    cmd
}

fn ride_on(dest: &Path) -> PathBuf {
    dest.join("AC_DC").join("Who Made Who").join("03 - Ride On.mp3")
}

#[test]
fn lists_plan_without_destination() {
    let source = ipod();

    podextract(source.path())
        .arg(source.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No destination folder!"))
        .stdout(predicate::str::contains("ABCD.mp3"))
        .stdout(predicate::str::contains("JUNK.m4a").not());
}

#[test]
fn copies_into_artist_album_layout() {
    let source = ipod();
    let dest = TempDir::new().unwrap();

    podextract(source.path())
        .arg(source.path())
        .arg(dest.path())
        .assert()
        .success();

    assert!(ride_on(dest.path()).is_file());
    assert!(dest
        .path()
        .join("Nina Simone")
        .join("07 - Sinnerman.m4a")
        .is_file());
    assert_eq!(
        fs::read(ride_on(dest.path())).unwrap(),
        fs::read(source.path().join("iPod_Control/Music/F00/ABCD.mp3")).unwrap()
    );
}

#[test]
fn dry_run_copies_nothing() {
    let source = ipod();
    let dest = TempDir::new().unwrap();

    podextract(source.path())
        .arg(source.path())
        .arg(dest.path())
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("03 - Ride On.mp3"));

    assert!(!ride_on(dest.path()).exists());
}

#[test]
fn json_report_on_stdout() {
    let source = ipod();
    let dest = TempDir::new().unwrap();

    let output = podextract(source.path())
        .arg(source.path())
        .arg(dest.path())
        .args(["--output-format", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["succeeded"], 2);
    assert_eq!(report["failed"], 0);
    assert_eq!(report["cancelled"], false);
}

#[test]
fn writes_report_file_when_asked() {
    let source = ipod();
    let dest = TempDir::new().unwrap();

    podextract(source.path())
        .arg(source.path())
        .arg(dest.path())
        .arg("--write-report")
        .assert()
        .success();

    assert!(dest.path().join("podextract-report.json").is_file());
}

#[test]
fn missing_source_exits_3() {
    let workdir = TempDir::new().unwrap();

    podextract(workdir.path())
        .arg(workdir.path().join("not-mounted"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid source folder"));
}

#[test]
fn empty_source_exits_6() {
    let source = TempDir::new().unwrap();
    fs::write(source.path().join("readme.txt"), b"nothing here").unwrap();

    podextract(source.path()).arg(source.path()).assert().code(6);
}

#[test]
fn unreadable_tracks_only_exit_6() {
    let source = TempDir::new().unwrap();
    fs::write(source.path().join("JUNK.m4a"), [0u8; 24]).unwrap();
    let dest = TempDir::new().unwrap();

    podextract(source.path())
        .arg(source.path())
        .arg(dest.path())
        .assert()
        .code(6)
        .stderr(predicate::str::contains("There are no files to extract!"));

    assert_eq!(fs::read_dir(dest.path()).unwrap().count(), 0);
}

#[test]
fn unwritable_destination_exits_4() {
    let source = ipod();
    let blocker = TempDir::new().unwrap();
    let dest = blocker.path().join("file-not-dir");
    fs::write(&dest, b"x").unwrap();

    podextract(source.path())
        .arg(source.path())
        .arg(&dest)
        .assert()
        .code(4);
}

#[test]
fn failed_entries_exit_2() {
    let source = ipod();
    let dest = TempDir::new().unwrap();
    // a plain file where the artist folder belongs
    fs::write(dest.path().join("AC_DC"), b"in the way").unwrap();

    podextract(source.path())
        .arg(source.path())
        .arg(dest.path())
        .assert()
        .code(2)
        .stdout(predicate::str::contains("Issues encountered"));

    assert!(dest
        .path()
        .join("Nina Simone")
        .join("07 - Sinnerman.m4a")
        .is_file());
}

#[test]
fn no_overwrite_keeps_existing_files() {
    let source = ipod();
    let dest = TempDir::new().unwrap();
    fs::create_dir_all(ride_on(dest.path()).parent().unwrap()).unwrap();
    fs::write(ride_on(dest.path()), b"keep me").unwrap();

    podextract(source.path())
        .arg(source.path())
        .arg(dest.path())
        .arg("--no-overwrite")
        .assert()
        .code(2);

    assert_eq!(fs::read(ride_on(dest.path())).unwrap(), b"keep me");
}

#[test]
fn generate_config_writes_sample() {
    let workdir = TempDir::new().unwrap();
    let config = workdir.path().join("podextract.toml");

    podextract(workdir.path())
        .arg("--generate-config")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated sample configuration file"));

    let content = fs::read_to_string(config).unwrap();
    assert!(content.contains("[scan]"));
}

#[test]
fn invalid_config_is_reported() {
    let source = ipod();
    let config = source.path().join("broken.toml");
    fs::write(&config, "[scan]\nmax_depth = \"deep\"\n").unwrap();

    podextract(source.path())
        .arg(source.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}
