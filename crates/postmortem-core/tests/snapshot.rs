//! Snapshot capture, persistence, and navigation

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use postmortem_core::object::{self, Frame};
use postmortem_core::prelude::*;
use postmortem_core::snapshot::{dump_path, ThreadCapture, VERSION};
use tempfile::tempdir;

const SOURCE: &str = "def handler(request):\n    total = compute(request)\n    return total\n\ndef compute(request):\n    raise ValueError(request)\n";

fn stack(source: &Path) -> Arc<Frame>
{
    let filename = source.to_string_lossy().into_owned();
    let outer = common::frame(
        "handler",
        &filename,
        2,
        vec![("request", object::string("GET /"))],
        None,
    );
    common::frame(
        "compute",
        &filename,
        6,
        vec![
            ("request", object::string("GET /")),
            ("attempts", object::int(3)),
            ("y", object::list(vec![object::int(3), object::dict(vec![(object::string("a"), object::list(vec![object::int(4)]))])])),
        ],
        Some(outer),
    )
}

#[test]
fn test_capture_load_and_navigate()
{
    let dir = tempdir().unwrap();
    let source = dir.path().join("app.py");
    fs::write(&source, SOURCE).unwrap();
    let registry = common::registry();
    let frame = stack(&source);

    let options = CaptureOptions::default().with_description("ValueError: GET /");
    let snapshot = Snapshot::capture(&registry, &frame, &options);
    let filename = source.to_string_lossy().into_owned();
    assert_eq!(snapshot.files[&filename].len(), 6);
    assert_eq!(snapshot.files[&filename][0], "def handler(request):\n");

    let loaded = snapshot.load(registry);
    let inner = loaded.frame_view().expect("innermost frame should load");
    assert_eq!(inner.name().as_deref(), Some("compute"));
    assert_eq!(inner.lineno(), Some(6));
    assert_eq!(inner.local("attempts").and_then(|v| v.as_int()), Some(3));
    let names: Vec<String> = inner.locals().into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["request", "attempts", "y"]);

    let outer = inner.back().expect("caller frame should load");
    assert_eq!(outer.name().as_deref(), Some("handler"));
    assert!(outer.back().is_none());
    assert_eq!(
        loaded.source_line(&filename, outer.lineno().unwrap_or_default()),
        Some("    total = compute(request)")
    );
    assert_eq!(loaded.source_line(&filename, 0), None);
}

#[test]
fn test_depth_counts_from_frame_locals()
{
    let dir = tempdir().unwrap();
    let registry = common::registry();
    let frame = stack(&dir.path().join("missing.py"));

    let snapshot = Snapshot::capture(&registry, &frame, &CaptureOptions::default().with_depth(1));
    assert!(snapshot.files.is_empty());

    let loaded = snapshot.load(registry);
    let inner = loaded.frame_view().unwrap();
    assert_eq!(inner.local("attempts").and_then(|v| v.as_int()), Some(3));
    let (_, y) = inner.locals().into_iter().find(|(name, _)| name == "y").unwrap();
    assert_eq!(loaded.container.graph().repr(&y), "[<Unknown Object>, <Unknown Object>]");
}

#[test]
fn test_unbounded_depth_option_saturates()
{
    let dir = tempdir().unwrap();
    let registry = common::registry();
    let frame = stack(&dir.path().join("missing.py"));

    let snapshot = Snapshot::capture(&registry, &frame, &CaptureOptions::default().with_depth(usize::MAX));
    let loaded = snapshot.load(registry);
    let inner = loaded.frame_view().unwrap();
    let (_, y) = inner.locals().into_iter().find(|(name, _)| name == "y").unwrap();
    assert_eq!(loaded.container.graph().repr(&y), "[3, {'a': [4]}]");
}

#[test]
fn test_gzip_file_round_trip()
{
    let dir = tempdir().unwrap();
    let registry = common::registry();
    let frame = stack(&dir.path().join("app.py"));
    let snapshot = Snapshot::capture(&registry, &frame, &CaptureOptions::default());

    let path = dir.path().join("nested").join("crash.dump");
    snapshot.write_to(&path).unwrap();
    let raw = fs::read(&path).unwrap();
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);

    let reread = Snapshot::read_from(&path).unwrap();
    assert_eq!(reread, snapshot);
}

#[test]
fn test_json_file_is_plain_text()
{
    let dir = tempdir().unwrap();
    let registry = common::registry();
    let frame = stack(&dir.path().join("app.py"));
    let snapshot = Snapshot::capture(&registry, &frame, &CaptureOptions::default());

    let path = dir.path().join("crash.json");
    snapshot.write_to(&path).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with('{'));
    assert_eq!(Snapshot::from_json(&text).unwrap(), snapshot);
    assert_eq!(Snapshot::read_from(&path).unwrap(), snapshot);
}

#[test]
fn test_malformed_snapshot_reports_path()
{
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{\"objects\": [").unwrap();

    match Snapshot::read_from(&path) {
        Err(PostmortemError::MalformedSnapshot { path: Some(reported), .. }) => assert_eq!(reported, path),
        other => panic!("Expected MalformedSnapshot, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_peek_files_isolates_bad_files()
{
    let dir = tempdir().unwrap();
    let registry = common::registry();
    let frame = stack(&dir.path().join("app.py"));
    let options = CaptureOptions::default().with_description("first line\nsecond line");
    let good = dir.path().join("good.dump");
    Snapshot::capture(&registry, &frame, &options).write_to(&good).unwrap();
    let bad = dir.path().join("bad.dump");
    fs::write(&bad, b"not gzip at all").unwrap();
    let missing = dir.path().join("missing.dump");

    let results = peek_files([&good, &bad, &missing]);
    assert_eq!(results.len(), 3);

    let summary = results[0].1.as_ref().expect("good snapshot should peek");
    assert_eq!(summary.path, good);
    assert_eq!(summary.version, VERSION);
    assert_eq!(summary.description.as_deref(), Some("first line\nsecond line"));
    let printed = summary.to_string();
    assert!(printed.starts_with(&good.display().to_string()));
    assert!(printed.ends_with("\n    first line\n    second line"));

    assert!(results[1].1.is_err());
    assert!(matches!(results[2].1, Err(PostmortemError::Io(_))));
}

#[test]
fn test_version_mismatch_still_loads()
{
    let dir = tempdir().unwrap();
    let registry = common::registry();
    let frame = stack(&dir.path().join("app.py"));
    let mut snapshot = Snapshot::capture(&registry, &frame, &CaptureOptions::default());
    assert!(snapshot.check_version());

    snapshot.metadata.version = "0.0.1-old".to_string();
    assert!(!snapshot.check_version());
    let loaded = snapshot.load(registry);
    assert_eq!(loaded.frame_view().and_then(|view| view.name()).as_deref(), Some("compute"));
}

#[test]
fn test_capture_threads_records_each_stack()
{
    let dir = tempdir().unwrap();
    let registry = common::registry();
    let main = stack(&dir.path().join("app.py"));
    let worker = common::frame("poll", "worker.py", 10, vec![("queue", object::list(Vec::new()))], None);
    let threads = vec![
        ThreadCapture {
            id: "1".to_string(),
            name: "MainThread".to_string(),
            frame: Arc::clone(&main),
        },
        ThreadCapture {
            id: "2".to_string(),
            name: "worker".to_string(),
            frame: Arc::clone(&worker),
        },
    ];

    let snapshot = Snapshot::capture_threads(&registry, &threads, Some("1"), &CaptureOptions::default());
    assert_eq!(snapshot.threads.len(), 2);
    assert_eq!(snapshot.threads["2"].name, "worker");
    assert_eq!(snapshot.current_thread.as_deref(), Some("1"));

    let loaded = snapshot.load(registry);
    assert_eq!(loaded.frame_view().and_then(|view| view.name()).as_deref(), Some("compute"));
    let names: Vec<(String, Option<String>)> = loaded
        .thread_views()
        .into_iter()
        .map(|(id, view)| (id, view.name()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("1".to_string(), Some("compute".to_string())),
            ("2".to_string(), Some("poll".to_string())),
        ]
    );
}

#[test]
fn test_dump_writes_to_directory()
{
    let dir = tempdir().unwrap();
    let registry = common::registry();
    let frame = stack(&dir.path().join("app.py"));

    let written = Snapshot::dump(&registry, &frame, &CaptureOptions::default(), None, Some(dir.path())).unwrap();
    assert!(written.is_absolute());
    assert!(written.starts_with(dir.path()));
    assert!(written.file_name().unwrap().to_string_lossy().starts_with("postmortem_compute_"));
    assert!(Snapshot::read_from(&written).is_ok());

    let both = dump_path("compute", Some(&dir.path().join("x.dump")), Some(dir.path()));
    assert!(matches!(both, Err(PostmortemError::InvalidArgument(_))));
}
