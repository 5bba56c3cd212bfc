//! Integration tests for config and trace files on disk

use std::fs;

use mmtrace::*;
use softmmu::Policy;
use tempfile::TempDir;

#[test]
fn test_config_file_with_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mmtrace.toml");
    fs::write(&path, "policy = \"third-chance\"\nframes = 2\npages = 8\n").unwrap();

    let config = TraceConfig::load(&path).expect("load failed");
    assert_eq!(config.policy, Policy::ThirdChance);
    assert_eq!(config.page_size, 4096);

    let config = config.with_overrides(&Overrides {
        policy: Some(Policy::Fifo),
        ..Default::default()
    });
    assert_eq!(config.policy, Policy::Fifo);
    assert_eq!(config.frames, 2);
    assert_eq!(config.pages, 8);
}

#[test]
fn test_missing_config_names_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    let err = TraceConfig::load(&path).unwrap_err();
    assert!(matches!(err, TraceError::Read { .. }));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_bad_config_value() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "policy = \"lru\"\n").unwrap();
    assert!(matches!(TraceConfig::load(&path), Err(TraceError::Config(_))));
}

#[test]
fn test_trace_file_replay() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dirty.trace");
    fs::write(
        &path,
        "# page 0 dirty, clock must pass it twice\nw 0\nr 1\nr 2\nr 3\n",
    )
    .unwrap();

    let ops = parse_trace(&fs::read_to_string(&path).unwrap()).unwrap();
    let config = TraceConfig {
        policy: Policy::ThirdChance,
        frames: 2,
        pages: 4,
        ..Default::default()
    };
    let report = simulate(&config, &ops).expect("replay failed");

    let mut out = Vec::new();
    write_records(&mut out, &report.records).unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(
        lines,
        [
            "0 0 -1 0 0",
            "0 1 -1 0 0",
            "1 0 -1 0 4096",
            "2 0 1 0 4096",
            "3 0 0 1 0",
        ]
    );
    assert_eq!(report.stats.evictions, 2);
    assert_eq!(report.stats.write_backs, 1);
}

#[test]
fn test_shipped_sample_trace() {
    let ops = parse_trace(include_str!("../sample.trace")).unwrap();
    let config = TraceConfig::from_toml(include_str!("../mmtrace.example.toml")).unwrap();
    let report = simulate(&config, &ops).expect("replay failed");
    assert_eq!(report.accesses, ops.len() as u64);
    assert!(report.stats.misses >= 6);
}
