use std::fs;
use std::path::PathBuf;
use std::process::Command;

use beat_detector::fixtures::write_wav;
use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_beat_cli"))
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("beat-cli-{}-{}", std::process::id(), name))
}

/// Two seconds of silence at 48 kHz
fn silent_wav(name: &str) -> PathBuf {
    let path = temp_path(name);
    write_wav(&path, &vec![0.0; 96_000], 48_000).expect("write silent wav");
    path
}

#[test]
fn config_prints_effective_configuration() {
    let output = cli().arg("config").output().expect("failed to run config");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("config JSON payload");
    assert_eq!(json["detector"]["sub_bands"], 128);
    assert_eq!(json["detector"]["history_depth"], 60);
    assert_eq!(json["spectrum"]["fft_size"], 1024);
}

#[test]
fn analyze_silence_reports_no_events() {
    let wav = silent_wav("silence.wav");

    let output = cli()
        .args(["analyze", wav.to_str().unwrap()])
        .output()
        .expect("failed to run analyze");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("analysis report JSON payload");
    assert_eq!(json["event_count"], 0);
    assert_eq!(json["sample_rate"], 48_000);
    // 96 000 samples, 1024-sample window and hop: 93 chunks.
    assert_eq!(json["stats"]["chunks_processed"], 93);
    assert_eq!(json["stats"]["warm"], true);

    let _ = fs::remove_file(wav);
}

#[test]
fn analyze_writes_report_to_output_file() {
    let wav = silent_wav("output.wav");
    let report = temp_path("report.json");

    let output = cli()
        .args([
            "analyze",
            wav.to_str().unwrap(),
            "--output",
            report.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run analyze --output");
    assert!(output.status.success());
    assert!(output.stdout.is_empty());

    let json: Value =
        serde_json::from_str(&fs::read_to_string(&report).expect("report written")).unwrap();
    assert_eq!(json["event_count"], 0);

    let _ = fs::remove_file(wav);
    let _ = fs::remove_file(report);
}

#[test]
fn analyze_detects_mismatch() {
    let wav = silent_wav("mismatch.wav");
    let expect = temp_path("mismatch.expect.json");
    fs::write(
        &expect,
        r#"{ "fixture": "silence", "events": [ { "category": "bass", "offset_ms": 1500.0 } ] }"#,
    )
    .unwrap();

    let output = cli()
        .args([
            "analyze",
            wav.to_str().unwrap(),
            "--expect",
            expect.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run mismatch analyze");
    assert_eq!(output.status.code(), Some(2));

    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(
        stderr.contains("\"failures\""),
        "expected diff JSON in stderr, got {stderr}"
    );

    let _ = fs::remove_file(wav);
    let _ = fs::remove_file(expect);
}

#[test]
fn analyze_accepts_matching_expectation() {
    let wav = silent_wav("match.wav");
    let expect = temp_path("match.expect.json");
    fs::write(&expect, r#"{ "events": [] }"#).unwrap();

    let output = cli()
        .args([
            "analyze",
            wav.to_str().unwrap(),
            "--expect",
            expect.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run analyze --expect");
    assert_eq!(output.status.code(), Some(0));

    let _ = fs::remove_file(wav);
    let _ = fs::remove_file(expect);
}

#[test]
fn analyze_missing_file_fails() {
    let output = cli()
        .args(["analyze", "/nonexistent/beat-cli-missing.wav"])
        .output()
        .expect("failed to run analyze");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn synth_writes_wav() {
    let wav = temp_path("synth.wav");

    let output = cli()
        .args(["synth", wav.to_str().unwrap(), "--bars", "1", "--seed", "3"])
        .output()
        .expect("failed to run synth");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("synth summary JSON");
    // One bar: 4 kicks, 2 claps, 4 hi-hats.
    assert_eq!(json["hits"], 10);
    assert_eq!(json["sample_rate"], 48_000);

    let reader = hound::WavReader::open(&wav).expect("synth output is a WAV file");
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len() as u64, json["samples"].as_u64().unwrap());

    let _ = fs::remove_file(wav);
}
