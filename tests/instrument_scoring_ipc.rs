use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_supervisid");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn supervisid");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().expect("result payload")
}

fn create_subject(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    kind: &str,
    name: &str,
) -> String {
    let created = request_ok(
        stdin,
        reader,
        "create",
        "subjects.create",
        json!({ "kind": kind, "name": name }),
    );
    created
        .get("subjectId")
        .and_then(|v| v.as_str())
        .expect("subjectId")
        .to_string()
}

#[test]
fn full_marks_hit_the_top_band_and_fill_feedback() {
    let workspace = temp_dir("supervisi-scoring-full");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let subject_id = create_subject(&mut stdin, &mut reader, "guru", "Guru Penuh");

    let mut last = json!(null);
    for item_no in 1..=13 {
        last = request_ok(
            &mut stdin,
            &mut reader,
            &format!("set-{}", item_no),
            "instruments.setItem",
            json!({
                "subjectId": subject_id,
                "instrument": "administrasi",
                "semester": "Ganjil",
                "itemNo": item_no,
                "value": "2"
            }),
        );
    }

    assert_eq!(
        last.pointer("/aggregate/totalScore").and_then(|v| v.as_f64()),
        Some(26.0)
    );
    assert_eq!(
        last.pointer("/aggregate/percentage").and_then(|v| v.as_i64()),
        Some(100)
    );
    assert_eq!(
        last.pointer("/aggregate/band").and_then(|v| v.as_str()),
        Some("Sangat Baik")
    );
    // Auto feedback tracks the score.
    assert_eq!(
        last.pointer("/feedback/auto").and_then(|v| v.as_bool()),
        Some(true)
    );
    assert_eq!(
        last.pointer("/feedback/catatan").and_then(|v| v.as_str()),
        Some("Administrasi pembelajaran sangat lengkap dan tertata dengan baik.")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn partial_marks_round_half_up_and_band_low() {
    let workspace = temp_dir("supervisi-scoring-partial");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let subject_id = create_subject(&mut stdin, &mut reader, "guru", "Guru Sebagian");

    // 2 of 26 is 7.69 percent, which rounds half-up to 8.
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "set",
        "instruments.setItem",
        json!({
            "subjectId": subject_id,
            "instrument": "administrasi",
            "semester": "Ganjil",
            "itemNo": 1,
            "value": "2"
        }),
    );
    assert_eq!(
        result.pointer("/aggregate/percentage").and_then(|v| v.as_i64()),
        Some(8)
    );
    assert_eq!(
        result.pointer("/aggregate/band").and_then(|v| v.as_str()),
        Some("Kurang")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn letter_values_are_mapped_and_uppercased() {
    let workspace = temp_dir("supervisi-scoring-letter");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let subject_id = create_subject(&mut stdin, &mut reader, "ptt", "Staf TU");

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "set",
        "instruments.setItem",
        json!({
            "subjectId": subject_id,
            "instrument": "administrasi-ptt",
            "semester": "Ganjil",
            "itemNo": 1,
            "value": "b"
        }),
    );
    let stored = result
        .pointer("/items/0/value")
        .and_then(|v| v.as_str())
        .expect("stored value");
    assert_eq!(stored, "B");
    assert_eq!(
        result.pointer("/aggregate/totalScore").and_then(|v| v.as_f64()),
        Some(3.0)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn out_of_domain_values_are_rejected() {
    let workspace = temp_dir("supervisi-scoring-reject");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let subject_id = create_subject(&mut stdin, &mut reader, "guru", "Guru Salah Nilai");

    let rejected = request(
        &mut stdin,
        &mut reader,
        "bad-value",
        "instruments.setItem",
        json!({
            "subjectId": subject_id,
            "instrument": "administrasi",
            "semester": "Ganjil",
            "itemNo": 1,
            "value": "7"
        }),
    );
    assert_eq!(rejected.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        rejected.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );

    let out_of_range = request(
        &mut stdin,
        &mut reader,
        "bad-item",
        "instruments.setItem",
        json!({
            "subjectId": subject_id,
            "instrument": "administrasi",
            "semester": "Ganjil",
            "itemNo": 14,
            "value": "1"
        }),
    );
    assert_eq!(
        out_of_range.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );

    let missing_subject = request(
        &mut stdin,
        &mut reader,
        "bad-subject",
        "instruments.setItem",
        json!({
            "subjectId": "no-such-subject",
            "instrument": "administrasi",
            "semester": "Ganjil",
            "itemNo": 1,
            "value": "1"
        }),
    );
    assert_eq!(
        missing_subject
            .pointer("/error/code")
            .and_then(|v| v.as_str()),
        Some("not_found")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn staff_admin_feedback_selects_on_raw_score() {
    let workspace = temp_dir("supervisi-scoring-ptt-bank");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let subject_id = create_subject(&mut stdin, &mut reader, "ptt", "Staf Bank");

    // Nine B's is a raw score of 27, which is the top staff band.
    let mut last = json!(null);
    for item_no in 1..=9 {
        last = request_ok(
            &mut stdin,
            &mut reader,
            &format!("set-{}", item_no),
            "instruments.setItem",
            json!({
                "subjectId": subject_id,
                "instrument": "administrasi-ptt",
                "semester": "Genap",
                "itemNo": item_no,
                "value": "B"
            }),
        );
    }
    assert_eq!(
        last.pointer("/aggregate/totalScore").and_then(|v| v.as_f64()),
        Some(27.0)
    );
    assert_eq!(
        last.pointer("/feedback/catatan").and_then(|v| v.as_str()),
        Some("Administrasi ketatausahaan sangat baik dan tertib.")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
