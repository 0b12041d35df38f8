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

#[test]
fn generate_assigns_dates_in_order_and_skips_sunday() {
    let workspace = temp_dir("supervisi-schedule-generate");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "settings",
        "settings.update",
        json!({ "patch": {
            "timeSlot": "08.00-10.00",
            "supervisor1": "Kepala Sekolah",
            "supervisor2": "Wakil Kurikulum"
        }}),
    );

    let mut subject_ids = Vec::new();
    for (i, bucket) in [1, 1, 2].iter().enumerate() {
        let created = request_ok(
            &mut stdin,
            &mut reader,
            &format!("create-{}", i),
            "subjects.create",
            json!({
                "kind": "guru",
                "name": format!("Guru {}", i + 1),
                "supervisorBucket": bucket
            }),
        );
        subject_ids.push(
            created
                .get("subjectId")
                .and_then(|v| v.as_str())
                .expect("subjectId")
                .to_string(),
        );
    }

    // 2025-09-06 is a Saturday; the 7th is a Sunday and must be skipped.
    let generated = request_ok(
        &mut stdin,
        &mut reader,
        "generate",
        "schedule.generate",
        json!({
            "semester": "Ganjil",
            "startDate": "2025-09-06",
            "endDate": "2025-09-12"
        }),
    );
    let rows = generated
        .get("rows")
        .and_then(|v| v.as_array())
        .expect("rows");
    assert_eq!(rows.len(), 3);

    assert_eq!(rows[0].get("date").and_then(|v| v.as_str()), Some("2025-09-06"));
    assert_eq!(rows[1].get("date").and_then(|v| v.as_str()), Some("2025-09-08"));
    assert_eq!(rows[2].get("date").and_then(|v| v.as_str()), Some("2025-09-09"));
    assert_eq!(
        rows[0].get("timeSlot").and_then(|v| v.as_str()),
        Some("08.00-10.00")
    );
    assert_eq!(
        rows[1].get("supervisor").and_then(|v| v.as_str()),
        Some("Kepala Sekolah")
    );
    // The bucket-2 subject goes to the second supervisor.
    assert_eq!(
        rows[2].get("supervisor").and_then(|v| v.as_str()),
        Some("Wakil Kurikulum")
    );
    for row in rows {
        assert_eq!(row.get("uploaded").and_then(|v| v.as_bool()), Some(false));
    }

    // Regeneration replaces generated rows instead of appending.
    let regenerated = request_ok(
        &mut stdin,
        &mut reader,
        "regenerate",
        "schedule.generate",
        json!({
            "semester": "Ganjil",
            "startDate": "2025-09-06",
            "endDate": "2025-09-12"
        }),
    );
    assert_eq!(
        regenerated
            .get("rows")
            .and_then(|v| v.as_array())
            .map(|r| r.len()),
        Some(3)
    );

    let inverted = request(
        &mut stdin,
        &mut reader,
        "inverted",
        "schedule.generate",
        json!({
            "semester": "Ganjil",
            "startDate": "2025-09-12",
            "endDate": "2025-09-06"
        }),
    );
    assert_eq!(
        inverted.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn upload_replaces_the_whole_semester() {
    let workspace = temp_dir("supervisi-schedule-upload");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "create",
        "subjects.create",
        json!({ "kind": "guru", "name": "Guru Unggah" }),
    );
    let subject_id = created
        .get("subjectId")
        .and_then(|v| v.as_str())
        .expect("subjectId")
        .to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "generate",
        "schedule.generate",
        json!({
            "semester": "Genap",
            "startDate": "2026-01-05",
            "endDate": "2026-01-09"
        }),
    );

    let uploaded = request_ok(
        &mut stdin,
        &mut reader,
        "upload",
        "schedule.upload",
        json!({
            "semester": "Genap",
            "rows": [
                { "subjectId": subject_id, "date": "2026-01-07", "timeSlot": "10.00-12.00" }
            ]
        }),
    );
    assert_eq!(uploaded.get("inserted").and_then(|v| v.as_i64()), Some(1));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "list",
        "schedule.list",
        json!({ "semester": "Genap" }),
    );
    let rows = listed.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("date").and_then(|v| v.as_str()), Some("2026-01-07"));
    assert_eq!(rows[0].get("uploaded").and_then(|v| v.as_bool()), Some(true));

    // Uploaded rows survive a later regeneration.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "regenerate",
        "schedule.generate",
        json!({
            "semester": "Genap",
            "startDate": "2026-01-05",
            "endDate": "2026-01-09"
        }),
    );
    let after = request_ok(
        &mut stdin,
        &mut reader,
        "list-after",
        "schedule.list",
        json!({ "semester": "Genap" }),
    );
    let rows = after.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert!(rows
        .iter()
        .any(|r| r.get("uploaded").and_then(|v| v.as_bool()) == Some(true)));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
