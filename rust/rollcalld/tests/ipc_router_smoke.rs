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
    let exe = env!("CARGO_BIN_EXE_rollcalld");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollcalld");
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
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded",
        method
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string()
}


#[test]
fn ipc_router_smoke_covers_every_handler_family() {
    let workspace = temp_dir("rollcalld-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert!(health.get("workspacePath").map(|v| v.is_null()).unwrap_or(false));

    assert_eq!(
        request_err(&mut stdin, &mut reader, "2", "students.list", json!({ "teacherId": "t1" })),
        "no_workspace"
    );
    assert_eq!(
        request_err(&mut stdin, &mut reader, "3", "workspace.select", json!({})),
        "bad_params"
    );
    assert_eq!(
        request_err(&mut stdin, &mut reader, "4", "gradebook.explode", json!({})),
        "not_implemented"
    );

    // A line that is not JSON still gets a reply, without an id.
    writeln!(stdin, "{{not json").expect("write bad line");
    stdin.flush().expect("flush bad line");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json reply");
    let bad: serde_json::Value = serde_json::from_str(line.trim()).expect("parse bad_json reply");
    assert_eq!(bad["ok"], json!(false));
    assert_eq!(bad["error"]["code"], json!("bad_json"));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let health = request_ok(&mut stdin, &mut reader, "6", "health", json!({}));
    assert_eq!(
        health.get("workspacePath").and_then(|v| v.as_str()),
        Some(workspace.to_string_lossy().as_ref())
    );

    let teacher = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "teachers.register",
        json!({ "teacherId": "t1", "name": "Ms Rao", "subject": "maths", "classIds": ["8A"] }),
    );
    assert_eq!(teacher["teacher"]["subject"], json!("maths"));

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "students.create",
        json!({ "name": "Asha", "classId": "8A", "subjectId": "maths", "teacherId": "t1" }),
    );
    let student_id = created["studentId"].as_str().expect("studentId").to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "attendance.mark",
        json!({ "studentId": student_id, "date": "2025-03-03", "status": "absent", "teacherId": "t1" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "analytics.frequentAbsentees",
        json!({ "teacherId": "t1" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "marks.set",
        json!({ "studentId": student_id, "teacherId": "t1", "label": "midTerm", "score": 60, "max": 100 }),
    );
    let predicted = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "predict.student",
        json!({ "studentId": student_id }),
    );
    assert_eq!(predicted["status"], json!("predicted"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn workspace_flag_opens_store_at_startup() {
    let workspace = temp_dir("rollcalld-startup-workspace");
    let exe = env!("CARGO_BIN_EXE_rollcalld");
    let mut child = Command::new(exe)
        .arg("--workspace")
        .arg(&workspace)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollcalld");
    let mut stdin = child.stdin.take().expect("child stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("child stdout"));

    let rows = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.list",
        json!({ "teacherId": "t1" }),
    );
    assert_eq!(rows["students"], json!([]));

    drop(stdin);
    let _ = child.wait();
}
