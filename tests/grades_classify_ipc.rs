use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_reportcardd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn reportcardd");
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

/// Returns the error object; panics if the call succeeded.
fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().expect("error object")
}

fn letter(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    marks: f64,
    total: f64,
) -> String {
    let res = request_ok(
        stdin,
        reader,
        id,
        "grades.classify",
        json!({ "marksObtained": marks, "totalMarks": total }),
    );
    res.get("letter")
        .and_then(|v| v.as_str())
        .expect("letter")
        .to_string()
}

#[test]
fn classify_and_validate_over_ipc() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    assert_eq!(letter(&mut stdin, &mut reader, "1", 85.0, 100.0), "B+");
    assert_eq!(letter(&mut stdin, &mut reader, "2", 40.0, 100.0), "D");
    assert_eq!(letter(&mut stdin, &mut reader, "3", 39.0, 100.0), "F");
    assert_eq!(letter(&mut stdin, &mut reader, "4", 46.0, 50.0), "A");

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "grades.classify",
        json!({ "marksObtained": 2, "totalMarks": 3 }),
    );
    assert_eq!(res.get("percentage").and_then(|v| v.as_f64()), Some(66.7));
    assert_eq!(
        res.get("band")
            .and_then(|b| b.get("minPercent"))
            .and_then(|v| v.as_f64()),
        Some(60.0)
    );

    let zero = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "grades.classify",
        json!({ "marksObtained": 10, "totalMarks": 0 }),
    );
    assert_eq!(zero.get("code").and_then(|v| v.as_str()), Some("invalid_input"));

    let over = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "marks.validate",
        json!({ "marksObtained": 101, "totalMarks": 100 }),
    );
    assert_eq!(over.get("code").and_then(|v| v.as_str()), Some("validation_error"));
    assert_eq!(
        over.get("details")
            .and_then(|d| d.get("field"))
            .and_then(|v| v.as_str()),
        Some("marksObtained")
    );

    let negative_total = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "marks.validate",
        json!({ "marksObtained": 0, "totalMarks": -50 }),
    );
    assert_eq!(
        negative_total
            .get("details")
            .and_then(|d| d.get("field"))
            .and_then(|v| v.as_str()),
        Some("totalMarks")
    );

    let fine = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "marks.validate",
        json!({ "marksObtained": 50, "totalMarks": 50 }),
    );
    assert_eq!(fine.get("valid").and_then(|v| v.as_bool()), Some(true));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn remark_selection_over_ipc() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "remarks.select",
        json!({ "letter": "A", "deterministic": true }),
    );
    assert_eq!(
        first.get("remark").and_then(|v| v.as_str()),
        Some("Excellent performance")
    );

    let pick = |stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, id: &str| {
        request_ok(
            stdin,
            reader,
            id,
            "remarks.select",
            json!({ "letter": "C", "seed": 42 }),
        )
        .get("remark")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
    };
    let a = pick(&mut stdin, &mut reader, "2");
    let b = pick(&mut stdin, &mut reader, "3");
    assert!(a.is_some());
    assert_eq!(a, b);

    let unknown = request_err(
        &mut stdin,
        &mut reader,
        "4",
        "remarks.select",
        json!({ "letter": "Z" }),
    );
    assert_eq!(
        unknown.get("code").and_then(|v| v.as_str()),
        Some("validation_error")
    );

    drop(stdin);
    let _ = child.wait();
}
