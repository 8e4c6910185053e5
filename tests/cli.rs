//! CLI integration tests: run the compiled binary and check command-line
//! behavior, exit statuses and stream plumbing.

use std::io::Write;
use std::process::{Command, Stdio};

use tempfile::NamedTempFile;

struct CliResult {
    stdout: String,
    stderr: String,
    status: i32,
}

fn run_cli(args: &[&str], input: Option<&str>) -> CliResult {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_grawk"));
    cmd.args(args);
    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().expect("failed to spawn grawk");

    if let Some(text) = input {
        let mut stdin = child.stdin.take().unwrap();
        stdin.write_all(text.as_bytes()).unwrap();
    }

    let output = child.wait_with_output().expect("failed to wait for grawk");
    CliResult {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        status: output.status.code().unwrap_or(-1),
    }
}

#[test]
fn test_help() {
    let result = run_cli(&["--help"], None);
    assert_eq!(result.status, 0);
    assert!(result.stdout.contains("Usage:"));
    assert!(result.stdout.contains("grawk"));
}

#[test]
fn test_version() {
    let result = run_cli(&["--version"], None);
    assert_eq!(result.status, 0);
    assert!(result.stdout.contains("grawk"));
}

#[test]
fn test_simple_program() {
    let result = run_cli(&[r#"BEGIN { print "hello" }"#], None);
    assert_eq!(result.stdout, "hello\n");
    assert_eq!(result.status, 0);
}

#[test]
fn test_stdin_input() {
    let result = run_cli(&["{ print $1 }"], Some("a b c\nd e\n"));
    assert_eq!(result.stdout, "a\nd\n");
}

#[test]
fn test_field_separator_option() {
    let result = run_cli(&["-F:", "{ print $1 }"], Some("a:b:c\n"));
    assert_eq!(result.stdout, "a\n");

    let result = run_cli(&["-F", ",", "{ print $2 }"], Some("a,b,c\n"));
    assert_eq!(result.stdout, "b\n");
}

#[test]
fn test_variable_assignment_option() {
    let result = run_cli(&["-v", "x=5", "BEGIN { print x + 1 }"], None);
    assert_eq!(result.stdout, "6\n");

    // A numeric-looking value becomes a number, anything else a string
    let result = run_cli(&["-v", "x=abc", "BEGIN { print typeof(x) }"], None);
    assert_eq!(result.stdout, "string\n");
    let result = run_cli(&["-v", "x=3.5", "BEGIN { print typeof(x) }"], None);
    assert_eq!(result.stdout, "number\n");
}

#[test]
fn test_program_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, r#"BEGIN {{ print "from file" }}"#).unwrap();

    let path = file.path().to_str().unwrap();
    let result = run_cli(&["-f", path], None);
    assert_eq!(result.stdout, "from file\n");
}

#[test]
fn test_input_files() {
    let mut file1 = NamedTempFile::new().unwrap();
    writeln!(file1, "a").unwrap();
    let mut file2 = NamedTempFile::new().unwrap();
    writeln!(file2, "b").unwrap();

    let result = run_cli(
        &[
            "{ print FILENAME, $0 }",
            file1.path().to_str().unwrap(),
            file2.path().to_str().unwrap(),
        ],
        None,
    );
    assert!(result.stdout.contains("a\n"));
    assert!(result.stdout.contains("b\n"));
}

#[test]
fn test_dash_reads_stdin() {
    let result = run_cli(&["{ print }", "-"], Some("via stdin\n"));
    assert_eq!(result.stdout, "via stdin\n");
}

#[test]
fn test_end_of_options() {
    let result = run_cli(&["--", "BEGIN { print \"after dashes\" }"], None);
    assert_eq!(result.stdout, "after dashes\n");
}

#[test]
fn test_exit_status_propagates() {
    let result = run_cli(&["BEGIN { exit 3 }"], None);
    assert_eq!(result.status, 3);
}

#[test]
fn test_parse_error_exits_one() {
    let result = run_cli(&["BEGIN { print \"unterminated }"], None);
    assert_eq!(result.status, 1);
    assert!(result.stderr.contains("awk:"));
}

#[test]
fn test_parse_errors_reported_together() {
    let result = run_cli(&["{ 1 = 2 }\n{ 3 = 4 }"], None);
    assert_eq!(result.status, 1);
    assert_eq!(
        result
            .stderr
            .lines()
            .filter(|l| l.contains("invalid assignment target"))
            .count(),
        2
    );
}

#[test]
fn test_no_program_is_an_error() {
    let result = run_cli(&[], None);
    assert_eq!(result.status, 1);
}

#[test]
fn test_unknown_option_is_an_error() {
    let result = run_cli(&["--bogus"], None);
    assert_eq!(result.status, 1);
}

#[test]
fn test_missing_option_arguments() {
    assert_eq!(run_cli(&["-f"], None).status, 1);
    assert_eq!(run_cli(&["-v"], None).status, 1);
    assert_eq!(run_cli(&["-F"], None).status, 1);
    assert_eq!(run_cli(&["-v", "noequals"], None).status, 1);
}

#[test]
fn test_missing_input_file_reports_but_continues() {
    let mut good = NamedTempFile::new().unwrap();
    writeln!(good, "ok").unwrap();

    let result = run_cli(
        &["{ print }", "/no/such/input", good.path().to_str().unwrap()],
        None,
    );
    assert!(result.stderr.contains("can't open file"));
    assert_eq!(result.stdout, "ok\n");
}

#[test]
fn test_runtime_output_ordering_with_redirects() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("side.txt");
    let program = format!(
        r#"BEGIN {{ print "side" > "{p}"; print "main" }}"#,
        p = out.display()
    );
    let result = run_cli(&[&program], None);
    assert_eq!(result.stdout, "main\n");
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "side\n");
}
