use clap::Parser;
use gymgate::cli::Cli;
use gymgate::error::{exit_code_for, ExitCode};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn args(&self, args: &[&str]) -> Vec<String> {
        let mut full: Vec<String> = vec!["gymgate".into(), "-q".into(), "--no-color".into()];
        for (flag, file) in [
            ("--config", "config.toml"),
            ("--database", "attendance.db"),
            ("--storage", "session.json"),
        ] {
            full.push(flag.into());
            full.push(self.path(file).display().to_string());
        }
        full.extend(args.iter().map(|a| a.to_string()));
        full
    }

    fn run(&self, args: &[&str]) -> anyhow::Result<ExitCode> {
        gymgate::run_app(Cli::try_parse_from(self.args(args)).unwrap())
    }

    fn ok(&self, args: &[&str]) -> ExitCode {
        self.run(args).unwrap()
    }
}

fn csv_rows(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(str::to_string)
        .collect()
}

#[test]
fn test_attendance_day_from_the_command_line() {
    let ws = Workspace::new();
    assert_eq!(ws.ok(&["login", "U1"]), ExitCode::Success);

    assert_eq!(
        ws.ok(&["time-in", "--at", "2024-01-01T09:00:00Z"]),
        ExitCode::Success
    );
    assert_eq!(
        ws.ok(&["time-in", "--at", "2024-01-01T09:05:00Z"]),
        ExitCode::ActionFailed
    );
    assert_eq!(
        ws.ok(&["time-out", "--at", "2024-01-01T17:00:00Z"]),
        ExitCode::Success
    );
    assert_eq!(
        ws.ok(&["time-out", "--at", "2024-01-01T17:05:00Z"]),
        ExitCode::ActionFailed
    );

    let export = ws.path("out/attendance.csv");
    let export_arg = export.display().to_string();
    assert_eq!(
        ws.ok(&["attendance", "-o", "csv", "--output-file", &export_arg]),
        ExitCode::Success
    );
    let rows = csv_rows(&export);
    assert_eq!(rows.len(), 1);
    assert!(rows[0].contains("U1"));
    assert!(rows[0].ends_with(",480"));

    assert_eq!(
        ws.ok(&["status", "--date", "2024-01-01", "-o", "json"]),
        ExitCode::Success
    );
}

#[test]
fn test_anonymous_time_in_is_redirected() {
    let ws = Workspace::new();
    assert_eq!(
        ws.ok(&["time-in", "--at", "2024-01-01T09:00:00Z"]),
        ExitCode::Redirected
    );

    let export = ws.path("attendance.csv");
    let export_arg = export.display().to_string();
    ws.ok(&["attendance", "--for", "U1", "-o", "csv", "--output-file", &export_arg]);
    assert!(csv_rows(&export).is_empty());
}

#[test]
fn test_signed_in_login_page_is_redirected() {
    let ws = Workspace::new();
    ws.ok(&["login", "U1"]);
    assert_eq!(ws.ok(&["navigate", "/login"]), ExitCode::Redirected);
    assert_eq!(ws.ok(&["navigate", "/application/users/42"]), ExitCode::Success);
}

#[test]
fn test_staff_records_for_another_subject() {
    let ws = Workspace::new();
    ws.ok(&["login", "ADMIN"]);
    assert_eq!(
        ws.ok(&["time-in", "--for", "U7", "--at", "2024-01-01T09:00:00Z"]),
        ExitCode::Success
    );

    let export = ws.path("u7.csv");
    let export_arg = export.display().to_string();
    ws.ok(&["attendance", "--for", "U7", "-o", "csv", "--output-file", &export_arg]);
    assert_eq!(csv_rows(&export).len(), 1);

    let export = ws.path("admin.csv");
    let export_arg = export.display().to_string();
    ws.ok(&["attendance", "-o", "csv", "--output-file", &export_arg]);
    assert!(csv_rows(&export).is_empty());
}

#[test]
fn test_open_named_route_with_params() {
    let ws = Workspace::new();
    ws.ok(&["login", "U1"]);
    assert_eq!(
        ws.ok(&["open", "ShowUser", "-p", "id=42", "-o", "json"]),
        ExitCode::Success
    );
}

#[test]
fn test_unknown_route_is_a_general_error() {
    let ws = Workspace::new();
    let err = ws.run(&["open", "Dashbord"]).unwrap_err();
    assert!(format!("{:#}", err).contains("did you mean 'Dashboard'"));
    assert_eq!(exit_code_for(&err), ExitCode::GeneralError);
}

#[test]
fn test_history_without_login_or_subject_fails() {
    let ws = Workspace::new();
    let err = ws.run(&["attendance"]).unwrap_err();
    assert!(err.to_string().contains("Not signed in"));
}

#[test]
fn test_csv_rejected_for_navigation() {
    let ws = Workspace::new();
    assert!(ws.run(&["navigate", "/", "-o", "csv"]).is_err());
}

#[test]
fn test_invalid_config_is_reported() {
    let ws = Workspace::new();
    fs::write(ws.path("config.toml"), "fallback_route = \"Nowhere\"\n").unwrap();
    let err = ws.run(&["routes"]).unwrap_err();
    assert!(format!("{:#}", err).contains("fallback_route"));
}

#[test]
fn test_login_logout_cycle() {
    let ws = Workspace::new();
    assert_eq!(ws.ok(&["login", "U1", "--token", "abc"]), ExitCode::Success);
    assert_eq!(ws.ok(&["whoami"]), ExitCode::Success);
    assert_eq!(ws.ok(&["logout"]), ExitCode::Success);
    assert_eq!(
        ws.ok(&["navigate", "/application/dashboard"]),
        ExitCode::Redirected
    );
    assert!(ws.run(&["login", "  "]).is_err());
}

#[test]
fn test_routes_listing() {
    let ws = Workspace::new();
    assert_eq!(ws.ok(&["routes"]), ExitCode::Success);
    assert_eq!(ws.ok(&["routes", "-o", "json"]), ExitCode::Success);
}
