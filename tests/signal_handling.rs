#![cfg(unix)]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

fn run_shell(lines: &[&str]) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tsh"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn tsh");

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        for line in lines {
            writeln!(stdin, "{line}").expect("write line");
        }
        writeln!(stdin, "exit").expect("write exit");
    }

    child.wait_with_output().expect("wait output")
}

/// Drop a tiny sh script into the temp dir; scripts let a child stop
/// itself with SIGTSTP without the shell needing quoting or `$$`.
fn write_script(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("{name}_{}.sh", std::process::id()));
    std::fs::write(&path, contents).expect("write script");
    path
}

#[test]
fn stopped_job_shows_in_jobs_and_bg_resumes_it() {
    let script = write_script("tsh_stop_bg", "kill -TSTP $$\necho RESUMED\n");
    let cmd = format!("sh {}", script.display());

    let output = run_shell(&[&cmd, "jobs", "bg %1", "sleep 0.5", "echo MARKER"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    // Foreground wait observed the stop and reported it.
    assert!(stdout.contains("[1]+ Stopped\tsh"), "stdout was: {stdout}");
    // jobs sees the stopped entry.
    assert!(stdout.contains("Stopped\tsh"), "stdout was: {stdout}");
    // bg continued the group: the script ran to completion and the
    // one-time Done notice fired at a later safe point.
    assert!(stdout.contains("RESUMED"), "stdout was: {stdout}");
    assert_eq!(stdout.matches("Done").count(), 1, "stdout was: {stdout}");
    assert!(stdout.contains("MARKER"), "stdout was: {stdout}");
    let _ = std::fs::remove_file(&script);
}

#[test]
fn fg_resumes_a_stopped_job_and_waits_for_it() {
    let script = write_script("tsh_stop_fg", "kill -TSTP $$\necho BACK\n");
    let cmd = format!("sh {}", script.display());

    let output = run_shell(&[&cmd, "fg %1", "jobs", "echo AFTER"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    // One stop notice, then the resumed script's output, then nothing
    // left in the table.
    assert_eq!(stdout.matches("Stopped").count(), 1, "stdout was: {stdout}");
    assert!(stdout.contains("BACK"), "stdout was: {stdout}");
    assert!(!stdout.contains("Running"), "stdout was: {stdout}");
    assert!(stdout.contains("AFTER"), "stdout was: {stdout}");
    let _ = std::fs::remove_file(&script);
}

#[test]
fn shell_itself_ignores_stop_and_quit_signals() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tsh"))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn tsh");

    // Give the shell time to install its dispositions, then try to stop
    // and quit it. With SIG_IGN both must be no-ops; a stopped shell
    // would hang this test at wait_with_output.
    std::thread::sleep(Duration::from_millis(200));
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGTSTP);
        libc::kill(child.id() as libc::pid_t, libc::SIGQUIT);
    }

    {
        let stdin = child.stdin.as_mut().expect("stdin");
        writeln!(stdin, "echo ALIVE").expect("write line");
        writeln!(stdin, "exit").expect("write exit");
    }

    let output = child.wait_with_output().expect("wait output");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ALIVE"), "stdout was: {stdout}");
    assert!(output.status.success(), "shell did not exit cleanly");
}
