use std::process::Command;

use crate::executor;
use crate::ids::JobId;
use crate::job_control;
use crate::jobs::{JobStatus, JobTable};

/// The list of all builtin command names.
const BUILTINS: &[&str] = &["cd", "pwd", "find", "exit", "jobs", "fg", "bg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinAction {
    Continue,
    Exit,
}

/// Returns true if the command name is a shell builtin.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Execute a builtin. `argv[0]` must be one of [`BUILTINS`].
pub fn execute(argv: &[String], jobs: &mut JobTable) -> BuiltinAction {
    let args = &argv[1..];
    match argv[0].as_str() {
        "exit" => return BuiltinAction::Exit,
        "cd" => builtin_cd(args),
        "pwd" => builtin_pwd(),
        "find" => builtin_find(args),
        "jobs" => builtin_jobs(jobs),
        "fg" => builtin_fg(args, jobs),
        "bg" => builtin_bg(args, jobs),
        other => eprintln!("tsh: unknown builtin: {other}"),
    }
    BuiltinAction::Continue
}

fn builtin_cd(args: &[String]) {
    let Some(target) = args.first() else {
        eprintln!("cd: missing operand");
        return;
    };
    if let Err(e) = std::env::set_current_dir(target) {
        eprintln!("cd: {target}: {e}");
    }
}

fn builtin_pwd() {
    match std::env::current_dir() {
        Ok(path) => println!("{}", path.display()),
        Err(e) => eprintln!("pwd: {e}"),
    }
}

/// `find <name>` — search the current directory tree, delegating to the
/// system `find` as a plain foreground child.
fn builtin_find(args: &[String]) {
    let Some(name) = args.first() else {
        eprintln!("find: missing filename");
        return;
    };
    if let Err(e) = Command::new("find").args([".", "-name", name]).status() {
        eprintln!("find: {e}");
    }
}

// ── Job control builtins ──

/// List all active jobs in table order.
fn builtin_jobs(jobs: &mut JobTable) {
    for job in jobs.list() {
        println!(
            "[{}] {} {}\t{}",
            job.id,
            job.pgid,
            job.status.label(),
            job.cmdline
        );
    }
}

/// Bring a job to the foreground: continue its group, give it the
/// terminal, and wait until it stops or terminates.
fn builtin_fg(args: &[String], jobs: &mut JobTable) {
    let id = match parse_job_spec(args.first()) {
        Ok(id) => id,
        Err(msg) => {
            eprintln!("fg: {msg}");
            return;
        }
    };

    let Some(job) = jobs.get_mut(id) else {
        eprintln!("fg: no such job {id}");
        return;
    };

    let pgid = job.pgid;
    if let Err(e) = job_control::send_continue_to_group(pgid) {
        eprintln!("fg: kill (SIGCONT): {e}");
    }
    // Optimistic: the reaper's continue event later confirms this.
    job.status = JobStatus::Running;
    job.background = false;

    executor::wait_in_foreground(jobs, id, pgid);
}

/// Resume a job in the background: continue its group, no wait, no
/// terminal transfer.
fn builtin_bg(args: &[String], jobs: &mut JobTable) {
    let id = match parse_job_spec(args.first()) {
        Ok(id) => id,
        Err(msg) => {
            eprintln!("bg: {msg}");
            return;
        }
    };

    let Some(job) = jobs.get_mut(id) else {
        eprintln!("bg: no such job {id}");
        return;
    };

    if let Err(e) = job_control::send_continue_to_group(job.pgid) {
        eprintln!("bg: kill (SIGCONT): {e}");
    }
    job.status = JobStatus::Running;
    job.background = true;
    println!("[{}]+ {} &", job.id, job.cmdline);
}

/// Parse a `%N` job specifier. Anything else is a user error.
fn parse_job_spec(arg: Option<&String>) -> Result<JobId, String> {
    let Some(spec) = arg else {
        return Err("missing job spec".to_string());
    };
    let Some(digits) = spec.strip_prefix('%') else {
        return Err("job spec should be %N".to_string());
    };
    match digits.parse::<u32>() {
        Ok(n) if n > 0 => Ok(JobId::new(n)),
        _ => Err(format!("invalid job spec '{spec}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(s: &str) -> Result<JobId, String> {
        parse_job_spec(Some(&s.to_string()))
    }

    #[test]
    fn valid_job_specs() {
        assert_eq!(spec("%1"), Ok(JobId::new(1)));
        assert_eq!(spec("%128"), Ok(JobId::new(128)));
    }

    #[test]
    fn missing_spec_is_error() {
        assert!(parse_job_spec(None).is_err());
    }

    #[test]
    fn spec_without_percent_is_error() {
        assert!(spec("1").is_err());
        assert!(spec("first").is_err());
    }

    #[test]
    fn malformed_spec_is_error() {
        assert!(spec("%").is_err());
        assert!(spec("%0").is_err());
        assert!(spec("%-3").is_err());
        assert!(spec("%abc").is_err());
    }

    #[test]
    fn builtin_names() {
        for name in ["cd", "pwd", "find", "exit", "jobs", "fg", "bg"] {
            assert!(is_builtin(name));
        }
        assert!(!is_builtin("ls"));
        assert!(!is_builtin("wait"));
    }
}
