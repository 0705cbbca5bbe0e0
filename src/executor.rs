use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

use crate::ids::{GroupId, JobId, ProcessId};
use crate::job_control::{self, ChildEvent, ForegroundTerminalGuard, WaitOutcome};
use crate::jobs::{JobStatus, JobTable};
use crate::parser::{Pipeline, Stage};
use crate::signals;

/// A launch that produced no job. Per-stage exec failures (program not
/// found, not executable) are *not* launch errors — they are confined to
/// the failing stage, reported on stderr, and the rest of the pipeline
/// runs.
#[derive(Debug)]
pub enum LaunchError {
    /// The job table has no free slot; nothing was forked.
    TableFull,
    /// Pipe creation failed before any process existed.
    PipeCreation(io::Error),
    /// A stage failed to fork for a resource-class reason. Stages
    /// launched before it have been waited on (best effort).
    Spawn { program: String, source: io::Error },
    /// Every stage failed to start, so there is no group to track.
    NoStageStarted,
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchError::TableFull => write!(f, "job table full"),
            LaunchError::PipeCreation(e) => write!(f, "pipe: {e}"),
            LaunchError::Spawn { program, source } => {
                write!(f, "failed to start {program}: {source}")
            }
            LaunchError::NoStageStarted => write!(f, "no pipeline stage could be started"),
        }
    }
}

impl std::error::Error for LaunchError {}

/// Launch a single external command. A lone command is a one-stage
/// pipeline; everything else is shared with [`launch_pipeline`].
pub fn launch_single(
    jobs: &mut JobTable,
    stage: &Stage,
    line: &str,
    background: bool,
) -> Result<JobId, LaunchError> {
    let pipeline = Pipeline {
        stages: vec![stage.clone()],
        line: line.to_string(),
        background,
    };
    launch_pipeline(jobs, &pipeline)
}

/// Launch a pipeline: one process per stage, all in a fresh process
/// group led by the first stage. Registers the job, then either reports
/// it (background) or hands the terminal over and waits for the whole
/// group (foreground).
pub fn launch_pipeline(jobs: &mut JobTable, pipeline: &Pipeline) -> Result<JobId, LaunchError> {
    // Reject before any pipe or fork so a full table never strands
    // freshly spawned processes.
    if jobs.is_full() {
        return Err(LaunchError::TableFull);
    }

    let stage_count = pipeline.stages.len();

    // All inter-stage pipes up front; failure here aborts cleanly.
    let mut pipes = Vec::with_capacity(stage_count.saturating_sub(1));
    for _ in 1..stage_count {
        let (reader, writer) = os_pipe::pipe().map_err(LaunchError::PipeCreation)?;
        pipes.push((Some(reader), Some(writer)));
    }

    let mut children: Vec<Child> = Vec::new();
    let mut pgid: Option<GroupId> = None;

    for (i, stage) in pipeline.stages.iter().enumerate() {
        let mut cmd = Command::new(&stage.argv[0]);
        cmd.args(&stage.argv[1..]);

        // Pipe wiring first, explicit redirections after, so a redirect
        // on a piped stage overrides its pipe end. Taking the ends out
        // of their slots drops (closes) the parent copies either way.
        if i > 0 {
            if let Some(reader) = pipes[i - 1].0.take() {
                cmd.stdin(Stdio::from(reader));
            }
        }
        if i < stage_count - 1 {
            if let Some(writer) = pipes[i].1.take() {
                cmd.stdout(Stdio::from(writer));
            }
        }
        if let Err(e) = apply_redirections(&mut cmd, stage) {
            // Confined to this stage, like an exec failure.
            eprintln!("tsh: {e}");
            continue;
        }

        // In the child: join the pipeline's group (lead it when no
        // leader exists yet) and restore default reactions to the
        // terminal-generated signals the shell ignores. The parent
        // repeats the group assignment below; whichever side wins the
        // race, the outcome is the same.
        let join_pgid = pgid.map_or(0, GroupId::as_raw);
        unsafe {
            cmd.pre_exec(move || {
                libc::setpgid(0, join_pgid);
                libc::signal(libc::SIGINT, libc::SIG_DFL);
                libc::signal(libc::SIGTSTP, libc::SIG_DFL);
                libc::signal(libc::SIGQUIT, libc::SIG_DFL);
                Ok(())
            });
        }

        match cmd.spawn() {
            Ok(child) => {
                let pid = ProcessId::from_raw(child.id() as libc::pid_t);
                let group = *pgid.get_or_insert_with(|| pid.as_group());
                if let Err(e) = job_control::set_process_group(pid, group) {
                    eprintln!("tsh: setpgid: {e}");
                }
                children.push(child);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                eprintln!("tsh: command not found: {}", stage.argv[0]);
            }
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                eprintln!("tsh: {}: {e}", stage.argv[0]);
            }
            Err(e) => {
                // Resource-class failure: abort the rest of the launch
                // and collect what already started. Known weak point
                // inherited from the design: the survivors are waited
                // on, not terminated.
                for child in &mut children {
                    let _ = job_control::wait_for_process(ProcessId::from_raw(
                        child.id() as libc::pid_t,
                    ));
                }
                return Err(LaunchError::Spawn {
                    program: stage.argv[0].clone(),
                    source: e,
                });
            }
        }
    }

    let Some(pgid) = pgid else {
        return Err(LaunchError::NoStageStarted);
    };

    // The group id is only known once the leader exists, so the job is
    // registered after the forks.
    let job_id = jobs
        .insert(pgid, pipeline.line.clone(), pipeline.background)
        .map_err(|_| LaunchError::TableFull)?;

    if pipeline.background {
        println!("[{job_id}] {pgid}");
    } else {
        wait_in_foreground(jobs, job_id, pgid);
    }

    Ok(job_id)
}

/// Hand the terminal to `pgid`, block until the group stops or fully
/// terminates, and let the guard restore the shell's ownership on every
/// exit path. Shared between foreground launches and `fg`.
pub(crate) fn wait_in_foreground(jobs: &mut JobTable, job_id: JobId, pgid: GroupId) {
    let guard = match ForegroundTerminalGuard::new(pgid) {
        Ok(guard) => Some(guard),
        Err(e) => {
            // Not attached to a terminal, or transfer refused: run the
            // pipeline anyway.
            eprintln!("tsh: cannot set terminal foreground group: {e}");
            None
        }
    };

    match job_control::wait_for_group(pgid) {
        Ok(WaitOutcome::Completed) => {
            jobs.remove(job_id);
        }
        Ok(WaitOutcome::Stopped) => {
            if let Some(job) = jobs.get_mut(job_id) {
                job.status = JobStatus::Stopped;
                job.background = true;
                println!("\n[{}]+ Stopped\t{}", job.id, job.cmdline);
            }
        }
        Err(e) => {
            eprintln!("tsh: wait: {e}");
            jobs.remove(job_id);
        }
    }

    drop(guard);
}

/// The reap phase of the signal relay. Called at safe points: before
/// each prompt and after every foreground wait. If the SIGCHLD flag was
/// raised, drains all pending child-state changes and updates the job
/// table accordingly.
pub fn reap_pending(jobs: &mut JobTable) {
    if !signals::take_child_event() {
        return;
    }

    loop {
        match job_control::reap_next_event() {
            Ok(Some((pid, event))) => apply_child_event(jobs, pid, event),
            Ok(None) => break,
            Err(e) => {
                eprintln!("tsh: wait: {e}");
                break;
            }
        }
    }
}

fn apply_child_event(jobs: &mut JobTable, pid: ProcessId, event: ChildEvent) {
    // A terminated child is already gone, so getpgid fails; its pid is
    // then its own best guess for the group. That guess only matches a
    // job for the group leader, which is exactly the member whose exit
    // should settle the job.
    let pgid = job_control::process_group_of(pid).unwrap_or_else(|_| pid.as_group());

    let Some(job) = jobs.get_by_group_mut(pgid) else {
        return;
    };

    match event {
        ChildEvent::Terminated => {
            job.status = JobStatus::Done;
            let id = job.id;
            let notify = job.background;
            let cmdline = std::mem::take(&mut job.cmdline);
            if notify {
                println!("\n[{id}]+ Done\t{cmdline}");
            }
            jobs.remove(id);
        }
        ChildEvent::Stopped => {
            job.status = JobStatus::Stopped;
            job.background = true;
            println!("\n[{}]+ Stopped\t{}", job.id, job.cmdline);
        }
        ChildEvent::Continued => {
            // No-op when bg/fg already marked the job Running.
            job.status = JobStatus::Running;
        }
    }
}

fn apply_redirections(cmd: &mut Command, stage: &Stage) -> io::Result<()> {
    if let Some(path) = &stage.infile {
        let file = File::open(path)
            .map_err(|e| io::Error::new(e.kind(), format!("failed to open '{path}': {e}")))?;
        cmd.stdin(Stdio::from(file));
    }

    if let Some(path) = &stage.outfile {
        let mut options = OpenOptions::new();
        options.write(true).create(true);
        if stage.out_append {
            options.append(true);
        } else {
            options.truncate(true);
        }
        let file = options
            .open(path)
            .map_err(|e| io::Error::new(e.kind(), format!("failed to open '{path}': {e}")))?;
        cmd.stdout(Stdio::from(file));
    }

    if let Some(path) = &stage.errfile {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| io::Error::new(e.kind(), format!("failed to open '{path}': {e}")))?;
        cmd.stderr(Stdio::from(file));
    }

    Ok(())
}
