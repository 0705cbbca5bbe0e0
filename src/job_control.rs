use std::io;

use crate::ids::{GroupId, ProcessId};

/// How a blocking foreground wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Every member of the group has terminated.
    Completed,
    /// A member stopped (SIGTSTP or terminal stop); the group survives.
    Stopped,
}

/// A state change reported for one child by the non-blocking reap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildEvent {
    /// Exited normally or was killed by a signal.
    Terminated,
    Stopped,
    Continued,
}

/// Assign `pid` to process group `pgid` (pgid of the pid itself when the
/// child is to lead a new group). Advisory: a child that already exec'd
/// or exited makes this fail with EACCES/ESRCH, which is fine — the
/// child-side `setpgid` in `pre_exec` has already settled the question.
pub fn set_process_group(pid: ProcessId, pgid: GroupId) -> io::Result<()> {
    loop {
        let rc = unsafe { libc::setpgid(pid.as_raw(), pgid.as_raw()) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EINTR => continue,
            Some(code) if code == libc::EACCES || code == libc::ESRCH => return Ok(()),
            _ => return Err(err),
        }
    }
}

/// Look up the process group of a live child.
pub fn process_group_of(pid: ProcessId) -> io::Result<GroupId> {
    loop {
        let rc = unsafe { libc::getpgid(pid.as_raw()) };
        if rc >= 0 {
            return Ok(GroupId::from_raw(rc));
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// Deliver SIGCONT to every member of a process group.
pub fn send_continue_to_group(pgid: GroupId) -> io::Result<()> {
    if pgid.as_raw() <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }

    loop {
        let rc = unsafe { libc::kill(-pgid.as_raw(), libc::SIGCONT) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// Blocking wait on a whole process group, as used by foreground
/// execution and `fg`. Returns once the group has no live members left
/// (ECHILD) or as soon as one member stops.
pub fn wait_for_group(pgid: GroupId) -> io::Result<WaitOutcome> {
    let mut raw_status: libc::c_int = 0;

    loop {
        let rc = unsafe { libc::waitpid(-pgid.as_raw(), &mut raw_status, libc::WUNTRACED) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(code) if code == libc::EINTR => continue,
                Some(code) if code == libc::ECHILD => return Ok(WaitOutcome::Completed),
                _ => return Err(err),
            }
        }

        if unsafe { libc::WIFSTOPPED(raw_status) } {
            return Ok(WaitOutcome::Stopped);
        }
        // Exited or signaled: keep draining until the whole group is gone.
    }
}

/// Best-effort blocking wait for one child, used when aborting a
/// half-launched pipeline.
pub fn wait_for_process(pid: ProcessId) -> io::Result<()> {
    loop {
        let rc = unsafe { libc::waitpid(pid.as_raw(), std::ptr::null_mut(), 0) };
        if rc >= 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}

/// Non-blocking collection of the next pending child-state change, for
/// the reaper. `None` means nothing further is pending.
pub fn reap_next_event() -> io::Result<Option<(ProcessId, ChildEvent)>> {
    let mut raw_status: libc::c_int = 0;

    loop {
        let rc = unsafe {
            libc::waitpid(
                -1,
                &mut raw_status,
                libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED,
            )
        };
        if rc == 0 {
            return Ok(None);
        }
        if rc < 0 {
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(code) if code == libc::EINTR => continue,
                Some(code) if code == libc::ECHILD => return Ok(None),
                _ => return Err(err),
            }
        }

        let pid = ProcessId::from_raw(rc);
        let event = unsafe {
            if libc::WIFSTOPPED(raw_status) {
                ChildEvent::Stopped
            } else if libc::WIFCONTINUED(raw_status) {
                ChildEvent::Continued
            } else {
                ChildEvent::Terminated
            }
        };
        return Ok(Some((pid, event)));
    }
}

/// Put the shell into a process group of its own, led by itself.
pub fn claim_own_group() -> GroupId {
    let pid = unsafe { libc::getpid() };
    // May fail if we already lead the group; that is the state we want.
    let _ = set_process_group(ProcessId::from_raw(pid), GroupId::from_raw(pid));
    GroupId::from_raw(unsafe { libc::getpgrp() })
}

/// True when the shell's stdin is a controlling terminal.
pub fn stdin_is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) == 1 }
}

/// Hands terminal ownership to a job's process group for the duration of
/// a foreground wait; `Drop` gives it back to the shell on every exit
/// path. Both directions are best-effort — a shell run without a
/// controlling terminal still executes pipelines, it just cannot assign
/// terminal ownership.
pub struct ForegroundTerminalGuard {
    tty_fd: Option<libc::c_int>,
    shell_pgid: GroupId,
}

impl ForegroundTerminalGuard {
    pub fn new(target: GroupId) -> io::Result<Self> {
        let tty_fd = if stdin_is_tty() {
            Some(libc::STDIN_FILENO)
        } else {
            None
        };

        let shell_pgid = GroupId::from_raw(unsafe { libc::getpgrp() });
        let guard = Self { tty_fd, shell_pgid };

        if let Some(fd) = guard.tty_fd {
            set_terminal_foreground(fd, target)?;
        }

        Ok(guard)
    }
}

impl Drop for ForegroundTerminalGuard {
    fn drop(&mut self) {
        if let Some(fd) = self.tty_fd {
            let _ = set_terminal_foreground(fd, self.shell_pgid);
        }
    }
}

/// `tcsetpgrp` with the usual EINTR retry. The shell ignores SIGTTOU
/// (see `signals`), so calling this from a background shell cannot stop
/// us.
pub fn set_terminal_foreground(fd: libc::c_int, pgid: GroupId) -> io::Result<()> {
    if pgid.as_raw() <= 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid process group id",
        ));
    }

    loop {
        let rc = unsafe { libc::tcsetpgrp(fd, pgid.as_raw()) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        return Err(err);
    }
}
