use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// Set by the SIGCHLD handler, consumed by the reaper. The handler does
/// nothing but store into this flag: the job table, allocator and stdio
/// are all off-limits from asynchronous signal context.
static CHILD_EVENT: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigchld(_signal: libc::c_int) {
    CHILD_EVENT.store(true, Ordering::Release);
}

/// Consume the pending-child-event flag. Returns true if at least one
/// SIGCHLD arrived since the last call.
pub fn take_child_event() -> bool {
    CHILD_EVENT.swap(false, Ordering::Acquire)
}

/// Install the SIGCHLD handler. SA_RESTART keeps the blocking prompt
/// read from failing with EINTR every time a background child changes
/// state.
pub fn install_sigchld_handler() -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handle_sigchld as *const () as libc::sighandler_t;
        action.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);

        if libc::sigaction(libc::SIGCHLD, &action, std::ptr::null_mut()) != 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// Make the shell immune to the job-control signals the terminal
/// generates. SIGINT is handled separately (the `ctrlc` handler in
/// `main`); SIGTSTP/SIGQUIT must never stop or kill the shell, and
/// SIGTTOU/SIGTTIN would otherwise stop it while it hands the terminal
/// back and forth.
pub fn ignore_job_control_signals() {
    for signal in [
        libc::SIGTSTP,
        libc::SIGQUIT,
        libc::SIGTTOU,
        libc::SIGTTIN,
    ] {
        unsafe {
            libc::signal(signal, libc::SIG_IGN);
        }
    }
}
