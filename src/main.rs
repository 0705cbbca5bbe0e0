#[cfg(unix)]
mod builtins;
#[cfg(unix)]
mod executor;
#[cfg(unix)]
mod ids;
#[cfg(unix)]
mod job_control;
#[cfg(unix)]
mod jobs;
#[cfg(unix)]
mod parser;
#[cfg(unix)]
mod signals;

#[cfg(unix)]
fn main() {
    use std::io::{self, Write};

    use builtins::BuiltinAction;
    use executor::LaunchError;
    use jobs::JobTable;

    // The shell leads its own process group and, when interactive, owns
    // the terminal whenever no job is in the foreground.
    let shell_pgid = job_control::claim_own_group();
    if job_control::stdin_is_tty() {
        if let Err(e) = job_control::set_terminal_foreground(libc::STDIN_FILENO, shell_pgid) {
            eprintln!("tsh: cannot claim terminal: {e}");
        }
    }

    if let Err(e) = signals::install_sigchld_handler() {
        eprintln!("tsh: sigaction (SIGCHLD): {e}");
    }
    signals::ignore_job_control_signals();
    ctrlc::set_handler(|| {
        println!();
        let _ = io::stdout().flush();
    })
    .expect("Failed to set Ctrl-C handler");

    let mut jobs = JobTable::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        // Safe point: fold any child-state changes signaled since the
        // last prompt into the job table.
        executor::reap_pending(&mut jobs);

        print!("tsh> ");
        if stdout.flush().is_err() {
            break;
        }

        let mut input = String::new();
        match stdin.read_line(&mut input) {
            Ok(0) => {
                println!("exit");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("tsh: error reading input: {e}");
                break;
            }
        }

        let pipeline = match parser::parse(&input) {
            Ok(Some(pipeline)) => pipeline,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("tsh: {e}");
                continue;
            }
        };

        // Builtins only dispatch as a lone command, never inside a
        // pipeline.
        if pipeline.stages.len() == 1 && builtins::is_builtin(&pipeline.stages[0].argv[0]) {
            match builtins::execute(&pipeline.stages[0].argv, &mut jobs) {
                BuiltinAction::Exit => break,
                BuiltinAction::Continue => continue,
            }
        }

        let result = if pipeline.stages.len() == 1 {
            executor::launch_single(
                &mut jobs,
                &pipeline.stages[0],
                &pipeline.line,
                pipeline.background,
            )
        } else {
            executor::launch_pipeline(&mut jobs, &pipeline)
        };

        match result {
            Ok(_) => {}
            // Per-stage failures were already reported as they happened.
            Err(LaunchError::NoStageStarted) => {}
            Err(e) => eprintln!("tsh: {e}"),
        }
    }
}

#[cfg(not(unix))]
fn main() {
    eprintln!("tsh: job control requires a Unix system");
    std::process::exit(1);
}
