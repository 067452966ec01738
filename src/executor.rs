use crate::record::{self, ExecutionRecord, ResourceUsage};
use anyhow::{anyhow, Context, Result};
use chrono::{SubsecRound, Utc};
use log::{debug, warn};
use std::io;
use std::process::{Command, Stdio};
use std::sync::Once;
use std::time::{Duration, Instant};

static IGNORE_INTERRUPTS: Once = Once::new();

/// Keeps the parent alive on Ctrl-C and hangups so only the child reacts.
fn ignore_interrupts() {
    IGNORE_INTERRUPTS.call_once(|| {
        if let Err(e) = ctrlc::set_handler(|| {}) {
            warn!("cannot install interrupt handler: {e}");
        }
        // SAFETY: SIG_IGN is a valid disposition and no handler code runs.
        unsafe {
            libc::signal(libc::SIGHUP, libc::SIG_IGN);
        }
    });
}

fn timeval(tv: libc::timeval) -> Duration {
    Duration::from_secs(tv.tv_sec.max(0) as u64) + Duration::from_micros(tv.tv_usec.max(0) as u64)
}

fn resource_usage(ru: &libc::rusage) -> ResourceUsage {
    ResourceUsage {
        max_rss_kb: ru.ru_maxrss as i64,
        minor_faults: ru.ru_minflt as i64,
        major_faults: ru.ru_majflt as i64,
        swaps: ru.ru_nswap as i64,
        block_in: ru.ru_inblock as i64,
        block_out: ru.ru_oublock as i64,
        msgs_sent: ru.ru_msgsnd as i64,
        msgs_received: ru.ru_msgrcv as i64,
        signals: ru.ru_nsignals as i64,
        voluntary_switches: ru.ru_nvcsw as i64,
        involuntary_switches: ru.ru_nivcsw as i64,
    }
}

/// Reaps `pid`, returning its wait status and resource usage.
fn wait_with_usage(pid: libc::pid_t) -> io::Result<(libc::c_int, libc::rusage)> {
    let mut status: libc::c_int = 0;
    // SAFETY: rusage is plain old data, zeroed is a valid value.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    loop {
        // SAFETY: pid is our own unreaped child; both out-pointers are valid.
        let rc = unsafe { libc::wait4(pid, &mut status, 0, &mut usage) };
        if rc == pid {
            return Ok((status, usage));
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

fn exit_code(status: libc::c_int) -> i32 {
    if libc::WIFEXITED(status) {
        libc::WEXITSTATUS(status)
    } else {
        -1
    }
}

pub struct CommandExecutor;

impl CommandExecutor {
    /// Runs `args` with inherited stdio and measures it.
    pub fn execute(args: &[String]) -> Result<ExecutionRecord> {
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| anyhow!("no command to measure"))?;

        let command_line = record::command_line(args);
        let mut grouping_key = record::grouping_key(&command_line);
        if grouping_key.is_empty() {
            grouping_key = command_line.clone();
        }

        let start = Utc::now().trunc_subsecs(3);
        let start_time = Instant::now();

        let child = Command::new(program)
            .args(rest)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("cannot execute {program:?}"))?;

        ignore_interrupts();

        let pid = libc::pid_t::try_from(child.id()).context("child pid out of range")?;
        let (status, usage) = wait_with_usage(pid).context("cannot wait for child")?;
        let wall = start_time.elapsed();

        let record = ExecutionRecord {
            command_line,
            grouping_key,
            start,
            wall,
            user: timeval(usage.ru_utime),
            system: timeval(usage.ru_stime),
            exit_code: exit_code(status),
            usage: resource_usage(&usage),
        };

        debug!("cmd: {}", record.command_line);
        debug!("start time: {}", record.start.format("%Y-%m-%d %H:%M:%S%.3f %Z"));
        debug!("duration: {:?}", record.wall);

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn measures_exit_code_and_time() {
        let record = CommandExecutor::execute(&argv(&["sh", "-c", "sleep 0.1; exit 3"])).expect("run");
        assert_eq!(record.exit_code, 3);
        assert_eq!(record.command_line, "sh -c sleep 0.1; exit 3");
        assert_eq!(record.grouping_key, record.command_line);
        assert!(record.wall >= Duration::from_millis(100));
        assert_eq!(record.start.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn killed_child_reports_minus_one() {
        let record = CommandExecutor::execute(&argv(&["sh", "-c", "kill -9 $$"])).expect("run");
        assert_eq!(record.exit_code, -1);
    }

    #[test]
    fn missing_program_is_an_error() {
        assert!(CommandExecutor::execute(&argv(&["/definitely/not/a/program"])).is_err());
        assert!(CommandExecutor::execute(&[]).is_err());
    }
}
