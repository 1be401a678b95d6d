//! Process-group primitives shared by the shell, the fork executor, and
//! the signal controller.
//!
//! The `unsafe` in this crate is confined to this module: raw `kill(2)`
//! against process groups and `lseek(2)` against the inherited stdin.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// What the agent's active subprocess actually is.
///
/// A waited-on fork child is a single process group. A running shell
/// command is subtler: the command block executes inside the persistent
/// shell itself (that is what makes state persist), and only its
/// external children sit in their own process groups, courtesy of the
/// shell's job control. Signaling the former targets one group;
/// signaling the latter targets every child group of the shell while
/// sparing the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveTarget {
    /// A process group to signal directly.
    Group(i32),
    /// The persistent shell's pid; signal its children's groups.
    ShellJobs(i32),
}

/// Shared pointer to the subprocess currently executing on behalf of
/// the agent.
///
/// The signal controller reads it to forward SIGINT and to kill on
/// shutdown; executors set it while their subprocess is live. The two
/// target kinds are packed into one atomic: positive values are direct
/// group ids, negative values are shell pids, zero is empty.
#[derive(Debug, Clone, Default)]
pub struct ActiveProcess {
    cell: Arc<AtomicI64>,
}

impl ActiveProcess {
    /// Create a handle with no active process.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a directly signalable process group (fork children).
    pub fn set_group(&self, pgid: i32) {
        if pgid > 0 {
            self.cell.store(i64::from(pgid), Ordering::SeqCst);
        }
    }

    /// Record the persistent shell as the active process while one of
    /// its command blocks runs.
    pub fn set_shell(&self, shell_pid: i32) {
        if shell_pid > 0 {
            self.cell.store(-i64::from(shell_pid), Ordering::SeqCst);
        }
    }

    /// Clear the active process.
    pub fn clear(&self) {
        self.cell.store(0, Ordering::SeqCst);
    }

    /// The active target, if any.
    #[must_use]
    pub fn get(&self) -> Option<ActiveTarget> {
        match self.cell.load(Ordering::SeqCst) {
            0 => None,
            v if v > 0 => Some(ActiveTarget::Group(v as i32)),
            v => Some(ActiveTarget::ShellJobs((-v) as i32)),
        }
    }
}

/// Send `signal` to whatever `target` denotes.
pub fn signal_target(target: ActiveTarget, signal: i32) {
    match target {
        ActiveTarget::Group(pgid) => kill_group(pgid, signal),
        ActiveTarget::ShellJobs(pid) => signal_shell_children(pid, signal),
    }
}

/// Send `signal` to every process in the group identified by `pgid`.
///
/// Grandchildren spawned by the group leader die too, which is the point:
/// a timed-out shell command must not leave orphans writing to the
/// deliverable channel.
#[allow(unsafe_code)]
pub fn kill_group(pgid: i32, signal: i32) {
    if pgid <= 0 {
        return;
    }
    // SAFETY: `kill(-pgid, sig)` targets the process group per POSIX
    // kill(2). The pgid comes from a child this process spawned; a stale
    // value at worst returns ESRCH, which is ignored.
    unsafe {
        libc::kill(-pgid, signal);
    }
}

/// Send `signal` to the process groups of `shell_pid`'s direct
/// children, sparing the shell's own group.
///
/// Under job control every external command the shell runs sits in its
/// own process group, so this kills a hung command's whole tree while
/// the shell lives on to print its sentinels. A child that somehow
/// shares the shell's group is signaled individually.
#[allow(unsafe_code)]
pub fn signal_shell_children(shell_pid: i32, signal: i32) {
    if shell_pid <= 0 {
        return;
    }
    // SAFETY: getpgid(2) is read-only; an invalid pid yields -1.
    let shell_pgid = unsafe { libc::getpgid(shell_pid) };
    for child in child_pids(shell_pid) {
        // SAFETY: as above.
        let child_pgid = unsafe { libc::getpgid(child) };
        if child_pgid <= 0 {
            continue;
        }
        if child_pgid != shell_pgid {
            kill_group(child_pgid, signal);
        } else {
            // SAFETY: kill(2) on a single pid read from /proc moments
            // ago; at worst it raced an exit and returns ESRCH.
            unsafe {
                libc::kill(child, signal);
            }
        }
    }
}

/// Direct children of `pid`, from /proc.
fn child_pids(pid: i32) -> Vec<i32> {
    let mut children = Vec::new();
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return children;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(candidate) = name.to_str().and_then(|s| s.parse::<i32>().ok()) else {
            continue;
        };
        let Ok(stat) = std::fs::read_to_string(format!("/proc/{candidate}/stat")) else {
            continue;
        };
        if stat_ppid(&stat) == Some(pid) {
            children.push(candidate);
        }
    }
    children
}

/// Parse the ppid (field 4) out of a /proc stat line. The comm field may
/// contain spaces and parentheses, so fields are counted from the last
/// closing paren.
fn stat_ppid(stat: &str) -> Option<i32> {
    let after_comm = &stat[stat.rfind(')')? + 1..];
    after_comm.split_whitespace().nth(1)?.parse().ok()
}

/// Current byte offset of fd 0, when stdin is seekable.
///
/// Pipes and terminals have no position; those return `None`.
#[allow(unsafe_code)]
#[must_use]
pub fn stdin_offset() -> Option<u64> {
    // SAFETY: lseek on fd 0 with SEEK_CUR reads the file position without
    // side effects; on non-seekable descriptors it fails with ESPIPE.
    let pos = unsafe { libc::lseek(0, 0, libc::SEEK_CUR) };
    u64::try_from(pos).ok()
}

/// Seek fd 0 to `offset`, when stdin is seekable. Returns whether the
/// seek took effect.
#[allow(unsafe_code)]
pub fn seek_stdin(offset: u64) -> bool {
    let Ok(off) = libc::off_t::try_from(offset) else {
        return false;
    };
    // SAFETY: lseek on fd 0 with SEEK_SET; non-seekable descriptors fail
    // with ESPIPE and leave the stream untouched.
    unsafe { libc::lseek(0, off, libc::SEEK_SET) == off }
}

/// Duplicate a file descriptor onto a descriptor numbered 10 or higher.
///
/// Used to snapshot the agent's own stdout/stdin so the persistent shell
/// can expose them to commands as fds 3 and 4. Duplicating above 10
/// keeps the snapshot clear of the low descriptors the child remaps.
#[allow(unsafe_code)]
pub fn dup_fd(fd: i32) -> std::io::Result<i32> {
    // SAFETY: F_DUPFD on a descriptor this process owns; the result is
    // checked before use.
    let duped = unsafe { libc::fcntl(fd, libc::F_DUPFD, 10) };
    if duped < 0 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(duped)
    }
}
