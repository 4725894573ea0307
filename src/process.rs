use std::process::ExitStatus;

use tokio::process::{Child, Command};

/// Put the child in its own process group so killing it also takes out any
/// workers it forks (vitest spawns a pool; provider commands may too).
pub fn isolate_process_group(cmd: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.as_std_mut().process_group(0);
    }
    #[cfg(not(unix))]
    let _ = cmd;
}

/// Guard that kills the child process (and its entire process group) on
/// drop, so a timed-out or cancelled future never leaks orphans.
pub struct ChildGuard {
    child: Option<Child>,
    /// Process group ID saved at spawn time so we can kill the whole group.
    #[cfg(unix)]
    pgid: Option<u32>,
}

impl ChildGuard {
    pub fn new(child: Child) -> Self {
        #[cfg(unix)]
        let pgid = child.id();
        Self {
            child: Some(child),
            #[cfg(unix)]
            pgid,
        }
    }

    /// Wait for the child to exit. A clean exit disarms the group kill.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| std::io::Error::other("child already reaped"))?;
        let status = child.wait().await?;
        #[cfg(unix)]
        {
            self.pgid = None;
        }
        self.child = None;
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            unsafe { libc::kill(-(pgid as libc::pid_t), libc::SIGKILL) };
        }
        // Fallback / non-Unix: kill just the direct child.
        if let Some(ref mut child) = self.child {
            let _ = child.start_kill();
        }
    }
}
