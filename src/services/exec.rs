use crate::config::Config;
use crate::error::Result;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tracing::{info, warn};

const DESTRUCTIVE_VERBS: &[&str] = &[
    "rm", "rmdir", "del", "erase", "dd", "mkfs", "fdisk", "parted", "iptables", "ufw",
    "firewall-cmd", "chmod", "chown", "chattr", "kill", "killall", "pkill", "shutdown", "reboot",
    "halt", "mv", "move", "rename", "cp", "copy", "xcopy", "tar", "zip", "unzip", "git", "svn",
    "hg",
];

/// Conservative prefix check: the command is exactly a listed verb or starts
/// with one followed by a space.
pub fn is_destructive(command: &str) -> bool {
    let command = command.trim_start().to_lowercase();
    DESTRUCTIVE_VERBS.iter().any(|verb| {
        command == *verb
            || command
                .strip_prefix(verb)
                .is_some_and(|rest| rest.starts_with(' '))
    })
}

/// Asked before a destructive command runs.
pub trait Confirm {
    fn confirm(&mut self, command: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, command: &str) -> bool {
        self(command)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    Declined,
    Exited(Option<i32>),
}

pub struct Executor {
    confirm_destructive: bool,
    audit_log: PathBuf,
}

impl Executor {
    pub fn new(confirm_destructive: bool, audit_log: PathBuf) -> Self {
        Self {
            confirm_destructive,
            audit_log,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.confirm_destructive, config.audit_log.clone())
    }

    pub fn audit_log(&self) -> &PathBuf {
        &self.audit_log
    }

    /// Run `command` through the platform shell. Every attempt is audited,
    /// including ones the user declines.
    pub fn run(&self, command: &str, confirm: &mut dyn Confirm) -> Result<ExecOutcome> {
        if let Err(e) = self.append_audit(command) {
            warn!("Failed to write audit log {}: {}", self.audit_log.display(), e);
        }

        if self.confirm_destructive && is_destructive(command) && !confirm.confirm(command) {
            info!("Declined destructive command: {}", command);
            return Ok(ExecOutcome::Declined);
        }

        info!("Executing: {}", command);
        let status = shell(command).status()?;
        Ok(ExecOutcome::Exited(status.code()))
    }

    fn append_audit(&self, command: &str) -> std::io::Result<()> {
        if let Some(parent) = self.audit_log.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log)?;
        writeln!(file, "{}: {}", Utc::now().to_rfc3339(), command)
    }
}

#[cfg(not(target_os = "windows"))]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(target_os = "windows")]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn classifies_destructive_commands() {
        assert!(is_destructive("rm -rf /tmp/x"));
        assert!(is_destructive("cp a b"));
        assert!(is_destructive("GIT push --force"));
        assert!(is_destructive("halt"));
        assert!(!is_destructive("ls -la"));
        assert!(!is_destructive("rmate notes.txt"));
        assert!(!is_destructive("echo rm"));
    }

    #[test]
    fn declined_commands_are_audited_but_not_run() {
        let temp = tempdir().expect("tempdir");
        let victim = temp.path().join("keep.txt");
        fs::write(&victim, "data").expect("write");
        let log = temp.path().join("logs").join("exec.log");
        let executor = Executor::new(true, log.clone());

        let command = format!("rm {}", victim.display());
        let mut asked = Vec::new();
        let outcome = executor
            .run(&command, &mut |cmd: &str| {
                asked.push(cmd.to_string());
                false
            })
            .expect("run");

        assert_eq!(outcome, ExecOutcome::Declined);
        assert_eq!(asked, vec![command.clone()]);
        assert!(victim.exists());
        let audit = fs::read_to_string(&log).expect("read log");
        assert!(audit.trim_end().ends_with(&format!(": {}", command)));
    }

    #[cfg(unix)]
    #[test]
    fn safe_commands_run_without_confirmation() {
        let temp = tempdir().expect("tempdir");
        let log = temp.path().join("exec.log");
        let executor = Executor::new(true, log.clone());

        let outcome = executor
            .run("exit 3", &mut |_: &str| -> bool { panic!("should not ask") })
            .expect("run");
        assert_eq!(outcome, ExecOutcome::Exited(Some(3)));

        executor.run("true", &mut |_: &str| false).expect("run");
        let audit = fs::read_to_string(&log).expect("read log");
        assert_eq!(audit.lines().count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn confirmation_can_be_disabled() {
        let temp = tempdir().expect("tempdir");
        let target = temp.path().join("gone.txt");
        fs::write(&target, "data").expect("write");
        let executor = Executor::new(false, temp.path().join("exec.log"));

        let outcome = executor
            .run(&format!("rm {}", target.display()), &mut |_: &str| false)
            .expect("run");
        assert_eq!(outcome, ExecOutcome::Exited(Some(0)));
        assert!(!target.exists());
    }
}
