use std::fs;
use std::path::Path;

use anyhow::Result;

use crate::{
    chroot_directory, default_initiator_file, login_all, parse_discovery, parse_initiators,
    Execution, Executor, Iscsi, IscsiError, Operation, Options, ProcessExecutor, Target,
};

static ISCSIADM: &str = "iscsiadm";

/// `iscsiadm` exit status for "session exists", also returned by a logout
/// of a session that is already gone
pub static SESSION_EXISTS: i32 = 15;

/// Backend driving the open-iscsi `iscsiadm` tool.
pub struct LinuxIscsi {
    options: Options,
    executor: Box<dyn Executor>,
}

impl LinuxIscsi {
    pub fn new(options: Options) -> Self {
        LinuxIscsi::with_executor(options, Box::new(ProcessExecutor))
    }

    /// create a backend which runs its commands through `executor`
    pub fn with_executor(options: Options, executor: Box<dyn Executor>) -> Self {
        LinuxIscsi { options, executor }
    }

    pub fn chroot_directory(&self) -> &str {
        chroot_directory(&self.options)
    }

    /// prefixes `cmd` with `chroot <dir>` unless the chroot directory is `/`
    ///
    /// ```
    /// use iscsictl::{LinuxIscsi, Options};
    ///
    /// let mut options = Options::new();
    /// options.insert("chrootDirectory", "/mnt/root");
    ///
    /// let iscsi = LinuxIscsi::new(options);
    /// assert_eq!(
    ///     iscsi.build_command(&["iscsiadm", "-m", "node", "--rescan"]),
    ///     vec!["chroot", "/mnt/root", "iscsiadm", "-m", "node", "--rescan"]
    /// );
    /// ```
    pub fn build_command(&self, cmd: &[&str]) -> Vec<String> {
        let chroot = self.chroot_directory();
        let prefix = if chroot == "/" {
            vec![]
        } else {
            vec!["chroot", chroot]
        };

        prefix
            .into_iter()
            .chain(cmd.iter().copied())
            .map(|s| s.to_string())
            .collect()
    }

    fn run(&self, cmd: &[&str]) -> Result<(String, Execution)> {
        let argv = self.build_command(cmd);
        let command = argv.join(" ");
        log::debug!("running {}", command);

        let res = self.executor.execute(&argv)?;
        Ok((command, res))
    }

    /// login and logout share the exit status handling, a session that
    /// already exists (or is already gone) counts as success
    fn session_op(&self, target: &Target, op: Operation) -> Result<()> {
        let action = match op {
            Operation::Logout => "--logout",
            _ => "-l",
        };
        let cmd = [
            ISCSIADM,
            "-m",
            "node",
            "-T",
            target.target(),
            "--portal",
            target.portal(),
            action,
        ];
        let (command, res) = self.run(&cmd).map_err(|e| {
            log::error!(
                "Error running {} for {} at {}: {:#}",
                op,
                target.target(),
                target.portal(),
                e
            );
            e
        })?;

        match res.code {
            Some(0) => Ok(()),
            Some(code) if code == SESSION_EXISTS => {
                log::warn!(
                    "'{}' returned {}, ignored for {} at {}",
                    command,
                    code,
                    target.target(),
                    target.portal()
                );
                Ok(())
            }
            code => {
                log::error!(
                    "Error during {} of {} at {}: {}",
                    op,
                    target.target(),
                    target.portal(),
                    res.stderr.trim()
                );
                let (target, portal) = (target.target().to_string(), target.portal().to_string());
                match op {
                    Operation::Logout => anyhow::bail!(IscsiError::Logout { target, portal, code }),
                    _ => anyhow::bail!(IscsiError::Login { target, portal, code }),
                }
            }
        }
    }
}

impl Iscsi for LinuxIscsi {
    fn discover_targets(&self, address: &str, login: bool) -> Result<Vec<Target>> {
        let cmd = [ISCSIADM, "-m", "discovery", "-t", "st", "--portal", address];
        let (_, res) = self.run(&cmd)?;

        if !res.success() {
            log::error!("Error discovering {}: {:?}", address, res.code);
            anyhow::bail!(IscsiError::Discovery {
                address: address.to_string(),
                code: res.code,
                stderr: res.stderr.trim().to_string(),
            })
        }

        let targets = parse_discovery(&res.stdout);
        if login {
            login_all(self, &targets);
        }

        Ok(targets)
    }

    fn get_initiators(&self, filename: Option<&Path>) -> Result<Vec<String>> {
        let path = match filename {
            Some(f) if !f.as_os_str().is_empty() => f.to_path_buf(),
            _ => default_initiator_file(&self.options),
        };

        if let Err(source) = fs::metadata(&path) {
            anyhow::bail!(IscsiError::NoInitiatorFile { path, source })
        }

        let text = fs::read_to_string(&path).map_err(|e| {
            log::error!("Error gathering initiator names: {}", e);
            IscsiError::Io(e)
        })?;

        parse_initiators(&text)
    }

    fn perform_login(&self, target: &Target) -> Result<()> {
        self.session_op(target, Operation::Login)
    }

    fn perform_logout(&self, target: &Target) -> Result<()> {
        self.session_op(target, Operation::Logout)
    }

    fn perform_rescan(&self) -> Result<()> {
        let (command, res) = self.run(&[ISCSIADM, "-m", "node", "--rescan"])?;
        if !res.success() {
            anyhow::bail!(IscsiError::CommandFailed {
                command,
                code: res.code,
                stderr: res.stderr.trim().to_string(),
            })
        }

        Ok(())
    }

    fn is_mock(&self) -> bool {
        false
    }

    fn options(&self) -> &Options {
        &self.options
    }
}
