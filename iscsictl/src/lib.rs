//! Discovery, login, logout and rescan of iSCSI targets through `iscsiadm`.
//!
//! Two backends share the [`Iscsi`] trait: [`LinuxIscsi`] runs the open-iscsi
//! command line tool, [`MockIscsi`] synthesizes targets and initiators so
//! callers can be tested without hardware or root.
//!
//! ```no_run
//! use iscsictl::{new_iscsi, Iscsi, Options};
//!
//! let mut options = Options::new();
//! options.insert("chrootDirectory", "/noderoot");
//!
//! let iscsi = new_iscsi(false, options);
//! let targets = iscsi.discover_targets("10.0.0.1", true)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use regex::Regex;

mod config;
mod error;
mod exec;
mod linux;
mod mock;
mod target;

pub use config::*;
pub use error::*;
pub use exec::*;
pub use linux::*;
pub use mock::*;
pub use target::*;

/// run `iscsiadm` inside this directory, helpful for containerized services
pub static CHROOT_DIRECTORY: &str = "chrootDirectory";
/// number of initiators reported by the mock backend
pub static MOCK_NUMBER_OF_INITIATORS: &str = "numberOfInitiators";
/// number of targets reported by the mock backend
pub static MOCK_NUMBER_OF_TARGETS: &str = "numberOfTargets";
/// initiator names file on CentOS, RedHat, Debian and Ubuntu
pub static DEFAULT_INITIATOR_NAME_FILE: &str = "/etc/iscsi/initiatorname.iscsi";

/// Operations shared by the real and the mock backend.
pub trait Iscsi {
    /// runs a sendtargets discovery against `address`.
    ///
    /// With `login` set every discovered target is logged in to. Failed logins
    /// are only logged, the discovered targets are still returned.
    fn discover_targets(&self, address: &str, login: bool) -> Result<Vec<Target>>;

    /// lists the initiator IQNs configured on this host, reading `filename`
    /// or the backend's default location when it is `None` or empty.
    fn get_initiators(&self, filename: Option<&Path>) -> Result<Vec<String>>;

    /// logs in to `target`, an already existing session is not an error
    fn perform_login(&self, target: &Target) -> Result<()>;

    /// logs out of `target`, a missing session is not an error
    fn perform_logout(&self, target: &Target) -> Result<()>;

    /// rescans the targets of all current sessions
    fn perform_rescan(&self) -> Result<()>;

    fn is_mock(&self) -> bool;

    fn options(&self) -> &Options;
}

/// create a backend, the mock one when `mock` is set
///
/// ```
/// use iscsictl::{new_iscsi, Iscsi, Options};
///
/// let iscsi = new_iscsi(true, Options::new());
/// assert!(iscsi.is_mock());
/// assert_eq!(iscsi.discover_targets("10.0.0.1", false).unwrap().len(), 1);
/// ```
pub fn new_iscsi(mock: bool, options: Options) -> Box<dyn Iscsi> {
    if mock {
        Box::new(MockIscsi::new(options))
    } else {
        Box::new(LinuxIscsi::new(options))
    }
}

/// String options handed to a backend at construction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Options {
    inner: HashMap<String, String>,
}

impl Options {
    pub fn new() -> Self {
        Options {
            inner: HashMap::new(),
        }
    }

    pub fn insert<S: AsRef<str>>(&mut self, k: S, v: S) -> &Self {
        self.inner
            .insert(k.as_ref().to_string(), v.as_ref().to_string());
        self
    }

    pub fn get<S: AsRef<str>>(&self, k: S) -> Option<&str> {
        self.inner.get(k.as_ref()).map(|v| v.as_str())
    }

    /// value of `k`, or `default` when it is absent or empty
    pub fn get_or<'a, S: AsRef<str>>(&'a self, k: S, default: &'a str) -> &'a str {
        match self.get(k) {
            Some(v) if !v.is_empty() => v,
            _ => default,
        }
    }

    /// integer value of `k`.
    ///
    /// Absent and non-numeric values both read as 0, which hides typos in the
    /// configuration. Kept that way for compatibility with existing setups.
    pub fn get_int<S: AsRef<str>>(&self, k: S) -> i64 {
        self.get(k)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl From<HashMap<String, String>> for Options {
    fn from(inner: HashMap<String, String>) -> Self {
        Options { inner }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Options {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Options {
            inner: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// chroot directory configured in `options`, `/` when unset
pub(crate) fn chroot_directory(options: &Options) -> &str {
    options.get_or(CHROOT_DIRECTORY, "/")
}

/// default initiator names file, relative to the chroot directory
pub(crate) fn default_initiator_file(options: &Options) -> PathBuf {
    let chroot = chroot_directory(options);
    if chroot == "/" {
        PathBuf::from(DEFAULT_INITIATOR_NAME_FILE)
    } else {
        Path::new(chroot).join(DEFAULT_INITIATOR_NAME_FILE.trim_start_matches('/'))
    }
}

/// extracts the IQNs from an initiator names file.
///
/// Whitespace is removed from every line before matching, so
/// `InitiatorName = iqn.x` and `InitiatorName=iqn.x` are equivalent.
pub(crate) fn parse_initiators(text: &str) -> Result<Vec<String>> {
    let re = Regex::new(r"^InitiatorName=([^=]*)")?;

    let iqns = text
        .split('\n')
        .filter_map(|line| {
            let line = line.split_whitespace().collect::<String>();
            re.captures(&line)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
        .collect();

    Ok(iqns)
}

/// logs in to every target, reporting failures only through the log
pub(crate) fn login_all<I: Iscsi + ?Sized>(iscsi: &I, targets: &[Target]) {
    for target in targets {
        if let Err(e) = iscsi.perform_login(target) {
            log::warn!(
                "login to {} at {} after discovery failed: {:#}",
                target.target(),
                target.portal(),
                e
            );
        }
    }
}
