use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{
    login_all, Iscsi, IscsiError, Operation, Options, Target, MOCK_NUMBER_OF_INITIATORS,
    MOCK_NUMBER_OF_TARGETS,
};

pub static MOCK_TARGET_PREFIX: &str = "iqn.1992-04.com.mock:600009700bcbb70e32870174000";
pub static MOCK_INITIATOR_PREFIX: &str = "iqn.1993-08.com.mock:01:00000000";
pub static MOCK_PORT: u16 = 3260;

/// Operations the mock backend should fail.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InducedErrors {
    #[serde(default)]
    pub discovery: bool,
    #[serde(default)]
    pub initiators: bool,
    #[serde(default)]
    pub login: bool,
    #[serde(default)]
    pub logout: bool,
    #[serde(default)]
    pub rescan: bool,
}

impl InducedErrors {
    pub const fn none() -> Self {
        InducedErrors {
            discovery: false,
            initiators: false,
            login: false,
            logout: false,
            rescan: false,
        }
    }

    /// an `InducedErrors` failing only `op`
    pub fn only(op: Operation) -> Self {
        let mut errs = InducedErrors::none();
        errs.set(op, true);
        errs
    }

    pub fn get(&self, op: Operation) -> bool {
        match op {
            Operation::Discovery => self.discovery,
            Operation::Initiators => self.initiators,
            Operation::Login => self.login,
            Operation::Logout => self.logout,
            Operation::Rescan => self.rescan,
        }
    }

    pub fn set(&mut self, op: Operation, induce: bool) {
        let flag = match op {
            Operation::Discovery => &mut self.discovery,
            Operation::Initiators => &mut self.initiators,
            Operation::Login => &mut self.login,
            Operation::Logout => &mut self.logout,
            Operation::Rescan => &mut self.rescan,
        };
        *flag = induce;
    }
}

static INDUCED_ERRORS: Mutex<InducedErrors> = Mutex::new(InducedErrors::none());

/// process-wide induced errors, used by every `MockIscsi` built with
/// [`MockIscsi::new`]
pub fn induced_errors() -> InducedErrors {
    *INDUCED_ERRORS.lock().unwrap_or_else(|e| e.into_inner())
}

pub fn set_induced_errors(errs: InducedErrors) {
    *INDUCED_ERRORS.lock().unwrap_or_else(|e| e.into_inner()) = errs;
}

/// toggles a single process-wide induced error
pub fn induce_error(op: Operation, induce: bool) {
    INDUCED_ERRORS
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .set(op, induce);
}

pub fn reset_induced_errors() {
    set_induced_errors(InducedErrors::none());
}

/// Backend returning synthetic targets and initiators.
#[derive(Debug, Default, Clone)]
pub struct MockIscsi {
    options: Options,
    faults: Option<InducedErrors>,
}

impl MockIscsi {
    /// create a mock which consults the process-wide induced errors
    pub fn new(options: Options) -> Self {
        MockIscsi {
            options,
            faults: None,
        }
    }

    /// create a mock with its own induced errors, independent from other
    /// instances and from the process-wide setting
    ///
    /// ```
    /// use iscsictl::{InducedErrors, Iscsi, MockIscsi, Operation, Options};
    ///
    /// let iscsi = MockIscsi::with_faults(Options::new(), InducedErrors::only(Operation::Rescan));
    /// assert!(iscsi.perform_rescan().is_err());
    /// ```
    pub fn with_faults(options: Options, faults: InducedErrors) -> Self {
        MockIscsi {
            options,
            faults: Some(faults),
        }
    }

    pub fn faults(&self) -> InducedErrors {
        self.faults.unwrap_or_else(induced_errors)
    }

    fn check(&self, op: Operation) -> Result<()> {
        if self.faults().get(op) {
            anyhow::bail!(IscsiError::Induced(op))
        }
        Ok(())
    }

    /// configured count for `key`, unset or zero meaning one
    fn count(&self, key: &str) -> i64 {
        match self.options.get_int(key) {
            0 => 1,
            n => n,
        }
    }
}

impl Iscsi for MockIscsi {
    fn discover_targets(&self, address: &str, login: bool) -> Result<Vec<Target>> {
        self.check(Operation::Discovery)?;

        let portal = format!("{}:{}", address, MOCK_PORT);
        let targets = (0..self.count(MOCK_NUMBER_OF_TARGETS))
            .map(|idx| {
                Target::new(
                    portal.clone(),
                    "0".to_string(),
                    format!("{}{:05}", MOCK_TARGET_PREFIX, idx),
                )
            })
            .collect::<Vec<Target>>();

        if login {
            login_all(self, &targets);
        }

        Ok(targets)
    }

    fn get_initiators(&self, _filename: Option<&Path>) -> Result<Vec<String>> {
        self.check(Operation::Initiators)?;

        let initiators = (0..self.count(MOCK_NUMBER_OF_INITIATORS))
            .map(|idx| format!("{}{:05}", MOCK_INITIATOR_PREFIX, idx))
            .collect();

        Ok(initiators)
    }

    fn perform_login(&self, _target: &Target) -> Result<()> {
        self.check(Operation::Login)
    }

    fn perform_logout(&self, _target: &Target) -> Result<()> {
        self.check(Operation::Logout)
    }

    fn perform_rescan(&self) -> Result<()> {
        self.check(Operation::Rescan)
    }

    fn is_mock(&self) -> bool {
        true
    }

    fn options(&self) -> &Options {
        &self.options
    }
}

#[cfg(test)]
mod test {
    use anyhow::Result;
    use serial_test::serial;

    use super::*;

    fn opts(key: &str, value: &str) -> Options {
        Options::from_iter([(key, value)])
    }

    fn vol() -> Target {
        Target::new("10.0.0.1:3260", "0", "iqn.2018-11.com.vine:vol")
    }

    fn assert_induced(res: Result<impl std::fmt::Debug>, op: Operation) {
        let err = res.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IscsiError>(),
            Some(IscsiError::Induced(o)) if *o == op
        ));
    }

    #[test]
    #[serial]
    fn discover_one_target_by_default() -> Result<()> {
        reset_induced_errors();
        let iscsi = MockIscsi::new(Options::new());

        let targets = iscsi.discover_targets("10.0.0.1", false)?;
        assert_eq!(
            targets,
            vec![Target::new(
                "10.0.0.1:3260",
                "0",
                "iqn.1992-04.com.mock:600009700bcbb70e3287017400000000"
            )]
        );
        Ok(())
    }

    #[test]
    #[serial]
    fn discover_configured_targets() -> Result<()> {
        reset_induced_errors();
        let iscsi = MockIscsi::new(opts(MOCK_NUMBER_OF_TARGETS, "5"));

        let targets = iscsi.discover_targets("10.0.0.1", true)?;
        assert_eq!(targets.len(), 5);
        for (idx, target) in targets.iter().enumerate() {
            assert!(target.target().ends_with(&format!("{:05}", idx)));
            assert_eq!(target.portal(), "10.0.0.1:3260");
            assert_eq!(target.group_tag(), "0");
        }
        Ok(())
    }

    #[test]
    #[serial]
    fn non_numeric_count_reads_as_one() -> Result<()> {
        reset_induced_errors();
        let iscsi = MockIscsi::new(opts(MOCK_NUMBER_OF_TARGETS, "five"));
        assert_eq!(iscsi.discover_targets("10.0.0.1", false)?.len(), 1);

        let iscsi = MockIscsi::new(opts(MOCK_NUMBER_OF_TARGETS, "-2"));
        assert!(iscsi.discover_targets("10.0.0.1", false)?.is_empty());
        Ok(())
    }

    #[test]
    #[serial]
    fn list_configured_initiators() -> Result<()> {
        reset_induced_errors();
        let iscsi = MockIscsi::new(opts(MOCK_NUMBER_OF_INITIATORS, "3"));

        assert_eq!(
            iscsi.get_initiators(None)?,
            vec![
                "iqn.1993-08.com.mock:01:0000000000000",
                "iqn.1993-08.com.mock:01:0000000000001",
                "iqn.1993-08.com.mock:01:0000000000002",
            ]
        );
        assert_eq!(MockIscsi::new(Options::new()).get_initiators(None)?.len(), 1);
        Ok(())
    }

    #[test]
    #[serial]
    fn session_ops_succeed() -> Result<()> {
        reset_induced_errors();
        let iscsi = MockIscsi::new(Options::new());

        iscsi.perform_login(&vol())?;
        iscsi.perform_logout(&vol())?;
        iscsi.perform_logout(&vol())?;
        iscsi.perform_rescan()?;
        Ok(())
    }

    #[test]
    #[serial]
    fn process_wide_induced_errors() -> Result<()> {
        reset_induced_errors();
        let iscsi = MockIscsi::new(opts(MOCK_NUMBER_OF_TARGETS, "5"));

        induce_error(Operation::Discovery, true);
        assert_induced(iscsi.discover_targets("10.0.0.1", false), Operation::Discovery);
        iscsi.get_initiators(None)?;

        induce_error(Operation::Discovery, false);
        assert_eq!(iscsi.discover_targets("10.0.0.1", false)?.len(), 5);

        set_induced_errors(InducedErrors {
            initiators: true,
            login: true,
            logout: true,
            rescan: true,
            ..Default::default()
        });
        assert_induced(iscsi.get_initiators(None), Operation::Initiators);
        assert_induced(iscsi.perform_login(&vol()), Operation::Login);
        assert_induced(iscsi.perform_logout(&vol()), Operation::Logout);
        assert_induced(iscsi.perform_rescan(), Operation::Rescan);

        // failed logins do not fail discovery
        assert_eq!(iscsi.discover_targets("10.0.0.1", true)?.len(), 5);

        reset_induced_errors();
        assert_eq!(induced_errors(), InducedErrors::none());
        Ok(())
    }

    #[test]
    #[serial]
    fn instance_faults_ignore_process_wide_state() -> Result<()> {
        set_induced_errors(InducedErrors::only(Operation::Login));
        let iscsi = MockIscsi::with_faults(Options::new(), InducedErrors::only(Operation::Logout));

        iscsi.perform_login(&vol())?;
        assert_induced(iscsi.perform_logout(&vol()), Operation::Logout);

        reset_induced_errors();
        Ok(())
    }

    #[test]
    fn induced_errors_from_yaml() -> Result<()> {
        let errs = serde_yml::from_str::<InducedErrors>("discovery: true\nrescan: true\n")?;
        assert!(errs.get(Operation::Discovery));
        assert!(errs.get(Operation::Rescan));
        assert!(!errs.get(Operation::Login));
        Ok(())
    }
}
