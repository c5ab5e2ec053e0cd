use std::fmt;

use serde::{Deserialize, Serialize};

/// A target reported by sendtargets discovery.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    portal: String,
    group_tag: String,
    target: String,
}

impl Target {
    pub fn new<S: Into<String>>(portal: S, group_tag: S, target: S) -> Self {
        Target {
            portal: portal.into(),
            group_tag: group_tag.into(),
            target: target.into(),
        }
    }

    /// `ip:port` the target is reachable at
    pub fn portal(&self) -> &str {
        &self.portal
    }

    pub fn group_tag(&self) -> &str {
        &self.group_tag
    }

    /// target IQN
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}", self.portal, self.group_tag, self.target)
    }
}

/// parses `iscsiadm -m discovery` output.
///
/// Every usable line looks like:
///
/// ```text
/// 10.247.73.130:3260,0 iqn.1992-04.com.emc:600009700bcbb70e3287017400000001
/// ```
///
/// Lines that are not exactly two space separated tokens are skipped, as are
/// lines whose first token has no `portal,tag` pair.
pub fn parse_discovery(output: &str) -> Vec<Target> {
    output
        .split('\n')
        .filter_map(|line| {
            let tokens = line.split(' ').collect::<Vec<&str>>();
            if tokens.len() != 2 {
                return None;
            }

            let (portal, group_tag) = tokens[0].split_once(',')?;
            let target = tokens[1].trim_end_matches('\r');
            if portal.is_empty() || group_tag.is_empty() || target.is_empty() {
                return None;
            }

            Some(Target::new(portal, group_tag, target))
        })
        .collect()
}
