use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The five operations every backend provides.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Discovery,
    Initiators,
    Login,
    Logout,
    Rescan,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Discovery => "target discovery",
            Operation::Initiators => "initiator listing",
            Operation::Login => "iSCSI login",
            Operation::Logout => "iSCSI logout",
            Operation::Rescan => "iSCSI rescan",
        };
        f.write_str(name)
    }
}

fn code_str(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string())
}

#[derive(Error, Debug)]
pub enum IscsiError {
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("'{command}' exited with status {}: {stderr}", code_str(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Failed to discover targets at '{address}' (status {}): {stderr}", code_str(.code))]
    Discovery {
        address: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("Failed to log in to '{target}' at '{portal}' (status {})", code_str(.code))]
    Login {
        target: String,
        portal: String,
        code: Option<i32>,
    },
    #[error("Failed to log out of '{target}' at '{portal}' (status {})", code_str(.code))]
    Logout {
        target: String,
        portal: String,
        code: Option<i32>,
    },

    #[error("Initiator file '{}' is not accessible: {source}", .path.display())]
    NoInitiatorFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read initiator names: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} induced error")]
    Induced(Operation),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn messages_name_target_and_portal() {
        let e = IscsiError::Login {
            target: "iqn.2018-11.com.vine:vol".to_string(),
            portal: "10.0.0.1:3260".to_string(),
            code: Some(8),
        };
        let msg = e.to_string();
        assert!(msg.contains("iqn.2018-11.com.vine:vol"));
        assert!(msg.contains("10.0.0.1:3260"));
        assert!(msg.contains("status 8"));

        let e = IscsiError::CommandFailed {
            command: "iscsiadm -m node --rescan".to_string(),
            code: None,
            stderr: String::new(),
        };
        assert!(e.to_string().contains("status signal"));
    }

    #[test]
    fn induced_names_operation() {
        assert_eq!(
            IscsiError::Induced(Operation::Rescan).to_string(),
            "iSCSI rescan induced error"
        );
    }
}
