//! Deployment environment.

use std::fmt;
use std::str::FromStr;

/// Where the host process is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeployEnvironment {
    Local,
    Test,
    Development,
    Staging,
    Production,
}

impl DeployEnvironment {
    /// All known environments, in promotion order.
    pub const ALL: [DeployEnvironment; 5] = [
        DeployEnvironment::Local,
        DeployEnvironment::Test,
        DeployEnvironment::Development,
        DeployEnvironment::Staging,
        DeployEnvironment::Production,
    ];

    /// Looks up an environment by name, ignoring case.
    ///
    /// Returns `None` for unknown names; callers treat that like `Test`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|env| env.name().eq_ignore_ascii_case(name))
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeployEnvironment::Local => "Local",
            DeployEnvironment::Test => "Test",
            DeployEnvironment::Development => "Development",
            DeployEnvironment::Staging => "Staging",
            DeployEnvironment::Production => "Production",
        }
    }

    /// Hosted environments write under the platform log root.
    pub fn is_hosted(&self) -> bool {
        matches!(
            self,
            DeployEnvironment::Development
                | DeployEnvironment::Staging
                | DeployEnvironment::Production
        )
    }
}

impl fmt::Display for DeployEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown environment name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown deploy environment: {0}")]
pub struct UnknownEnvironment(pub String);

impl FromStr for DeployEnvironment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownEnvironment(s.to_string()))
    }
}
