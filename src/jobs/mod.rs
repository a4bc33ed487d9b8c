//! Backed-up services and the container jobs derived from them

mod spec;

pub use spec::{JobKind, JobSpec, RunTimestamp, VolumeBinding, VolumeMode, BACKUP_MOUNT};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The fixed set of services in the application stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Service {
    IssueTracker,
    Wiki,
    CodeHost,
    IdentityService,
}

impl Service {
    /// Processing order
    pub const ALL: [Service; 4] = [
        Service::IssueTracker,
        Service::Wiki,
        Service::CodeHost,
        Service::IdentityService,
    ];

    /// Name used in artifact file names and logs
    pub fn name(&self) -> &'static str {
        match self {
            Service::IssueTracker => "issue-tracker",
            Service::Wiki => "wiki",
            Service::CodeHost => "code-host",
            Service::IdentityService => "identity-service",
        }
    }

    /// Product directory name inside the application containers
    fn product(&self) -> &'static str {
        match self {
            Service::IssueTracker => "jira",
            Service::Wiki => "confluence",
            Service::CodeHost => "bitbucket",
            Service::IdentityService => "crowd",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Service {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Service::ALL
            .iter()
            .copied()
            .find(|service| service.name() == s)
            .ok_or_else(|| format!("unknown service: {}", s))
    }
}

/// Database a service stores its state in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSpec {
    pub host: String,
    pub user: String,
    pub name: String,
}

/// Static description of one backed-up service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub service: Service,
    pub name: String,
    /// Container whose volumes the filesystem job mounts
    pub container: String,
    pub home_path: String,
    pub install_path: Option<String>,
    pub database: Option<DatabaseSpec>,
}

impl ServiceSpec {
    /// Describe `service` running in `container`.
    ///
    /// The identity service installs into a versioned directory; without a
    /// version only its home directory is archived.
    pub fn new(
        service: Service,
        container: &str,
        identity_service_version: Option<&str>,
        database_host: &str,
    ) -> Self {
        let product = service.product();

        let install_path = match service {
            Service::IdentityService => identity_service_version
                .map(|version| format!("/opt/atlassian/atlassian-crowd-{}", version)),
            _ => Some(format!("/opt/atlassian/{}", product)),
        };

        Self {
            service,
            name: service.name().to_string(),
            container: container.to_string(),
            home_path: format!("/var/atlassian/application-data/{}", product),
            install_path,
            database: Some(DatabaseSpec {
                host: database_host.to_string(),
                user: product.to_string(),
                name: format!("{}db", product),
            }),
        }
    }
}
