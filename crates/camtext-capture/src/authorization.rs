use std::fmt;
use std::fs::File;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::{CaptureError, CaptureResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    NotDetermined,
    Authorized,
    Denied,
    Restricted,
}

impl AuthorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationStatus::NotDetermined => "not-determined",
            AuthorizationStatus::Authorized => "authorized",
            AuthorizationStatus::Denied => "denied",
            AuthorizationStatus::Restricted => "restricted",
        }
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorizationStatus {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "not-determined" | "undetermined" => Ok(AuthorizationStatus::NotDetermined),
            "authorized" | "granted" => Ok(AuthorizationStatus::Authorized),
            "denied" => Ok(AuthorizationStatus::Denied),
            "restricted" => Ok(AuthorizationStatus::Restricted),
            other => Err(CaptureError::configuration(format!(
                "unknown authorization status '{other}'"
            ))),
        }
    }
}

/// Video-capture permission gate.
pub trait Authorizer: Send + Sync {
    fn status(&self) -> AuthorizationStatus;

    /// Asks for access when the status is still undetermined.
    fn request(&self) -> AuthorizationStatus {
        self.status()
    }
}

/// Checks authorization once and turns anything short of a grant into an error.
pub fn authorize(authorizer: &dyn Authorizer) -> CaptureResult<()> {
    let status = match authorizer.status() {
        AuthorizationStatus::NotDetermined => authorizer.request(),
        status => status,
    };
    match status {
        AuthorizationStatus::Authorized => {
            log::debug!("camera access authorized");
            Ok(())
        }
        status => {
            log::warn!("camera access not granted: {status}");
            Err(CaptureError::AuthorizationDenied { status })
        }
    }
}

/// Authorizer answering with a fixed status.
#[derive(Debug, Clone, Copy)]
pub struct StaticAuthorizer {
    status: AuthorizationStatus,
}

impl StaticAuthorizer {
    pub fn new(status: AuthorizationStatus) -> Self {
        Self { status }
    }
}

impl Authorizer for StaticAuthorizer {
    fn status(&self) -> AuthorizationStatus {
        self.status
    }

    fn request(&self) -> AuthorizationStatus {
        match self.status {
            // Nobody is around to answer a prompt; treat silence as a refusal.
            AuthorizationStatus::NotDetermined => AuthorizationStatus::Denied,
            status => status,
        }
    }
}

/// Authorizer backed by the permissions of a V4L2 device node.
///
/// A missing node is not an authorization problem; the session reports it
/// later as a configuration failure.
#[derive(Debug, Clone)]
pub struct DeviceNodeAuthorizer {
    path: PathBuf,
}

impl DeviceNodeAuthorizer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Authorizer for DeviceNodeAuthorizer {
    fn status(&self) -> AuthorizationStatus {
        match File::open(&self.path) {
            Ok(_) => AuthorizationStatus::Authorized,
            Err(err) if err.kind() == ErrorKind::PermissionDenied => AuthorizationStatus::Denied,
            Err(err) if err.kind() == ErrorKind::NotFound => AuthorizationStatus::Authorized,
            Err(err) => {
                log::debug!("probing {} failed: {err}", self.path.display());
                AuthorizationStatus::Restricted
            }
        }
    }
}
