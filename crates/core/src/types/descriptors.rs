//! Identity of targets and recordings

use crate::errors::{Error, Result};
use std::fmt;
use std::path::Path;
use url::Url;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Opaque selector narrowing a report; empty means the full, unfiltered report
pub type ReportFilter = String;

/// Username/password pair used to reach a target
///
/// The password is wiped from memory when the value is dropped and never
/// appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Hash, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A remote target (or, for archived recordings, the archive file itself)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionDescriptor {
    target_id: String,
    credentials: Option<Credentials>,
}

impl ConnectionDescriptor {
    pub fn new(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(target_id: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            target_id: target_id.into(),
            credentials: Some(credentials),
        }
    }

    /// Descriptor synthesized from an archived recording's own `file://` URI
    pub fn from_archive_file(path: &Path) -> Result<Self> {
        let url = Url::from_file_path(path).map_err(|()| {
            Error::invalid_argument(
                "path",
                format!("'{}' is not an absolute file path", path.display()),
            )
        })?;
        Ok(Self::new(url.as_str()))
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Same target, ignoring which credentials were used to reach it
    pub fn same_target(&self, other: &ConnectionDescriptor) -> bool {
        self.target_id == other.target_id
    }
}

impl fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target_id)
    }
}

/// A named recording on a specific target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordingDescriptor {
    pub connection: ConnectionDescriptor,
    pub recording_name: String,
}

impl RecordingDescriptor {
    pub fn new(connection: ConnectionDescriptor, recording_name: impl Into<String>) -> Self {
        Self {
            connection,
            recording_name: recording_name.into(),
        }
    }

    /// Reject descriptors that cannot possibly address a recording
    pub fn validate(&self) -> Result<()> {
        if self.connection.target_id().trim().is_empty() {
            return Err(Error::invalid_argument("target_id", "cannot be blank"));
        }
        if self.recording_name.trim().is_empty() {
            return Err(Error::invalid_argument("recording_name", "cannot be blank"));
        }
        Ok(())
    }
}

impl fmt::Display for RecordingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.connection, self.recording_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_are_value_equal() {
        let a = RecordingDescriptor::new(ConnectionDescriptor::new("service:jmx:rmi://a"), "rec");
        let b = RecordingDescriptor::new(ConnectionDescriptor::new("service:jmx:rmi://a"), "rec");
        assert_eq!(a, b);

        let with_creds = ConnectionDescriptor::with_credentials(
            "service:jmx:rmi://a",
            Credentials::new("user", "secret"),
        );
        assert_ne!(a.connection, with_creds);
        assert!(a.connection.same_target(&with_creds));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("admin", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn validate_rejects_blank_fields() {
        let blank_target = RecordingDescriptor::new(ConnectionDescriptor::new(" "), "rec");
        assert!(matches!(
            blank_target.validate(),
            Err(Error::InvalidArgument { .. })
        ));
        let blank_name = RecordingDescriptor::new(ConnectionDescriptor::new("t"), "");
        assert!(blank_name.validate().is_err());
        let ok = RecordingDescriptor::new(ConnectionDescriptor::new("t"), "rec");
        assert!(ok.validate().is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn archive_descriptor_uses_file_uri() {
        let cd = ConnectionDescriptor::from_archive_file(Path::new("/var/archive/scope/rec.jfr"))
            .unwrap();
        assert_eq!(cd.target_id(), "file:///var/archive/scope/rec.jfr");
        assert!(ConnectionDescriptor::from_archive_file(Path::new("relative.jfr")).is_err());
    }
}
