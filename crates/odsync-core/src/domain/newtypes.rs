//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for the identifiers and opaque tokens that flow
//! through the sync engine. Each newtype validates its invariant at
//! construction time so the rest of the crate can assume well-formed values.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Path types
// ============================================================================

/// A validated absolute path within the local sync root.
///
/// Guarantees the path is absolute and free of `.`/`..` components; never
/// guarantees the path currently exists on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct SyncPath(PathBuf);

impl SyncPath {
    /// Create a new `SyncPath`, validating it is absolute and normalizing
    /// away any `.`/`..` components.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path is not absolute or
    /// escapes its own root via `..`.
    pub fn new(path: PathBuf) -> Result<Self, DomainError> {
        if !path.is_absolute() {
            return Err(DomainError::InvalidPath(format!(
                "path must be absolute: {}",
                path.display()
            )));
        }
        Ok(Self(Self::normalize(&path)?))
    }

    /// Inner path reference.
    #[must_use]
    pub fn as_path(&self) -> &PathBuf {
        &self.0
    }

    /// Consume and return the inner `PathBuf`.
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// This path relative to `root`.
    ///
    /// # Errors
    /// Returns an error if `self` is not nested under `root`.
    pub fn relative_to(&self, root: &SyncPath) -> Result<PathBuf, DomainError> {
        self.0
            .strip_prefix(&root.0)
            .map(std::path::Path::to_path_buf)
            .map_err(|_| {
                DomainError::PathNotInSyncRoot(format!(
                    "{} is not within {}",
                    self.0.display(),
                    root.0.display()
                ))
            })
    }

    /// Join a single path component, rejecting traversal attempts.
    ///
    /// # Errors
    /// Returns an error if `component` contains `..` or a path separator.
    pub fn join(&self, component: &str) -> Result<Self, DomainError> {
        if component.contains("..") || component.starts_with('/') {
            return Err(DomainError::InvalidPath(format!(
                "invalid path component: {component}"
            )));
        }
        Self::new(self.0.join(component))
    }

    fn normalize(path: &PathBuf) -> Result<PathBuf, DomainError> {
        use std::path::Component;

        let mut normalized = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Prefix(p) => normalized.push(p.as_os_str()),
                Component::RootDir => normalized.push("/"),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(DomainError::InvalidPath(
                            "path escapes root via ..".to_string(),
                        ));
                    }
                }
                Component::Normal(c) => normalized.push(c),
            }
        }
        Ok(normalized)
    }
}

impl Display for SyncPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl TryFrom<PathBuf> for SyncPath {
    type Error = DomainError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl From<SyncPath> for PathBuf {
    fn from(sync_path: SyncPath) -> Self {
        sync_path.0
    }
}

impl AsRef<std::path::Path> for SyncPath {
    fn as_ref(&self) -> &std::path::Path {
        &self.0
    }
}

/// A remote path in OneDrive's `/drive/root:/…` addressing scheme.
///
/// Always starts with `/`; `"/"` denotes the sync root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemotePath(String);

impl RemotePath {
    /// Create a new `RemotePath`.
    ///
    /// # Errors
    /// Returns an error if the path doesn't start with `/`, contains `//`,
    /// or contains a `..` traversal segment.
    pub fn new(path: String) -> Result<Self, DomainError> {
        if !path.starts_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "remote path must start with '/': {path}"
            )));
        }
        if path.len() > 1 && path.contains("//") {
            return Err(DomainError::InvalidRemotePath(format!(
                "remote path contains '//': {path}"
            )));
        }
        if path.contains("..") {
            return Err(DomainError::InvalidRemotePath(format!(
                "remote path contains '..': {path}"
            )));
        }
        Ok(Self(path))
    }

    /// The root path, `"/"`.
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a single path component.
    ///
    /// # Errors
    /// Returns an error if `component` is empty or contains `/` or `..`.
    pub fn join(&self, component: &str) -> Result<Self, DomainError> {
        if component.is_empty() || component.contains('/') || component.contains("..") {
            return Err(DomainError::InvalidRemotePath(format!(
                "invalid path component: {component}"
            )));
        }
        let joined = if self.0 == "/" {
            format!("/{component}")
        } else {
            format!("{}/{component}", self.0)
        };
        Self::new(joined)
    }

    /// Parent remote path, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0 == "/" {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Final path segment, or `None` for the root.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.0 == "/" {
            return None;
        }
        self.0.rsplit('/').next()
    }
}

impl Display for RemotePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemotePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemotePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemotePath> for String {
    fn from(path: RemotePath) -> Self {
        path.0
    }
}

// ============================================================================
// Opaque remote identifiers / tokens
// ============================================================================

/// Generates a simple validated opaque-string newtype: non-empty.
macro_rules! opaque_string_newtype {
    ($name:ident, $err:ident, $what:literal) => {
        #[doc = concat!("Opaque ", $what, " reported by the remote drive.")]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a new `", stringify!($name), "`.")]
            ///
            /// # Errors
            /// Returns an error if the value is empty.
            pub fn new(value: String) -> Result<Self, DomainError> {
                if value.is_empty() {
                    return Err(DomainError::$err(format!("{} cannot be empty", $what)));
                }
                Ok(Self(value))
            }

            /// Inner string reference.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s.to_string())
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

opaque_string_newtype!(RemoteId, InvalidRemoteId, "remote id");
opaque_string_newtype!(ETag, InvalidETag, "etag");
opaque_string_newtype!(CTag, InvalidCTag, "ctag");

/// Opaque delta cursor reported by the remote drive.
///
/// Unlike the other opaque tokens, the empty string is a valid `DeltaToken`:
/// it is the sentinel the remote API contract assigns to "no cursor yet",
/// requesting full enumeration from the beginning.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeltaToken(String);

impl DeltaToken {
    /// Create a new `DeltaToken`. Always succeeds; the empty string is valid.
    #[must_use]
    pub fn new(value: String) -> Result<Self, DomainError> {
        Ok(Self(value))
    }

    /// The sentinel token requesting full enumeration from the beginning.
    #[must_use]
    pub fn initial() -> Self {
        Self(String::new())
    }

    /// True if this is the initial (empty) cursor.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.0.is_empty()
    }

    /// Inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DeltaToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeltaToken {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for DeltaToken {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DeltaToken> for String {
    fn from(value: DeltaToken) -> Self {
        value.0
    }
}

/// A hex-encoded CRC32 content hash, as reported by the remote drive and
/// recomputed locally for comparison.
///
/// Stored lowercase so remote and locally-computed hashes compare equal
/// regardless of casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crc32Hex(String);

impl Crc32Hex {
    /// Create a `Crc32Hex` from a hex string.
    ///
    /// # Errors
    /// Returns an error if the string is not exactly 8 hex digits.
    pub fn new(value: String) -> Result<Self, DomainError> {
        if value.len() != 8 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidHash(format!(
                "expected 8 hex digits for a CRC32, got: {value}"
            )));
        }
        Ok(Self(value.to_lowercase()))
    }

    /// Compute the CRC32 of `data` and render it as lowercase hex.
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        let checksum = crc32fast::hash(data);
        Self(format!("{checksum:08x}"))
    }

    /// Inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Crc32Hex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Crc32Hex {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Crc32Hex> for String {
    fn from(hash: Crc32Hex) -> Self {
        hash.0
    }
}

// ============================================================================
// Tests
// ============================================================================
