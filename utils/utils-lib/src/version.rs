use std::fmt::{Display, Formatter};

/// Package version information, rendered as `<version> (<git version>)` when the build
/// provides a `GIT_VERSION`.
#[derive(Debug, Clone)]
pub struct VersionInfo {
    name: &'static str,
    description: &'static str,
    version: &'static str,
    git_version: Option<&'static str>,
}

impl VersionInfo {
    /// Create a new `Self`, usually through the `version_info!` macro.
    pub fn new(
        name: &'static str,
        description: &'static str,
        version: &'static str,
        git_version: Option<&'static str>,
    ) -> Self {
        Self {
            name,
            description,
            version,
            git_version,
        }
    }
    /// The package description, falling back to the package name.
    pub fn fmt_description(&self) -> &'static str {
        if self.description.is_empty() {
            self.name
        } else {
            self.description
        }
    }
}

impl Display for VersionInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.git_version {
            Some(git) if !git.is_empty() => write!(f, "{} ({})", self.version, git),
            _ => write!(f, "{}", self.version),
        }
    }
}

impl From<VersionInfo> for String {
    fn from(info: VersionInfo) -> Self {
        info.to_string()
    }
}

/// The git version of the workspace, if known at build time.
pub fn git_version() -> Option<&'static str> {
    option_env!("GIT_VERSION")
}

/// The raw version of this crate, with the git version if known at build time.
pub fn raw_version_str() -> &'static str {
    git_version().unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Analogous to `raw_version_str`.
pub fn raw_version_string() -> String {
    String::from(raw_version_str())
}
