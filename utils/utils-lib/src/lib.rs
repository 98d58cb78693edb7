pub mod constants;
pub use constants::*;

pub mod tracing_telemetry;

pub mod version;

pub use version::{git_version, raw_version_str, raw_version_string, VersionInfo};

pub mod macros {
    /// Makes a version info instance for the calling package.
    #[macro_export]
    macro_rules! version_info {
        () => {{
            $crate::VersionInfo::new(
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_DESCRIPTION"),
                env!("CARGO_PKG_VERSION"),
                $crate::git_version(),
            )
        }};
    }

    /// Returns the package description.
    #[macro_export]
    macro_rules! package_description {
        () => {
            $crate::version_info!().fmt_description()
        };
    }

    /// Gets package's version info as a String.
    #[macro_export]
    macro_rules! version_info_string {
        () => {
            String::from($crate::version_info!())
        };
    }

    /// Gets package's version info as a static str.
    /// Each call to this macro leaks a string.
    #[macro_export]
    macro_rules! version_info_str {
        () => {
            Box::leak(Box::new(String::from($crate::version_info!()))) as &'static str
        };
    }
}
