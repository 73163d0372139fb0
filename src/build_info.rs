/// Build metadata stamped in by build.rs, logged at startup and written into
/// crash reports so a reviewed file can be traced back to the binary
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    /// YYYYMMDD.HHMMSS (UTC)
    pub built_at: &'static str,
    pub commit: &'static str,
    pub platform: &'static str,
    pub profile: &'static str,
}

impl BuildInfo {
    pub const CURRENT: BuildInfo = BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        built_at: env!("BUILD_TIMESTAMP"),
        commit: env!("GIT_HASH_SHORT"),
        platform: env!("TARGET_PLATFORM"),
        profile: env!("BUILD_PROFILE"),
    };

    /// `key: value` lines for logs and crash reports
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("version: {}", self.version),
            format!("built: {}", self.built_at),
            format!("commit: {}", self.commit),
            format!("platform: {} ({})", self.platform, self.profile),
        ]
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.version, self.commit, self.built_at)
    }
}
