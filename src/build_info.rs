/// Build information captured at compile time by `build.rs`
pub struct BuildInfo;

impl BuildInfo {
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Build timestamp in YYYYMMDD.HHMMSS format
    pub fn build_timestamp() -> &'static str {
        env!("BUILD_TIMESTAMP")
    }

    pub fn git_hash() -> &'static str {
        env!("GIT_HASH")
    }

    pub fn git_hash_short() -> &'static str {
        env!("GIT_HASH_SHORT")
    }

    /// Target platform as arch-os
    pub fn target_platform() -> &'static str {
        env!("TARGET_PLATFORM")
    }

    pub fn build_profile() -> &'static str {
        env!("BUILD_PROFILE")
    }

    /// Short form for `--version`
    pub const DISPLAY_VERSION: &'static str = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("BUILD_TIMESTAMP"),
        " ",
        env!("GIT_HASH_SHORT"),
        ")"
    );

    pub fn display_version() -> &'static str {
        Self::DISPLAY_VERSION
    }

    /// Multi-line form for the startup log banner
    pub fn detailed_info() -> String {
        format!(
            "Version: {}\nBuild: {}\nCommit: {}\nPlatform: {}\nProfile: {}",
            Self::version(),
            Self::build_timestamp(),
            Self::git_hash(),
            Self::target_platform(),
            Self::build_profile()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hash_is_prefix() {
        assert!(BuildInfo::git_hash().starts_with(BuildInfo::git_hash_short()));
        assert!(BuildInfo::display_version().starts_with(BuildInfo::version()));
        assert!(BuildInfo::display_version().contains(BuildInfo::build_timestamp()));
        assert!(BuildInfo::display_version().ends_with(&format!("{})", BuildInfo::git_hash_short())));
    }
}
