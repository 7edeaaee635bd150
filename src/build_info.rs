use serde::Serialize;

/// Short git SHA of the build, when build.rs could determine it.
pub fn git_sha() -> Option<&'static str> {
    option_env!("HORIZON_BUILD_GIT_SHA")
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<&'static str>,
}

pub fn current() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_sha: git_sha(),
    }
}
