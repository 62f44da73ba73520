use std::path::PathBuf;

/// Errors shared by every vidcomp crate.
///
/// Only [`VideoError::FatalInit`] is meant to reach the host as a hard failure. The other
/// variants are caught inside the compositor and turned into a downgrade of the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum VideoError {
    // ---- Config ----
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json parse error at {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config at {}: {msg}", path.display())]
    InvalidConfig { path: PathBuf, msg: String },

    // ---- Pipeline ----
    /// A feature the stage needs was disabled by options or is missing from the hardware.
    #[error("{feature} not available for {purpose}")]
    CapabilityUnavailable {
        feature: &'static str,
        purpose: &'static str,
    },

    /// The context handed back no object (texture, framebuffer, program).
    #[error("backend object creation failed: {0}")]
    ResourceAllocation(String),

    /// An uploaded frame does not match the configured input geometry or format.
    #[error("frame rejected: {0}")]
    InputMismatch(String),

    /// Not even the plain RGBA blit pipeline could be built.
    #[error("fatal initialisation failure: {0}")]
    FatalInit(String),

    // ---- Backend ----
    #[error("vertex shader compile error: {0}")]
    VertexCompile(String),
    #[error("fragment shader compile error: {0}")]
    FragmentCompile(String),
    #[error("program link error: {0}")]
    Link(String),

    #[error("{0}")]
    Other(String),
}

impl VideoError {
    pub fn other<T: Into<String>>(s: T) -> Self {
        VideoError::Other(s.into())
    }

    pub fn alloc<T: Into<String>>(s: T) -> Self {
        VideoError::ResourceAllocation(s.into())
    }

    /// True for the errors that the compositor must not try to recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VideoError::FatalInit(_))
    }
}
