use thiserror::Error;

/// Primary error type for define resolution and permutation enumeration.
///
/// Every variant belongs to exactly one [`ErrorKind`]. Configuration and
/// resolution errors are fatal for the permutation that raised them and
/// never for the batch that contains it.
#[derive(Error, Debug)]
pub enum PermError {
    // === Configuration Errors ===
    /// A define's default expression re-entered itself while resolving.
    #[error("cyclic define dependency: {chain}")]
    CyclicDefine { chain: String },

    /// A name that is neither an implicit define nor declared by the suite.
    #[error("unknown define: {name}")]
    UnknownDefine { name: String },

    /// A define with no provider at any layer (no override, case value,
    /// geometry value or implicit default).
    #[error("define {name} has no value in this permutation")]
    UndefinedDefine { name: String },

    /// Combined permutation index outside `[0, count)`.
    #[error("permutation index {index} out of range (count {count})")]
    PermutationOutOfRange { index: usize, count: usize },

    /// `n!` does not fit in a `usize`.
    #[error("factorial of {n} overflows usize")]
    FactorialOverflow { n: usize },

    /// The product of all swept dimensions does not fit in a `usize`.
    #[error("permutation space of {case} overflows usize")]
    PermutationSpaceOverflow { case: String },

    /// A define override that could not be parsed.
    #[error("invalid define override '{spec}': {detail}")]
    InvalidOverride { spec: String, detail: String },

    /// Geometry name not present in the preset table.
    #[error("unknown geometry: {name}")]
    UnknownGeometry { name: String },

    /// The same define declared twice in one scope.
    #[error("define {name} declared more than once")]
    DuplicateDefine { name: String },

    /// A resolved configuration that the storage engine would reject.
    #[error("invalid configuration: {field}: {detail}")]
    InvalidConfig { field: String, detail: String },

    // === Resolution Errors ===
    /// A define's value callback could not produce a value.
    #[error("define {name} failed to resolve: {detail}")]
    DefineCallback { name: String, detail: String },

    // === I/O Errors ===
    /// File I/O error (reports, CLI inputs).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Internal Errors ===
    /// Internal logic error (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`PermError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad declarations, overrides, or indices. Detected before or during resolution.
    Configuration,
    /// A value callback failed for this permutation.
    Resolution,
    /// File or stream I/O at the edges.
    Io,
    /// Engine bug.
    Internal,
}

impl PermError {
    /// Map this error to its [`ErrorKind`].
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::CyclicDefine { .. }
            | Self::UnknownDefine { .. }
            | Self::UndefinedDefine { .. }
            | Self::PermutationOutOfRange { .. }
            | Self::FactorialOverflow { .. }
            | Self::PermutationSpaceOverflow { .. }
            | Self::InvalidOverride { .. }
            | Self::UnknownGeometry { .. }
            | Self::DuplicateDefine { .. }
            | Self::InvalidConfig { .. } => ErrorKind::Configuration,
            Self::DefineCallback { .. } => ErrorKind::Resolution,
            Self::Io(_) => ErrorKind::Io,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error aborts only the permutation that raised it.
    ///
    /// The runner records such errors against the permutation and moves on
    /// to the next one.
    pub const fn is_fatal_for_permutation(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration | ErrorKind::Resolution)
    }

    /// Human-friendly suggestion for fixing this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::CyclicDefine { .. } => {
                Some("Override one of the defines in the cycle with a concrete value")
            }
            Self::PermutationOutOfRange { .. } => {
                Some("Reduce the index modulo the permutation count before resolving")
            }
            Self::FactorialOverflow { .. } => Some("Use smaller arrays for exhaustive orderings"),
            Self::UnknownGeometry { .. } => {
                Some("Pick one of: default, eeprom, emmc, nor, nand")
            }
            Self::InvalidOverride { .. } => {
                Some("Use NAME=VALUE[,VALUE...] or NAME=range(start,stop,step)")
            }
            _ => None,
        }
    }

    /// Get the process exit code for this error (for CLI use).
    pub const fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::Resolution => 3,
            ErrorKind::Io => 4,
            ErrorKind::Internal => 70,
        }
    }

    /// Create a define callback error.
    pub fn callback(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::DefineCallback {
            name: name.into(),
            detail: detail.into(),
        }
    }

    /// Create an invalid override error.
    pub fn invalid_override(spec: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidOverride {
            spec: spec.into(),
            detail: detail.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using `PermError`.
pub type Result<T> = std::result::Result<T, PermError>;
