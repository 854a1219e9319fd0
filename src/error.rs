//! Error taxonomy.
//!
//! Two families reach callers:
//!
//! - [`DefinitionError`]: the options schema itself is malformed. Raised
//!   while flags are being defined and always fatal to command construction.
//!   Every variant carries the offending field path and can be matched
//!   programmatically through [`DefinitionError::kind`].
//! - [`StructcliError`]: everything else: decode failures, missing required
//!   values, aggregated validation failures, unreadable or malformed config
//!   files. Definition errors are wrapped in it by the public entry points.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by user hooks (decode, transform, validate).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Discriminator shared by all [`DefinitionError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidTagSyntax,
    InvalidBooleanTag,
    InvalidShorthand,
    InvalidFlagType,
    MissingHook,
    InvalidHookSignature,
    InvalidFlagName,
    ConflictingTags,
    UnsupportedType,
    DuplicateFlag,
    DuplicateShorthand,
    DuplicateEnv,
}

/// A malformed options schema, detected while defining flags.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum DefinitionError {
    #[error("Malformed tag on field '{field}': {reason}")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::invalid_tag_syntax)))]
    InvalidTagSyntax { field: String, reason: String },

    #[error("Invalid boolean value {value:?} for tag '{tag}' on field '{field}'")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(structcli::invalid_boolean_tag),
            help("use true/false (or 1/0, t/f, TRUE/FALSE, True/False)")
        )
    )]
    InvalidBooleanTag {
        field: String,
        tag: String,
        value: String,
    },

    #[error("Invalid shorthand {value:?} on field '{field}': must be exactly one character")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::invalid_shorthand)))]
    InvalidShorthand { field: String, value: String },

    #[error("Invalid flagtype {value:?} on field '{field}' (supported: count)")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::invalid_flag_type)))]
    InvalidFlagType { field: String, value: String },

    #[error("Field '{field}' is marked flagcustom but has no '{hook}' hook")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(structcli::missing_hook),
            help("register it in Options::hooks for the struct that owns the field")
        )
    )]
    MissingHook { field: String, hook: String },

    #[error("Hook '{hook}' for field '{field}' has the wrong shape: {reason}")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::invalid_hook_signature)))]
    InvalidHookSignature {
        field: String,
        hook: String,
        reason: String,
    },

    #[error("Invalid flag name {name:?} for field '{field}': use letters, digits, '-' and '.'")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::invalid_flag_name)))]
    InvalidFlagName { field: String, name: String },

    #[error("Conflicting tags on field '{field}': {}", tags.join(", "))]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::conflicting_tags)))]
    ConflictingTags { field: String, tags: Vec<String> },

    #[error("Field '{field}' has unsupported type `{type_name}`")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(structcli::unsupported_type),
            help("mark the field flagcustom:\"true\" and register define/decode hooks")
        )
    )]
    UnsupportedType { field: String, type_name: String },

    #[error("Flag '--{flag}' of field '{field}' is already defined by '{existing}'")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::duplicate_flag)))]
    DuplicateFlag {
        flag: String,
        field: String,
        existing: String,
    },

    #[error("Shorthand '-{short}' of field '{field}' is already used by '{existing}'")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::duplicate_shorthand)))]
    DuplicateShorthand {
        short: char,
        field: String,
        existing: String,
    },

    #[error("Env variable '{var}' of field '{field}' is already bound to '{existing}'")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(structcli::duplicate_env),
            help("rename one of the flags so they differ in more than punctuation")
        )
    )]
    DuplicateEnv {
        var: String,
        field: String,
        existing: String,
    },
}

impl DefinitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTagSyntax { .. } => ErrorKind::InvalidTagSyntax,
            Self::InvalidBooleanTag { .. } => ErrorKind::InvalidBooleanTag,
            Self::InvalidShorthand { .. } => ErrorKind::InvalidShorthand,
            Self::InvalidFlagType { .. } => ErrorKind::InvalidFlagType,
            Self::MissingHook { .. } => ErrorKind::MissingHook,
            Self::InvalidHookSignature { .. } => ErrorKind::InvalidHookSignature,
            Self::InvalidFlagName { .. } => ErrorKind::InvalidFlagName,
            Self::ConflictingTags { .. } => ErrorKind::ConflictingTags,
            Self::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            Self::DuplicateFlag { .. } => ErrorKind::DuplicateFlag,
            Self::DuplicateShorthand { .. } => ErrorKind::DuplicateShorthand,
            Self::DuplicateEnv { .. } => ErrorKind::DuplicateEnv,
        }
    }

    /// Dotted path of the field that triggered the error.
    pub fn field(&self) -> &str {
        match self {
            Self::InvalidTagSyntax { field, .. }
            | Self::InvalidBooleanTag { field, .. }
            | Self::InvalidShorthand { field, .. }
            | Self::InvalidFlagType { field, .. }
            | Self::MissingHook { field, .. }
            | Self::InvalidHookSignature { field, .. }
            | Self::InvalidFlagName { field, .. }
            | Self::ConflictingTags { field, .. }
            | Self::UnsupportedType { field, .. }
            | Self::DuplicateFlag { field, .. }
            | Self::DuplicateShorthand { field, .. }
            | Self::DuplicateEnv { field, .. } => field,
        }
    }
}

/// Every failure reported by a target's `validate` hook, gathered in one pass.
///
/// The underlying errors are shared, not owned: [`errors`](Self::errors)
/// hands out a fresh `Vec`, so callers can reorder or drop entries without
/// touching the aggregate.
#[derive(Debug, Clone)]
pub struct ValidationError {
    context: Option<String>,
    errors: Vec<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ValidationError {
    pub fn new(context: Option<String>, errors: Vec<BoxError>) -> Self {
        Self {
            context,
            errors: errors.into_iter().map(Arc::from).collect(),
        }
    }

    /// Name of the command whose options failed validation, if known.
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn errors(&self) -> Vec<Arc<dyn std::error::Error + Send + Sync>> {
        self.errors.clone()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(name) => write!(f, "invalid options for '{name}'")?,
            None => write!(f, "invalid options")?,
        }
        for err in &self.errors {
            write!(f, "\n  - {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(feature = "rich-errors")]
impl miette::Diagnostic for ValidationError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new("structcli::validation"))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!("{} violation(s) reported", self.errors.len())))
    }
}

#[derive(Debug, Error)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum StructcliError {
    #[error(transparent)]
    #[cfg_attr(feature = "rich-errors", diagnostic(transparent))]
    Definition(#[from] DefinitionError),

    #[error("Invalid value {value:?} for '{field}' (--{flag}): expected {expected}: {reason}")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::decode)))]
    Decode {
        field: String,
        flag: String,
        value: String,
        expected: String,
        reason: String,
    },

    #[error("Missing required value for {}", flags.iter().map(|f| format!("--{f}")).collect::<Vec<_>>().join(", "))]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(structcli::missing_required),
            help("pass the flag, set its environment variable, or add it to the config file")
        )
    )]
    MissingRequired { flags: Vec<String> },

    #[error(transparent)]
    #[cfg_attr(feature = "rich-errors", diagnostic(transparent))]
    Validation(#[from] ValidationError),

    #[error("Transform failed: {0}")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::transform)))]
    Transform(BoxError),

    #[error("Failed to parse {path}: {source}")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::parse)))]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to read {path}: {source}")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::io)))]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No flags defined for `{type_name}` in command '{command}'; call define() first")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::not_defined)))]
    NotDefined { type_name: String, command: String },

    #[error("App name is required; call .app_name() on the builder")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::app_name_required)))]
    AppNameRequired,

    #[error("Cannot write '{path}' into the options value: {reason}")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(structcli::tree)))]
    Tree { path: String, reason: String },
}

impl StructcliError {
    /// The definition-time discriminator, when this wraps a [`DefinitionError`].
    pub fn definition_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Definition(err) => Some(err.kind()),
            _ => None,
        }
    }
}
