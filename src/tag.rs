//! Struct-tag parsing and per-field tag normalization.
//!
//! Tags are written in the familiar `key:"value"` struct-tag syntax:
//!
//! ```text
//! flag:"port" flagshort:"p" flagdefault:"8080" flagenv:"true"
//! ```
//!
//! Pairs are separated by whitespace. Values are double-quoted and may escape
//! `"` and `\` with a backslash. [`Tags`] keeps the raw pairs in order;
//! [`FieldTags`] is the checked, typed view of one field's tags.

use crate::error::DefinitionError;

pub const FLAG: &str = "flag";
pub const FLAG_SHORT: &str = "flagshort";
pub const FLAG_DESCR: &str = "flagdescr";
pub const FLAG_DEFAULT: &str = "flagdefault";
pub const DEFAULT: &str = "default";
pub const FLAG_REQUIRED: &str = "flagrequired";
pub const FLAG_ENV: &str = "flagenv";
pub const FLAG_GROUP: &str = "flaggroup";
pub const FLAG_IGNORE: &str = "flagignore";
pub const FLAG_CUSTOM: &str = "flagcustom";
pub const FLAG_TYPE: &str = "flagtype";
pub const VALIDATE: &str = "validate";
pub const MOD: &str = "mod";

/// Ordered raw `key:"value"` pairs of one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    pairs: Vec<(String, String)>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a raw tag string. The error is a human-readable reason.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut pairs = Vec::new();
        let mut chars = raw.char_indices().peekable();

        loop {
            while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
            let Some(&(start, _)) = chars.peek() else {
                break;
            };

            let mut end = start;
            while let Some(&(i, c)) = chars.peek() {
                if c == ':' || c == '"' || c.is_whitespace() || c.is_control() {
                    break;
                }
                end = i + c.len_utf8();
                chars.next();
            }
            let key = &raw[start..end];
            if key.is_empty() {
                return Err(format!("expected a tag key at offset {start}"));
            }
            if chars.next_if(|(_, c)| *c == ':').is_none() {
                return Err(format!("missing ':' after key '{key}'"));
            }
            if chars.next_if(|(_, c)| *c == '"').is_none() {
                return Err(format!("value of '{key}' must be double-quoted"));
            }

            let mut value = String::new();
            let mut closed = false;
            while let Some((_, c)) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some((_, '"')) => value.push('"'),
                        Some((_, '\\')) => value.push('\\'),
                        Some((_, 'n')) => value.push('\n'),
                        Some((_, 't')) => value.push('\t'),
                        Some((_, other)) => {
                            return Err(format!("unknown escape '\\{other}' in '{key}'"));
                        }
                        None => break,
                    },
                    c => value.push(c),
                }
            }
            if !closed {
                return Err(format!("unterminated value for '{key}'"));
            }
            pairs.push((key.to_string(), value));

            if let Some(&(i, c)) = chars.peek()
                && !c.is_whitespace()
            {
                return Err(format!("expected whitespace after '{key}' at offset {i}"));
            }
        }

        Ok(Self { pairs })
    }

    /// Append a pair. Later duplicates are shadowed by earlier ones.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Tags as handed to the schema builder: a raw string parsed at walk time,
/// or pairs built in code.
#[derive(Debug, Clone)]
pub enum TagInput {
    Raw(&'static str),
    Parsed(Tags),
}

impl TagInput {
    pub fn resolve(&self, field: &str) -> Result<Tags, DefinitionError> {
        match self {
            TagInput::Raw(raw) => {
                Tags::parse(raw).map_err(|reason| DefinitionError::InvalidTagSyntax {
                    field: field.to_string(),
                    reason,
                })
            }
            TagInput::Parsed(tags) => Ok(tags.clone()),
        }
    }
}

impl From<&'static str> for TagInput {
    fn from(raw: &'static str) -> Self {
        TagInput::Raw(raw)
    }
}

impl From<Tags> for TagInput {
    fn from(tags: Tags) -> Self {
        TagInput::Parsed(tags)
    }
}

/// The canonical boolean spellings.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Checked view of one field's tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTags {
    pub flag: Option<String>,
    pub short: Option<char>,
    pub descr: Option<String>,
    pub default: Option<String>,
    pub required: bool,
    pub env: bool,
    pub group: Option<String>,
    pub ignore: bool,
    pub custom: bool,
    pub count: bool,
    pub validate: Option<String>,
    pub transform: Option<String>,
}

impl FieldTags {
    /// Normalize `tags` for the field at dotted path `field`.
    pub fn from_tags(field: &str, tags: &Tags) -> Result<Self, DefinitionError> {
        let flag_bool = |tag: &str| -> Result<bool, DefinitionError> {
            match tags.get(tag) {
                None => Ok(false),
                Some(value) => {
                    parse_bool(value).ok_or_else(|| DefinitionError::InvalidBooleanTag {
                        field: field.to_string(),
                        tag: tag.to_string(),
                        value: value.to_string(),
                    })
                }
            }
        };

        let required = flag_bool(FLAG_REQUIRED)?;
        let env = flag_bool(FLAG_ENV)?;
        let ignore = flag_bool(FLAG_IGNORE)?;
        let custom = flag_bool(FLAG_CUSTOM)?;

        let short = match tags.get(FLAG_SHORT) {
            None => None,
            Some(value) => {
                let mut chars = value.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => {
                        return Err(DefinitionError::InvalidShorthand {
                            field: field.to_string(),
                            value: value.to_string(),
                        });
                    }
                }
            }
        };

        let count = match tags.get(FLAG_TYPE) {
            None => false,
            Some("count") => true,
            Some(other) => {
                return Err(DefinitionError::InvalidFlagType {
                    field: field.to_string(),
                    value: other.to_string(),
                });
            }
        };

        if tags.contains(FLAG_DEFAULT) && tags.contains(DEFAULT) {
            return Err(DefinitionError::ConflictingTags {
                field: field.to_string(),
                tags: vec![FLAG_DEFAULT.to_string(), DEFAULT.to_string()],
            });
        }

        if ignore {
            let mut offending = Vec::new();
            if required {
                offending.push(FLAG_REQUIRED);
            }
            for tag in [FLAG, FLAG_ENV, FLAG_GROUP] {
                if tags.contains(tag) {
                    offending.push(tag);
                }
            }
            if !offending.is_empty() {
                let mut all = vec![FLAG_IGNORE.to_string()];
                all.extend(offending.into_iter().map(String::from));
                return Err(DefinitionError::ConflictingTags {
                    field: field.to_string(),
                    tags: all,
                });
            }
        }

        if custom && count {
            return Err(DefinitionError::ConflictingTags {
                field: field.to_string(),
                tags: vec![FLAG_CUSTOM.to_string(), FLAG_TYPE.to_string()],
            });
        }

        Ok(Self {
            flag: tags.get(FLAG).map(String::from),
            short,
            descr: tags.get(FLAG_DESCR).map(String::from),
            default: tags
                .get(FLAG_DEFAULT)
                .or_else(|| tags.get(DEFAULT))
                .map(String::from),
            required,
            env,
            group: tags.get(FLAG_GROUP).map(String::from),
            ignore,
            custom,
            count,
            validate: tags.get(VALIDATE).map(String::from),
            transform: tags.get(MOD).map(String::from),
        })
    }
}
