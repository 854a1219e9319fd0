//! Config file discovery, loading and key lookup.
//!
//! # Discovery
//!
//! [`discover`] picks at most one file, first match wins:
//!
//! 1. the explicit path (from `--config`), which must exist;
//! 2. the path named by `{APP}_CONFIG`, which must exist;
//! 3. `{dir}/{file_name}` for each [`SearchPath`], searched from the
//!    highest-priority (last) entry backward. Missing files are skipped.
//!
//! Only actual I/O errors (permissions, etc.) and parse errors are propagated.
//!
//! # Lookup
//!
//! A [`ConfigSource`] is scoped by command path: `[srv]` holds the keys of
//! the `srv` subcommand. For each field, the scope's section is searched
//! before the root table, and within each table the keys are tried in order:
//!
//! - the flattened flag name as a literal key (`db-url = ...`)
//! - the dotted field path as a literal key (`"database.url" = ...`)
//! - nested tables along the field path (`[database] url = ...`)

use std::path::{Path, PathBuf};

use toml::{Table, Value};

use crate::env::{self, EnvSnapshot};
use crate::error::StructcliError;
use crate::types::{Scope, SearchPath};

/// One parsed config file. Never modified after loading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSource {
    path: Option<PathBuf>,
    root: Table,
}

/// A key that matched during lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigHit<'a> {
    /// The key as a user would write it, including the scope section.
    pub key: String,
    pub value: &'a Value,
}

impl ConfigSource {
    pub fn new(root: Table) -> Self {
        Self { path: None, root }
    }

    /// Parse TOML text. `path` is used for error messages and provenance.
    pub fn parse(content: &str, path: Option<PathBuf>) -> Result<Self, StructcliError> {
        let root: Table = toml::from_str(content).map_err(|e| StructcliError::ParseError {
            path: path.clone().unwrap_or_else(|| PathBuf::from("<inline>")),
            source: e,
        })?;
        Ok(Self { path, root })
    }

    /// Read and parse a file. A missing file is an error.
    pub fn load(path: &Path) -> Result<Self, StructcliError> {
        let content = std::fs::read_to_string(path).map_err(|e| StructcliError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, Some(path.to_path_buf()))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn root(&self) -> &Table {
        &self.root
    }

    /// The table for `scope`, if the file has one.
    pub fn section(&self, scope: &Scope) -> Option<&Table> {
        let mut table = &self.root;
        for segment in scope.segments() {
            match table.get(segment) {
                Some(Value::Table(t)) => table = t,
                _ => return None,
            }
        }
        Some(table)
    }

    /// Find the value for a field, trying the scope section first.
    pub fn lookup(&self, scope: &Scope, flag: &str, path: &[&str]) -> Option<ConfigHit<'_>> {
        let mut tables = Vec::with_capacity(2);
        if !scope.is_root()
            && let Some(section) = self.section(scope)
        {
            tables.push((section, scope.segments().join(".")));
        }
        tables.push((&self.root, String::new()));

        for (table, prefix) in tables {
            if let Some((key, value)) = lookup_in(table, flag, path) {
                let key = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                return Some(ConfigHit { key, value });
            }
        }
        None
    }

    /// Every key [`lookup`](Self::lookup) would try, in priority order.
    pub fn candidate_keys(scope: &Scope, flag: &str, path: &[&str]) -> Vec<String> {
        let dotted = path.join(".");
        let mut local = vec![flag.to_string()];
        if dotted != flag {
            local.push(dotted);
        }

        let mut keys = Vec::new();
        if !scope.is_root() {
            let prefix = scope.segments().join(".");
            keys.extend(local.iter().map(|k| format!("{prefix}.{k}")));
        }
        keys.extend(local);
        keys
    }
}

fn lookup_in<'a>(table: &'a Table, flag: &str, path: &[&str]) -> Option<(String, &'a Value)> {
    if let Some(value) = table.get(flag) {
        return Some((flag.to_string(), value));
    }

    let dotted = path.join(".");
    if let Some(value) = table.get(&dotted) {
        return Some((dotted, value));
    }

    let (last, parents) = path.split_last()?;
    let mut current = table;
    for segment in parents {
        match current.get(*segment) {
            Some(Value::Table(t)) => current = t,
            _ => return None,
        }
    }
    current.get(*last).map(|value| (dotted, value))
}

/// Resolve a [`SearchPath`] to a concrete directory.
///
/// `app_name` is used by `SearchPath::Platform` to construct the platform-specific
/// config directory (e.g. `~/.config/{app_name}/` on Linux).
///
/// Returns `None` if the path cannot be resolved (e.g. no home directory found).
pub fn resolve_search_path(sp: &SearchPath, app_name: &str) -> Option<PathBuf> {
    match sp {
        SearchPath::Platform => {
            let proj = directories::ProjectDirs::from("", "", app_name)?;
            Some(proj.config_dir().to_path_buf())
        }
        SearchPath::Home(subdir) => {
            let user = directories::UserDirs::new()?;
            Some(user.home_dir().join(subdir))
        }
        SearchPath::Cwd => std::env::current_dir().ok(),
        SearchPath::Path(p) => Some(p.clone()),
    }
}

/// Load the highest-priority config file found in `dirs`.
///
/// Searches from the end of the directory list (highest priority) backward.
fn load_first_match(dirs: &[PathBuf], file_name: &str) -> Result<Option<ConfigSource>, StructcliError> {
    for dir in dirs.iter().rev() {
        let file_path = dir.join(file_name);
        match std::fs::read_to_string(&file_path) {
            Ok(content) => {
                tracing::debug!(path = %file_path.display(), "found config file");
                return ConfigSource::parse(&content, Some(file_path)).map(Some);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                return Err(StructcliError::IoError {
                    path: file_path,
                    source: e,
                });
            }
        }
    }
    Ok(None)
}

/// Find and load the config file for `app_name`.
pub fn discover(
    explicit: Option<&Path>,
    env: &EnvSnapshot,
    app_name: &str,
    search_paths: &[SearchPath],
    file_name: &str,
) -> Result<Option<ConfigSource>, StructcliError> {
    if let Some(path) = explicit {
        tracing::debug!(path = %path.display(), "loading explicit config file");
        return ConfigSource::load(path).map(Some);
    }

    let var = env::config_var(app_name);
    if let Some(path) = env.get(&var) {
        tracing::debug!(var = %var, path = %path, "loading config file from environment");
        return ConfigSource::load(Path::new(path)).map(Some);
    }

    let dirs: Vec<PathBuf> = search_paths
        .iter()
        .filter_map(|sp| resolve_search_path(sp, app_name))
        .collect();
    load_first_match(&dirs, file_name)
}
