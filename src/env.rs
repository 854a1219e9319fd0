use std::collections::HashMap;

use heck::ToShoutySnakeCase;

use crate::types::Scope;

/// Environment variable name for a flag: `{APP}_{SCOPE...}_{FLAG}`.
///
/// Every part is upper-cased and any run of non-alphanumeric characters
/// becomes a single `_`, so `("app", ["srv"], "database.maxconns")` gives
/// `APP_SRV_DATABASE_MAXCONNS`.
pub fn env_name(app_name: &str, scope: &Scope, flag: &str) -> String {
    std::iter::once(app_name)
        .chain(scope.segments().iter().map(String::as_str))
        .chain(std::iter::once(flag))
        .map(|part| part.to_shouty_snake_case())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// `{APP}_CONFIG`: explicit config file path.
pub fn config_var(app_name: &str) -> String {
    format!("{}_CONFIG", app_name.to_shouty_snake_case())
}

/// `{APP}_DEBUG_OPTIONS`: enables debug output (`true` or `exit`).
pub fn debug_var(app_name: &str) -> String {
    format!("{}_DEBUG_OPTIONS", app_name.to_shouty_snake_case())
}

/// A snapshot of the environment.
///
/// Built from an iterator so tests can pass synthetic data instead of
/// `std::env::vars()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            vars: vars.into_iter().collect(),
        }
    }

    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Value of `name`. Empty values count as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn root_scope_name() {
        assert_eq!(env_name("myapp", &Scope::root(), "port"), "MYAPP_PORT");
    }

    #[test]
    fn scoped_nested_name() {
        assert_eq!(
            env_name("app", &Scope::command("srv"), "database.maxconns"),
            "APP_SRV_DATABASE_MAXCONNS"
        );
    }

    #[test]
    fn separators_become_underscores() {
        assert_eq!(
            env_name("my-app", &Scope::command("srv").child("add"), "db-url"),
            "MY_APP_SRV_ADD_DB_URL"
        );
    }

    #[test]
    fn special_vars() {
        assert_eq!(config_var("myapp"), "MYAPP_CONFIG");
        assert_eq!(debug_var("my-app"), "MY_APP_DEBUG_OPTIONS");
    }

    #[test]
    fn empty_value_is_unset() {
        let env = EnvSnapshot::from_vars(vars(&[("A", ""), ("B", "1")]));
        assert_eq!(env.get("A"), None);
        assert_eq!(env.get("B"), Some("1"));
        assert_eq!(env.get("C"), None);
        assert_eq!(env.len(), 2);
    }
}
