//! Debug introspection of a resolved options struct.
//!
//! A [`DebugReport`] walks the plan of one options type and shows, per field,
//! where its value may come from and where it came from:
//!
//! ```text
//! Options for serve (myapp::ServeOptions)
//!
//! Aliases:
//!   port                  --port, -p
//! Flags:
//!   port                  --port=9000
//! Env:
//!   port                  MYAPP_SERVE_PORT=(unset)
//! Config: /home/me/.config/myapp/myapp.toml
//!   port                  serve.port, port -> port = 3000
//! Defaults:
//!   port                  8080
//! Values:
//!   port                  9000  (flag)
//! ```
//!
//! Defaults and values are rendered through the same formatter, so a struct
//! resolved with no overrides shows identical text in both sections.

use std::fmt;

use serde_json::Value;

use crate::decode;
use crate::define::{Plan, PlannedField};
use crate::file::ConfigSource;
use crate::hooks::RawValue;
use crate::resolve::{self, ResolveInput, Source};
use crate::tree;

pub const ALIASES: &str = "Aliases";
pub const FLAGS: &str = "Flags";
pub const ENV: &str = "Env";
pub const CONFIG: &str = "Config";
pub const DEFAULTS: &str = "Defaults";
pub const VALUES: &str = "Values";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Dotted field path.
    pub field: String,
    pub text: String,
    /// Trailing annotation, e.g. the winning source in `Values`.
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: &'static str,
    /// Extra header text, e.g. the config file path.
    pub detail: Option<String>,
    pub rows: Vec<Row>,
}

impl Section {
    fn new(title: &'static str) -> Self {
        Self {
            title,
            detail: None,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, field: &str, text: String) {
        self.rows.push(Row {
            field: field.to_string(),
            text,
            note: None,
        });
    }

    pub fn row(&self, field: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.field == field)
    }
}

/// Rendered binding of one options type in one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugReport {
    pub command: String,
    pub type_name: &'static str,
    pub sections: Vec<Section>,
}

impl DebugReport {
    /// Build the report for `values`, the serialized target.
    ///
    /// `sources` is what resolution reported per field; fields missing from
    /// it are shown as unchanged.
    pub fn new(
        plan: &Plan,
        values: &Value,
        sources: &[(String, Source)],
        input: &ResolveInput<'_>,
    ) -> Self {
        let mut aliases = Section::new(ALIASES);
        let mut flags = Section::new(FLAGS);
        let mut env = Section::new(ENV);
        let mut config = Section::new(CONFIG);
        let mut defaults = Section::new(DEFAULTS);
        let mut current = Section::new(VALUES);

        config.detail = Some(match input.config.and_then(ConfigSource::path) {
            Some(path) => path.display().to_string(),
            None if input.config.is_some() => "<inline>".to_string(),
            None => "<no config file>".to_string(),
        });

        for field in &plan.fields {
            let d = &field.descriptor;
            let name = d.dotted();

            let mut alias = format!("--{}", d.flag);
            if let Some(short) = d.short {
                alias.push_str(&format!(", -{short}"));
            }
            aliases.push(&name, alias);

            let given = match resolve::from_command_line(input.matches, d) {
                Some(RawValue::Count(n)) => format!("--{} x{n}", d.flag),
                Some(raw) => format!("--{}={raw}", d.flag),
                None => "(not given)".to_string(),
            };
            flags.push(&name, given);

            env.push(&name, env_row(field, input));
            config.push(&name, config_row(plan, field, input));
            defaults.push(&name, default_text(field));

            let value = tree::get_path(values, &d.path).unwrap_or(&Value::Null);
            let source = sources
                .iter()
                .find(|(path, _)| *path == name)
                .map(|(_, s)| s.clone())
                .unwrap_or(Source::Unchanged);
            current.rows.push(Row {
                field: name,
                text: decode::display(d.kind, value),
                note: Some(source.to_string()),
            });
        }

        Self {
            command: plan.context_name(),
            type_name: plan.type_name,
            sections: vec![aliases, flags, env, config, defaults, current],
        }
    }

    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }

    /// Text of `field` in section `title`.
    pub fn text(&self, title: &str, field: &str) -> Option<&str> {
        self.section(title)?.row(field).map(|r| r.text.as_str())
    }

    /// Rendered resolved value of `field`.
    pub fn value_of(&self, field: &str) -> Option<&str> {
        self.text(VALUES, field)
    }
}

fn env_row(field: &PlannedField, input: &ResolveInput<'_>) -> String {
    match &field.annotations.env {
        Some(var) => match input.env.get(var) {
            Some(value) => format!("{var}={value}"),
            None => format!("{var}=(unset)"),
        },
        None => format!("{} (not bound)", field.env_name),
    }
}

fn config_row(plan: &Plan, field: &PlannedField, input: &ResolveInput<'_>) -> String {
    let d = &field.descriptor;
    let keys = ConfigSource::candidate_keys(&plan.scope, &d.flag, &d.path).join(", ");
    let hit = input
        .config
        .and_then(|c| c.lookup(&plan.scope, &d.flag, &d.path));
    match hit {
        Some(hit) => format!("{keys} -> {} = {}", hit.key, hit.value),
        None => keys,
    }
}

/// The tag default as it decodes, or the value held at definition time.
fn default_text(field: &PlannedField) -> String {
    let d = &field.descriptor;
    match &d.default {
        Some(literal) => d
            .decoder
            .decode(&RawValue::Text(literal.clone()))
            .map(|v| decode::display(d.kind, &v))
            .unwrap_or_else(|_| literal.clone()),
        None => decode::display(d.kind, &field.initial),
    }
}

impl fmt::Display for DebugReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Options for {} ({})", self.command, self.type_name)?;
        let width = self
            .sections
            .iter()
            .flat_map(|s| s.rows.iter())
            .map(|r| r.field.len())
            .max()
            .unwrap_or(0)
            .max(20);

        for section in &self.sections {
            writeln!(f)?;
            match &section.detail {
                Some(detail) => writeln!(f, "{}: {detail}", section.title)?,
                None => writeln!(f, "{}:", section.title)?,
            }
            for row in &section.rows {
                write!(f, "  {:<width$}  {}", row.field, row.text)?;
                match &row.note {
                    Some(note) => writeln!(f, "  ({note})")?,
                    None => writeln!(f)?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define::define;
    use crate::env::EnvSnapshot;
    use crate::fixtures::test::ServeOptions;
    use crate::resolve::resolve_tree;
    use crate::types::Scope;
    use clap::Command;
    use std::path::PathBuf;

    fn report(args: &[&str], env: EnvSnapshot, config: Option<ConfigSource>) -> DebugReport {
        let scope = Scope::command("serve");
        let (cmd, plan) = define("app", &scope, Command::new("serve"), &ServeOptions::default())
            .unwrap();
        let matches = cmd
            .try_get_matches_from(std::iter::once("serve").chain(args.iter().copied()))
            .unwrap();
        let input = ResolveInput {
            matches: &matches,
            env: &env,
            config: config.as_ref(),
        };
        let tree = serde_json::to_value(ServeOptions::default()).unwrap();
        let resolution = resolve_tree(&plan, &input, tree).unwrap();
        DebugReport::new(&plan, &resolution.tree, &resolution.sources, &input)
    }

    #[test]
    fn values_match_defaults_without_overrides() {
        let r = report(&[], EnvSnapshot::default(), None);
        let defaults = r.section(DEFAULTS).unwrap();
        let values = r.section(VALUES).unwrap();
        assert_eq!(defaults.rows.len(), values.rows.len());
        for (d, v) in defaults.rows.iter().zip(&values.rows) {
            assert_eq!(d.field, v.field);
            assert_eq!(d.text, v.text, "field {}", d.field);
        }
        assert_eq!(r.value_of("port"), Some("8080"));
        assert_eq!(r.value_of("cache.ttl"), Some("5m0s"));
    }

    #[test]
    fn sections_in_order() {
        let r = report(&[], EnvSnapshot::default(), None);
        let titles: Vec<_> = r.sections.iter().map(|s| s.title).collect();
        assert_eq!(titles, [ALIASES, FLAGS, ENV, CONFIG, DEFAULTS, VALUES]);
    }

    #[test]
    fn aliases_and_flags() {
        let r = report(&["-p", "9000", "-vv"], EnvSnapshot::default(), None);
        assert_eq!(r.text(ALIASES, "port"), Some("--port, -p"));
        assert_eq!(r.text(ALIASES, "database.url"), Some("--db-url"));
        assert_eq!(r.text(FLAGS, "port"), Some("--port=9000"));
        assert_eq!(r.text(FLAGS, "verbose"), Some("--verbose x2"));
        assert_eq!(r.text(FLAGS, "host"), Some("(not given)"));
        let values = r.section(VALUES).unwrap();
        assert_eq!(values.row("port").unwrap().note.as_deref(), Some("flag"));
    }

    #[test]
    fn env_rows() {
        let env = EnvSnapshot::from_vars([("APP_SERVE_HOST".to_string(), "h".to_string())]);
        let r = report(&[], env, None);
        assert_eq!(r.text(ENV, "host"), Some("APP_SERVE_HOST=h"));
        assert_eq!(r.text(ENV, "port"), Some("APP_SERVE_PORT=(unset)"));
        assert_eq!(r.text(ENV, "timeout"), Some("APP_SERVE_TIMEOUT (not bound)"));
    }

    #[test]
    fn config_rows_list_keys_in_priority_order() {
        let config = ConfigSource::parse(
            "[database]\nmaxconns = 4\n",
            Some(PathBuf::from("app.toml")),
        )
        .unwrap();
        let r = report(&[], EnvSnapshot::default(), Some(config));
        assert_eq!(r.section(CONFIG).unwrap().detail.as_deref(), Some("app.toml"));
        assert_eq!(
            r.text(CONFIG, "database.url"),
            Some("serve.db-url, serve.database.url, db-url, database.url")
        );
        assert_eq!(
            r.text(CONFIG, "database.maxconns"),
            Some("serve.database.maxconns, database.maxconns -> database.maxconns = 4")
        );
        assert_eq!(r.value_of("database.maxconns"), Some("4"));
    }

    #[test]
    fn display_has_every_section() {
        let text = report(&[], EnvSnapshot::default(), None).to_string();
        assert!(text.starts_with("Options for serve ("));
        for title in [ALIASES, FLAGS, ENV, CONFIG, DEFAULTS, VALUES] {
            assert!(text.contains(&format!("\n{title}:")), "missing {title}");
        }
        assert!(text.contains("(default)"));
    }
}
