//! The [`Structcli`] engine and its builder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{ArgMatches, Command};

use crate::cli;
use crate::context::Context;
use crate::debug::DebugReport;
use crate::define::{self, Plan};
use crate::env::{self, EnvSnapshot};
use crate::error::StructcliError;
use crate::file::{self, ConfigSource};
use crate::registry;
use crate::resolve::{self, ResolveInput};
use crate::schema::Options;
use crate::types::{DebugMode, Outcome, Scope, SearchPath};

/// Entry point for building a structcli engine.
pub struct Structcli {
    app_name: String,
    env: EnvSnapshot,
    search_paths: Vec<SearchPath>,
    file_name: String,
    config: Option<ConfigSource>,
    debug: Option<DebugMode>,
}

/// Builder for a [`Structcli`] engine.
///
/// Only [`app_name()`](Self::app_name) is required. It derives the defaults:
/// - `file_name` → `"{app_name}.toml"`
/// - `search_paths` → `[SearchPath::Platform]`
/// - env variables → `{APP_NAME}_{SCOPE}_{FLAG}`
#[derive(Debug, Default)]
pub struct StructcliBuilder {
    app_name: Option<String>,
    env: Option<EnvSnapshot>,
    search_paths: Option<Vec<SearchPath>>,
    file_name: Option<String>,
    config: Option<ConfigSource>,
    debug: Option<DebugMode>,
}

impl Structcli {
    pub fn builder() -> StructcliBuilder {
        StructcliBuilder::default()
    }
}

impl StructcliBuilder {
    pub fn app_name(mut self, name: &str) -> Self {
        self.app_name = Some(name.to_string());
        self
    }

    /// Use these variables instead of the process environment.
    pub fn env_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(EnvSnapshot::from_vars(
            vars.into_iter().map(|(k, v)| (k.into(), v.into())),
        ));
        self
    }

    /// Replace the default search paths entirely.
    ///
    /// Paths are listed in **priority-ascending** order: the last entry that
    /// holds a config file wins.
    pub fn search_paths(mut self, paths: Vec<SearchPath>) -> Self {
        self.search_paths = Some(paths);
        self
    }

    /// Append a search path without replacing the defaults.
    pub fn add_search_path(mut self, path: SearchPath) -> Self {
        self.search_paths
            .get_or_insert_with(|| vec![SearchPath::Platform])
            .push(path);
        self
    }

    /// Override the config file name (default: `"{app_name}.toml"`).
    pub fn file_name(mut self, name: &str) -> Self {
        self.file_name = Some(name.to_string());
        self
    }

    /// Use an already loaded config source. [`Structcli::load_config`] keeps
    /// it unless an explicit path is passed.
    pub fn config_source(mut self, source: ConfigSource) -> Self {
        self.config = Some(source);
        self
    }

    /// Force the debug mode, ignoring `--debug-options` and
    /// `{APP}_DEBUG_OPTIONS`.
    pub fn debug_options(mut self, mode: DebugMode) -> Self {
        self.debug = Some(mode);
        self
    }

    pub fn build(self) -> Result<Structcli, StructcliError> {
        let app_name = self.app_name.ok_or(StructcliError::AppNameRequired)?;
        let file_name = self
            .file_name
            .unwrap_or_else(|| format!("{app_name}.toml"));
        Ok(Structcli {
            env: self.env.unwrap_or_else(EnvSnapshot::from_process),
            search_paths: self.search_paths.unwrap_or_else(|| vec![SearchPath::Platform]),
            file_name,
            config: self.config,
            debug: self.debug,
            app_name,
        })
    }
}

impl Structcli {
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn env(&self) -> &EnvSnapshot {
        &self.env
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn search_paths(&self) -> &[SearchPath] {
        &self.search_paths
    }

    pub fn config(&self) -> Option<&ConfigSource> {
        self.config.as_ref()
    }

    /// Load the config file: `explicit` > `{APP}_CONFIG` > search paths.
    ///
    /// Without an explicit path, a source passed to
    /// [`config_source()`](StructcliBuilder::config_source) is kept as is.
    pub fn load_config(
        &mut self,
        explicit: Option<&Path>,
    ) -> Result<Option<&ConfigSource>, StructcliError> {
        if explicit.is_some() || self.config.is_none() {
            self.config = file::discover(
                explicit,
                &self.env,
                &self.app_name,
                &self.search_paths,
                &self.file_name,
            )?;
        }
        Ok(self.config.as_ref())
    }

    /// [`load_config`](Self::load_config) with the `--config` value of `matches`.
    pub fn load_config_from(
        &mut self,
        matches: &ArgMatches,
    ) -> Result<Option<&ConfigSource>, StructcliError> {
        let explicit: Option<PathBuf> = cli::config_path(matches);
        self.load_config(explicit.as_deref())
    }

    /// Register `T`'s flags on `cmd`, showing `T::default()` values as
    /// defaults.
    pub fn define<T: Options>(&self, scope: &Scope, cmd: Command) -> Result<Command, StructcliError> {
        self.define_with(scope, cmd, &T::default())
    }

    /// Register `T`'s flags on `cmd`, showing the values of `current` as
    /// defaults.
    pub fn define_with<T: Options>(
        &self,
        scope: &Scope,
        cmd: Command,
        current: &T,
    ) -> Result<Command, StructcliError> {
        let (cmd, plan) = define::define(&self.app_name, scope, cmd, current)?;
        tracing::debug!(
            app = %self.app_name,
            scope = %scope,
            fields = plan.fields.len(),
            "defined options"
        );
        registry::store::<T>(plan);
        Ok(cmd)
    }

    /// The plan stored by [`define`](Self::define).
    pub fn plan<T: Options>(&self, scope: &Scope) -> Result<Arc<Plan>, StructcliError> {
        registry::get::<T>(&self.app_name, scope).ok_or_else(|| StructcliError::NotDefined {
            type_name: std::any::type_name::<T>().to_string(),
            command: scope.to_string(),
        })
    }

    /// Debug mode for one invocation: the builder setting, then
    /// `--debug-options`, then `{APP}_DEBUG_OPTIONS`.
    pub fn debug_mode(&self, matches: &ArgMatches) -> DebugMode {
        if let Some(mode) = self.debug {
            return mode;
        }
        match cli::debug_mode(matches) {
            DebugMode::Off => self
                .env
                .get(&env::debug_var(&self.app_name))
                .map(DebugMode::parse)
                .unwrap_or_default(),
            mode => mode,
        }
    }

    fn input<'a>(&'a self, matches: &'a ArgMatches) -> ResolveInput<'a> {
        ResolveInput {
            matches,
            env: &self.env,
            config: self.config.as_ref(),
        }
    }

    /// Populate `target` from `matches` (the matches of the command `T` was
    /// defined on), the environment and the loaded config.
    pub fn unmarshal<T: Options>(
        &self,
        scope: &Scope,
        matches: &ArgMatches,
        target: &mut T,
    ) -> Result<Outcome, StructcliError> {
        let plan = self.plan::<T>(scope)?;
        let debug = self.debug_mode(matches);
        resolve::unmarshal(&plan, &self.input(matches), target, debug, None)
    }

    /// Like [`unmarshal`](Self::unmarshal), and on success insert `target`
    /// into `ctx` if `T` propagates.
    pub fn unmarshal_in<T: Options>(
        &self,
        scope: &Scope,
        matches: &ArgMatches,
        target: &mut T,
        ctx: &mut Context,
    ) -> Result<Outcome, StructcliError> {
        let plan = self.plan::<T>(scope)?;
        let debug = self.debug_mode(matches);
        resolve::unmarshal(&plan, &self.input(matches), target, debug, Some(ctx))
    }

    /// Report how the fields of `target` bind to flags, env and config, and
    /// the values an unmarshal would produce. Unsatisfied required flags do
    /// not stop the report; a value that fails to decode does.
    pub fn debug<T: Options>(
        &self,
        scope: &Scope,
        matches: &ArgMatches,
        target: &T,
    ) -> Result<DebugReport, StructcliError> {
        let plan = self.plan::<T>(scope)?;
        let input = self.input(matches);
        let resolution = resolve::resolve_tree(&plan, &input, resolve::to_tree(target)?)?;
        Ok(DebugReport::new(
            &plan,
            &resolution.tree,
            &resolution.sources,
            &input,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::{DEFAULTS, VALUES};
    use crate::fixtures::test::{CheckedOptions, ServeOptions};
    use std::fs;
    use tempfile::TempDir;

    fn engine(app: &str) -> Structcli {
        Structcli::builder()
            .app_name(app)
            .env_vars(Vec::<(String, String)>::new())
            .search_paths(vec![])
            .build()
            .unwrap()
    }

    #[test]
    fn app_name_sets_defaults() {
        let s = Structcli::builder().app_name("myapp").build().unwrap();
        assert_eq!(s.file_name(), "myapp.toml");
        assert_eq!(s.search_paths(), [SearchPath::Platform]);
        assert!(s.config().is_none());
    }

    #[test]
    fn missing_app_name_errors() {
        let err = Structcli::builder().build().err().unwrap();
        assert!(matches!(err, StructcliError::AppNameRequired));
    }

    #[test]
    fn add_search_path_appends_to_defaults() {
        let s = Structcli::builder()
            .app_name("myapp")
            .add_search_path(SearchPath::Cwd)
            .build()
            .unwrap();
        assert_eq!(s.search_paths(), [SearchPath::Platform, SearchPath::Cwd]);
    }

    #[test]
    fn load_config_from_search_path() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b-search.toml"), "port = 3000\n").unwrap();
        let mut s = Structcli::builder()
            .app_name("b-search")
            .env_vars(Vec::<(String, String)>::new())
            .search_paths(vec![SearchPath::Path(dir.path().to_path_buf())])
            .build()
            .unwrap();
        let config = s.load_config(None).unwrap().unwrap();
        assert_eq!(config.path(), Some(dir.path().join("b-search.toml").as_path()));
    }

    #[test]
    fn config_env_var_beats_search_paths() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b-env.toml"), "port = 1\n").unwrap();
        let other = dir.path().join("other.toml");
        fs::write(&other, "port = 2\n").unwrap();
        let mut s = Structcli::builder()
            .app_name("b-env")
            .env_vars([("B_ENV_CONFIG", other.to_string_lossy().into_owned())])
            .search_paths(vec![SearchPath::Path(dir.path().to_path_buf())])
            .build()
            .unwrap();
        let config = s.load_config(None).unwrap().unwrap();
        assert_eq!(config.path(), Some(other.as_path()));
    }

    #[test]
    fn missing_explicit_file_is_io_error() {
        let mut s = engine("b-missing");
        let err = s
            .load_config(Some(Path::new("/nonexistent/b-missing.toml")))
            .unwrap_err();
        assert!(matches!(err, StructcliError::IoError { .. }));
    }

    #[test]
    fn preloaded_source_is_kept() {
        let source = ConfigSource::parse("port = 5\n", None).unwrap();
        let mut s = Structcli::builder()
            .app_name("b-preload")
            .env_vars(Vec::<(String, String)>::new())
            .search_paths(vec![])
            .config_source(source.clone())
            .build()
            .unwrap();
        assert_eq!(s.load_config(None).unwrap(), Some(&source));
    }

    #[test]
    fn unmarshal_before_define_is_not_defined() {
        let s = engine("b-undefined");
        let matches = Command::new("x").try_get_matches_from(["x"]).unwrap();
        let mut opts = ServeOptions::default();
        let err = s.unmarshal(&Scope::root(), &matches, &mut opts).unwrap_err();
        assert!(matches!(err, StructcliError::NotDefined { .. }));
        assert!(err.to_string().contains("<root>"));
    }

    #[test]
    fn define_then_unmarshal() {
        let s = engine("b-flow");
        let scope = Scope::command("serve");
        let cmd = s.define::<ServeOptions>(&scope, Command::new("serve")).unwrap();
        let matches = cmd.try_get_matches_from(["serve", "--port", "9000"]).unwrap();
        let mut opts = ServeOptions::default();
        assert_eq!(
            s.unmarshal(&scope, &matches, &mut opts).unwrap(),
            Outcome::Continue
        );
        assert_eq!(opts.port, 9000);
        assert_eq!(opts.host, "localhost");
    }

    #[test]
    fn unmarshal_in_propagates() {
        let s = engine("b-ctx");
        let scope = Scope::command("check");
        let cmd = s.define::<CheckedOptions>(&scope, Command::new("check")).unwrap();
        let matches = cmd
            .try_get_matches_from(["check", "--name", "x", "--port", "1"])
            .unwrap();
        let mut ctx = Context::new();
        let mut opts = CheckedOptions::default();
        s.unmarshal_in(&scope, &matches, &mut opts, &mut ctx).unwrap();
        assert_eq!(ctx.get::<CheckedOptions>().map(|o| o.name.as_str()), Some("x"));
    }

    #[test]
    fn debug_mode_precedence() {
        let matches_with = |args: &[&str]| {
            cli::CommonArgs::augment(Command::new("app"))
                .try_get_matches_from(args)
                .unwrap()
        };
        let env_exit = |b: StructcliBuilder| {
            b.app_name("b-debug")
                .env_vars([("B_DEBUG_DEBUG_OPTIONS", "exit")])
                .build()
                .unwrap()
        };

        let s = env_exit(Structcli::builder());
        assert_eq!(s.debug_mode(&matches_with(&["app"])), DebugMode::Exit);
        assert_eq!(
            s.debug_mode(&matches_with(&["app", "--debug-options"])),
            DebugMode::Show
        );

        let forced = env_exit(Structcli::builder().debug_options(DebugMode::Off));
        assert_eq!(
            forced.debug_mode(&matches_with(&["app", "--debug-options=exit"])),
            DebugMode::Off
        );
    }

    #[test]
    fn debug_exit_returns_sentinel() {
        let s = Structcli::builder()
            .app_name("b-exit")
            .env_vars(Vec::<(String, String)>::new())
            .debug_options(DebugMode::Exit)
            .build()
            .unwrap();
        let cmd = s.define::<ServeOptions>(&Scope::root(), Command::new("app")).unwrap();
        let matches = cmd.try_get_matches_from(["app"]).unwrap();
        let mut opts = ServeOptions::default();
        let outcome = s.unmarshal(&Scope::root(), &matches, &mut opts).unwrap();
        assert!(outcome.should_exit());
    }

    #[test]
    fn debug_report_round_trip() {
        let s = engine("b-report");
        let cmd = s.define::<ServeOptions>(&Scope::root(), Command::new("app")).unwrap();
        let matches = cmd.try_get_matches_from(["app"]).unwrap();
        let mut opts = ServeOptions::default();
        s.unmarshal(&Scope::root(), &matches, &mut opts).unwrap();

        let report = s.debug(&Scope::root(), &matches, &opts).unwrap();
        let defaults = report.section(DEFAULTS).unwrap();
        for row in &report.section(VALUES).unwrap().rows {
            assert_eq!(Some(&row.text), defaults.row(&row.field).map(|r| &r.text));
        }
    }

    #[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Default)]
    struct Listen {
        port: u16,
        host: String,
    }

    impl Options for Listen {
        fn schema() -> crate::schema::Schema {
            crate::schema::Schema::new()
                .field::<u16>("port", r#"flagdefault:"8080" flagrequired:"true""#)
                .field::<String>("host", r#"default:"localhost""#)
        }
    }

    #[test]
    fn debug_report_with_unsatisfied_required_flag() {
        let s = engine("b-required");
        let cmd = s.define::<Listen>(&Scope::root(), Command::new("app")).unwrap();
        let matches = cmd.try_get_matches_from(["app"]).unwrap();

        let report = s.debug(&Scope::root(), &matches, &Listen::default()).unwrap();
        assert_eq!(report.value_of("port"), Some("8080"));
        assert_eq!(report.value_of("host"), Some("localhost"));
        let defaults = report.section(DEFAULTS).unwrap();
        for row in &report.section(VALUES).unwrap().rows {
            assert_eq!(Some(&row.text), defaults.row(&row.field).map(|r| &r.text));
        }

        let mut opts = Listen::default();
        let err = s.unmarshal(&Scope::root(), &matches, &mut opts).unwrap_err();
        assert!(matches!(err, StructcliError::MissingRequired { .. }));
        assert_eq!(opts.port, 0);
    }
}
