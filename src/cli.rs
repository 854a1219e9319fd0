//! Process-level flags shared by every command.
//!
//! [`CommonArgs`] adds two global flags to the root command:
//!
//! - `--config <FILE>` picks an explicit config file, overriding
//!   `{APP}_CONFIG` and the search paths.
//! - `--debug-options[=exit]` prints the debug report of every unmarshal;
//!   with `=exit` unmarshal returns [`Outcome::Exit`](crate::Outcome::Exit)
//!   so the caller can skip the command body.
//!
//! Use it with clap's derive API through `#[command(flatten)]`, or on a
//! runtime-built command through [`CommonArgs::augment`].

use std::path::PathBuf;

use clap::{ArgMatches, Args, Command};

use crate::types::DebugMode;

pub const CONFIG_FLAG: &str = "config";
pub const DEBUG_FLAG: &str = "debug-options";

/// Global `--config` and `--debug-options` flags.
///
/// ```ignore
/// #[derive(Parser)]
/// struct Cli {
///     #[command(flatten)]
///     common: CommonArgs,
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct CommonArgs {
    /// Read options from this config file.
    #[arg(id = CONFIG_FLAG, long = CONFIG_FLAG, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Print how every option was resolved (`=exit` to stop afterwards).
    #[arg(
        id = DEBUG_FLAG,
        long = DEBUG_FLAG,
        value_name = "MODE",
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "show"
    )]
    pub debug_options: Option<String>,
}

impl CommonArgs {
    /// Register both flags on a runtime-built command.
    pub fn augment(cmd: Command) -> Command {
        <Self as Args>::augment_args(cmd)
    }

    /// Read both flags from `matches`. Missing flags read as unset, so this
    /// is safe on commands that were never augmented.
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config: config_path(matches),
            debug_options: matches
                .try_get_one::<String>(DEBUG_FLAG)
                .ok()
                .flatten()
                .cloned(),
        }
    }

    pub fn debug_mode(&self) -> DebugMode {
        self.debug_options
            .as_deref()
            .map(DebugMode::parse)
            .unwrap_or_default()
    }
}

/// The `--config` value, if the flag exists and was given.
pub fn config_path(matches: &ArgMatches) -> Option<PathBuf> {
    matches
        .try_get_one::<PathBuf>(CONFIG_FLAG)
        .ok()
        .flatten()
        .cloned()
}

/// The mode selected by `--debug-options`; `Off` when absent.
pub fn debug_mode(matches: &ArgMatches) -> DebugMode {
    CommonArgs::from_matches(matches).debug_mode()
}
