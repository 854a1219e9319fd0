//! # structcli demo application
//!
//! A sample CLI tool that shows how to wire
//! structcli into an application with subcommands. It exists to
//! demonstrate and manually verify the library, not to do anything useful.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example structcli_demo -- serve
//! cargo run --example structcli_demo -- echo -m hello --repeat 2
//! ```
//!
//! ## Features demonstrated
//!
//! | Feature              | How to exercise it                                                    |
//! |----------------------|-----------------------------------------------------------------------|
//! | Tag defaults         | `cargo run --example structcli_demo -- serve`                          |
//! | Flags                | `cargo run --example structcli_demo -- serve -p 9000 --timeout 5m`     |
//! | Nested flags         | `cargo run --example structcli_demo -- serve --database.max-conns 4`   |
//! | Env binding          | `STRUCTCLI_DEMO_SERVE_PORT=9999 cargo run --example structcli_demo -- serve` |
//! | Config file (cwd)    | Create `structcli-demo.toml` in cwd with a `[serve]` section           |
//! | Explicit config file | `cargo run --example structcli_demo -- --config demo.toml serve`       |
//! | Custom field         | `cargo run --example structcli_demo -- serve --color blue`             |
//! | Required flag        | `cargo run --example structcli_demo -- echo`                           |
//! | Debug report         | `cargo run --example structcli_demo -- --debug-options serve`          |
//! | Debug and stop       | `cargo run --example structcli_demo -- --debug-options=exit serve`     |
//! | Library logs         | `RUST_LOG=structcli=debug cargo run --example structcli_demo -- serve` |

mod options;

use std::process::ExitCode;

use clap::Command;
use structcli::{CommonArgs, Context, Scope, SearchPath, Structcli, StructcliError};
use tracing_subscriber::EnvFilter;

use options::{EchoOptions, RootOptions, ServeOptions};

const RESET: &str = "\x1b[0m";

fn command(app: &Structcli) -> Result<Command, StructcliError> {
    let root = CommonArgs::augment(
        Command::new("structcli-demo")
            .about("structcli demo: flags, env and config from one struct")
            .subcommand_required(true),
    );
    let root = app.define::<RootOptions>(&Scope::root(), root)?;
    let serve = app.define::<ServeOptions>(
        &Scope::command("serve"),
        Command::new("serve").about("Print the resolved server settings"),
    )?;
    let echo = app.define::<EchoOptions>(
        &Scope::command("echo"),
        Command::new("echo").about("Print a message"),
    )?;
    Ok(root.subcommand(serve).subcommand(echo))
}

fn serve(opts: &ServeOptions, root: &RootOptions) {
    let color = opts.color.ansi();
    if root.verbose > 0 {
        println!("{color}[verbose] serve options:{RESET}");
    }
    let entries = [
        ("host", opts.host.clone()),
        ("port", opts.port.to_string()),
        ("timeout", format!("{:?}", opts.timeout)),
        ("tags", opts.tags.join(",")),
        ("database.url", opts.database.url.clone()),
        ("database.max_conns", opts.database.max_conns.to_string()),
    ];
    let width = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in &entries {
        println!("{color}{key:<width$}{RESET}  {value}");
    }
}

fn echo(opts: &EchoOptions) {
    let message = if opts.upper {
        opts.message.to_uppercase()
    } else {
        opts.message.clone()
    };
    for _ in 0..opts.repeat {
        println!("{message}");
    }
}

fn run() -> Result<(), StructcliError> {
    let mut app = Structcli::builder()
        .app_name("structcli-demo")
        .search_paths(vec![
            SearchPath::Platform,
            SearchPath::Home(".structcli-demo"),
            SearchPath::Cwd,
        ])
        .build()?;

    let matches = command(&app)?.get_matches();
    app.load_config_from(&matches)?;

    let mut ctx = Context::new();
    let mut root = RootOptions::default();
    if app
        .unmarshal_in(&Scope::root(), &matches, &mut root, &mut ctx)?
        .should_exit()
    {
        return Ok(());
    }
    tracing::debug!(verbose = root.verbose, level = %root.log_level, "root options");

    match matches.subcommand() {
        Some(("serve", sub)) => {
            let scope = Scope::command("serve");
            let mut opts = ServeOptions::default();
            if app.unmarshal_in(&scope, sub, &mut opts, &mut ctx)?.should_exit() {
                return Ok(());
            }
            let root = ctx.get::<RootOptions>().cloned().unwrap_or_default();
            serve(&opts, &root);
        }
        Some(("echo", sub)) => {
            let scope = Scope::command("echo");
            let mut opts = EchoOptions::default();
            if app.unmarshal_in(&scope, sub, &mut opts, &mut ctx)?.should_exit() {
                return Ok(());
            }
            echo(&opts);
        }
        _ => {}
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
