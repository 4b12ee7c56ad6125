// Test binary: resolves its own command line and prints what it found.
//
// One `name: value` line per fact, then the registry document after a
// `--` separator line. Logging goes to stderr (RUST_LOG, default warn).

use std::io::Write;

use envopt::{Command, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const COMMANDS: &[Command] = &[
    Command::new("output", "o", 1),
    Command::new("verbose", "v", 0),
    Command::new("define", "D", 2),
    Command::new("level", "l", 1),
    Command::new("get", "g", 1),
    Command::new("save", "s", 0),
];

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let ctx = Context::builder().commands(COMMANDS).build();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "program: {}", ctx.program())?;
    writeln!(out, "application: {}", ctx.application())?;
    writeln!(
        out,
        "config: {}",
        ctx.config().map(|d| d.display().to_string()).unwrap_or_default()
    )?;
    writeln!(out, "initials: {}", ctx.initials().display())?;

    for arg in ctx.extra() {
        writeln!(out, "extra: {}", arg)?;
    }
    for command in ctx.commands() {
        if ctx.got(command.name) {
            writeln!(out, "option {}: {}", command.name, ctx.get(command.name))?;
        }
    }

    // `--get KEY` resolves an arbitrary key through the full precedence chain.
    if ctx.got("get") {
        let key = ctx.get("get");
        writeln!(out, "get {}: {}", key, ctx.get(&key))?;
    }

    if ctx.got("save") {
        ctx.save()?;
        writeln!(out, "saved: {}", ctx.initials().display())?;
    }

    writeln!(out, "--")?;
    ctx.store(&mut out)?;
    Ok(())
}
