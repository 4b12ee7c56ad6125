//! The option resolver: one object owning the captured command line, the
//! interning table and the lazily bootstrapped registry.
//!
//! ```no_run
//! use envopt::{Command, Context};
//!
//! const COMMANDS: &[Command] = &[
//!     Command::new("output", "o", 1),
//!     Command::new("verbose", "v", 0),
//! ];
//!
//! let ctx = Context::builder().commands(COMMANDS).build();
//! if ctx.got("verbose") {
//!     eprintln!("writing to {}", ctx.get("output"));
//! }
//! for file in ctx.extra() {
//!     println!("{}", file);
//! }
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::error::Result;
use crate::ini::Pair;
use crate::path;
use crate::registry::Registry;
use crate::scan::{self, Command};
use crate::word::{Word, Words};

/// Category of options set from the command line or by [`Context::set`].
pub const COMMAND_LINE: &str = "Command Line";
/// Category (and key) of the program name entry.
pub const APPLICATION: &str = "Application";

enum Environment {
    Process,
    Snapshot(HashMap<String, String>),
}

impl Environment {
    fn var(&self, key: &str) -> Option<String> {
        match self {
            Environment::Process => std::env::var(key).ok(),
            Environment::Snapshot(vars) => vars.get(key).cloned(),
        }
    }
}

pub struct ContextBuilder {
    commands: Vec<Command>,
    args: Option<Vec<String>>,
    env: Option<HashMap<String, String>>,
    config_dirs: Option<Vec<PathBuf>>,
    words: Option<Arc<Words>>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        ContextBuilder {
            commands: Vec::new(),
            args: None,
            env: None,
            config_dirs: None,
            words: None,
        }
    }

    /// Descriptor table recognized by the scan.
    pub fn commands(mut self, commands: &[Command]) -> Self {
        self.commands = commands.to_vec();
        self
    }

    /// Raw tokens, program image path first. Defaults to the process
    /// arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Resolve environment lookups against these variables instead of the
    /// process environment.
    pub fn environment<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Directories searched for the settings file, replacing the default
    /// list (user config directory, then `PATH`).
    pub fn config_dirs<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.config_dirs = Some(dirs.into_iter().map(Into::into).collect());
        self
    }

    /// Share an existing interning table.
    pub fn words(mut self, words: Arc<Words>) -> Self {
        self.words = Some(words);
        self
    }

    /// Capture the arguments and scan them against the descriptor table.
    ///
    /// Option values found by the scan are written to the registry, which
    /// bootstraps from the settings file on the first such write.
    pub fn build(self) -> Context {
        let args = self.args.unwrap_or_else(|| {
            std::env::args_os()
                .map(|a| a.to_string_lossy().into_owned())
                .collect()
        });
        let env = match self.env {
            Some(vars) => Environment::Snapshot(vars),
            None => Environment::Process,
        };
        let words = self.words.unwrap_or_default();
        let command_line = words.intern(COMMAND_LINE);
        let application = words.intern(APPLICATION);

        let mut ctx = Context {
            words,
            commands: self.commands,
            args,
            extra: Vec::new(),
            env,
            config_dirs: self.config_dirs,
            command_line,
            application,
            program: OnceLock::new(),
            config: OnceLock::new(),
            initials: OnceLock::new(),
            registry: OnceLock::new(),
        };

        let extra = scan::scan(&ctx.args, &ctx.commands, |name, value| {
            ctx.set(name, value);
        });
        ctx.extra = extra;
        ctx
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved options for one process.
///
/// The argument list is fixed at [`ContextBuilder::build`]; after that every
/// method takes `&self` and may be called from any number of threads.
pub struct Context {
    words: Arc<Words>,
    commands: Vec<Command>,
    args: Vec<String>,
    extra: Vec<String>,
    env: Environment,
    config_dirs: Option<Vec<PathBuf>>,
    command_line: Word,
    application: Word,
    program: OnceLock<String>,
    config: OnceLock<Option<PathBuf>>,
    initials: OnceLock<PathBuf>,
    registry: OnceLock<Registry>,
}

impl Context {
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    pub fn words(&self) -> &Arc<Words> {
        &self.words
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// The captured argument list, program image path first.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Arguments not consumed by any command.
    pub fn extra(&self) -> &[String] {
        &self.extra
    }

    /// `(Command Line, key)`
    pub fn pair(&self, key: &str) -> Pair {
        (self.command_line, self.words.intern(key))
    }

    /// The registry, bootstrapped from the settings file on first use.
    pub fn registry(&self) -> &Registry {
        self.registry.get_or_init(|| {
            Registry::bootstrap(
                Arc::clone(&self.words),
                (self.application, self.application),
                self.program(),
                self.initials(),
            )
        })
    }

    /// Value of option `key`; empty if unset. The first non-empty of:
    ///
    /// 1. a captured argument spelled `key=value`,
    /// 2. the environment variable `key`,
    /// 3. the registry entry `(Command Line, key)`.
    pub fn get(&self, key: &str) -> Cow<'_, str> {
        for arg in &self.args {
            if let Some((k, v)) = arg.split_once('=') {
                if k == key && !v.is_empty() {
                    return Cow::Borrowed(v);
                }
            }
        }
        if let Some(value) = self.env.var(key) {
            if !value.is_empty() {
                return Cow::Owned(value);
            }
        }
        // Bootstrap interns every key of the settings file, so after it a key
        // that was never interned cannot be in the registry.
        let registry = self.registry();
        match self.words.handle_of(key) {
            Some(word) => Cow::Owned(registry.get((self.command_line, word))),
            None => Cow::Borrowed(""),
        }
    }

    pub fn got(&self, key: &str) -> bool {
        !self.get(key).is_empty()
    }

    /// Store `value` in the registry under `(Command Line, key)`. Arguments
    /// and environment variables still take precedence in [`Context::get`].
    pub fn set(&self, key: &str, value: &str) -> bool {
        self.registry().set(self.pair(key), value)
    }

    pub fn get_pair(&self, pair: Pair) -> String {
        self.registry().get(pair)
    }

    pub fn got_pair(&self, pair: Pair) -> bool {
        self.registry().contains(pair)
    }

    pub fn set_pair(&self, pair: Pair, value: &str) -> bool {
        self.registry().set(pair, value)
    }

    /// Application name recorded in the registry: the program name unless
    /// the settings file overrides it.
    pub fn application(&self) -> String {
        self.get_pair((self.application, self.application))
    }

    /// Program name derived from the process image path.
    pub fn program(&self) -> &str {
        self.program.get_or_init(|| {
            let image = self.args.first().map(String::as_str).unwrap_or("");
            path::program_name(image).to_string()
        })
    }

    /// Directory holding `<program>.ini`, if any candidate has one.
    pub fn config(&self) -> Option<&Path> {
        self.config
            .get_or_init(|| {
                let name = path::file_name(self.program());
                match &self.config_dirs {
                    Some(dirs) => path::find_dir(dirs, &name),
                    None => {
                        let path_var = self.env.var("PATH");
                        path::find_dir(&path::default_dirs(path_var.as_deref()), &name)
                    }
                }
            })
            .as_deref()
    }

    /// Path of the settings file read at bootstrap and written by
    /// [`Context::save`].
    pub fn initials(&self) -> &Path {
        self.initials.get_or_init(|| {
            path::initials(self.config(), &path::file_name(self.program()))
        })
    }

    /// Merge a settings document into the registry.
    pub fn load<R: Read>(&self, reader: R) -> Result<usize> {
        self.registry().load(reader)
    }

    /// Write the whole registry as a settings document.
    pub fn store<W: Write>(&self, writer: W) -> Result<()> {
        self.registry().store(writer)
    }

    /// Write the registry to [`Context::initials`].
    pub fn save(&self) -> Result<()> {
        self.registry().save(self.initials())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("args", &self.args)
            .field("extra", &self.extra)
            .field("commands", &self.commands)
            .finish()
    }
}
