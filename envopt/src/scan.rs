//! Command-line scanning against a table of [`Command`] descriptors.
//!
//! A recognized command consumes up to `arity` of the tokens that follow it
//! as its value. Everything else (tokens before the first command, tokens
//! beyond a command's arity, unrecognized flags) comes back as extra
//! positional arguments. There is no "unknown option" error.

/// Value stored for a command the moment it is seen, before its value span
/// is bound.
pub const PRESENT: &str = "true";

/// A recognized command-line option: `--name` or `-dash`, followed by
/// `arity` value tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub name: &'static str,
    pub dash: &'static str,
    pub arity: usize,
}

impl Command {
    pub const fn new(name: &'static str, dash: &'static str, arity: usize) -> Command {
        Command { name, dash, arity }
    }

    /// Does `token` spell this command? `--` is checked before `-`, so
    /// `--x` never matches a short alias `x`.
    pub fn matches(&self, token: &str) -> bool {
        if let Some(long) = token.strip_prefix("--") {
            !long.is_empty() && long == self.name
        } else if let Some(short) = token.strip_prefix('-') {
            !short.is_empty() && short == self.dash
        } else {
            false
        }
    }
}

/// First descriptor in `commands` spelled by `token`.
pub fn find<'a>(commands: &'a [Command], token: &str) -> Option<&'a Command> {
    commands.iter().find(|c| c.matches(token))
}

/// Forward-only cursor over a captured argument list.
pub struct Scanner<'a> {
    args: &'a [String],
    commands: &'a [Command],
    cursor: usize,
    current: Option<&'a Command>,
    done: bool,
}

impl<'a> Scanner<'a> {
    /// Start scanning after the program image path (`args[0]`).
    pub fn new(args: &'a [String], commands: &'a [Command]) -> Scanner<'a> {
        Scanner {
            args,
            commands,
            cursor: args.len().min(1),
            current: None,
            done: false,
        }
    }

    /// Count tokens from the cursor up to the next recognized command (or the
    /// end of the list). Returns that distance and the command, if any.
    fn find_next(&self) -> (usize, Option<&'a Command>) {
        let rest = &self.args[self.cursor..];
        for (argn, token) in rest.iter().enumerate() {
            if let Some(next) = find(self.commands, token) {
                return (argn, Some(next));
            }
        }
        (rest.len(), None)
    }

    /// Run one step: bind the pending command's value, record the next
    /// command's presence, and collect extras in between.
    ///
    /// `set` receives `(command name, value)` writes in order. Returns false
    /// once the list is exhausted.
    pub fn step<F>(&mut self, set: &mut F, extra: &mut Vec<String>) -> bool
    where
        F: FnMut(&str, &str),
    {
        if self.done {
            return false;
        }

        let (argn, next) = self.find_next();
        let span = &self.args[self.cursor..self.cursor + argn];

        let mut count = 0;
        if let Some(current) = self.current {
            count = argn.min(current.arity);
            // An empty span leaves the presence value in place.
            if count > 0 {
                let value = crate::ini::Document::join(&span[..count]);
                tracing::debug!(command = current.name, value = %value, "bound");
                set(current.name, &value);
            }
        }

        if let Some(next) = next {
            set(next.name, PRESENT);
        }

        for argument in &span[count..] {
            tracing::trace!(argument = %argument, "extra");
            extra.push(argument.clone());
        }

        match next {
            Some(next) => {
                self.cursor += argn + 1;
                self.current = Some(next);
            }
            None => {
                self.cursor = self.args.len();
                self.current = None;
                self.done = true;
            }
        }
        true
    }

    /// Scan to the end of the list, returning the extra arguments.
    pub fn run<F>(mut self, mut set: F) -> Vec<String>
    where
        F: FnMut(&str, &str),
    {
        let mut extra = Vec::new();
        while self.step(&mut set, &mut extra) {}
        extra
    }
}

/// Scan `args` (with the program image path first) against `commands`.
pub fn scan<F>(args: &[String], commands: &[Command], set: F) -> Vec<String>
where
    F: FnMut(&str, &str),
{
    Scanner::new(args, commands).run(set)
}
