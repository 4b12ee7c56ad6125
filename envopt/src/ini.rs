//! Section + key → value document, persisted as an INI-style text file.
//!
//! ```text
//! ; comment
//! [Application]
//! Application=myapp
//!
//! [Command Line]
//! output=file.txt
//! ```
//!
//! Sections and keys are [`Word`]s; reading and writing the text form goes
//! through a [`Words`] table.
//!
//! Backslash escapes keep every entry representable: `\\`, `\n`, `\r`,
//! `\t`, `\s` (a space at either end of a field), and in keys `\=` plus a
//! leading `\[`, `\;` or `\#`. Any other backslash is taken literally, so
//! hand-written paths such as `C:\Apps` load unchanged.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use crate::error::{Error, Result};
use crate::word::{Word, Words};

/// Characters trimmed around section names, keys and values.
const BLANK: &[char] = &[' ', '\t'];

/// `(category, key)` address of a document entry.
pub type Pair = (Word, Word);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    entries: BTreeMap<Pair, String>,
}

impl Document {
    pub fn new() -> Document {
        Document::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, pair: Pair) -> Option<&str> {
        self.entries.get(&pair).map(String::as_str)
    }

    pub fn contains(&self, pair: Pair) -> bool {
        self.entries.contains_key(&pair)
    }

    /// Store `value` under `pair`. Returns true if this created the entry or
    /// changed its value.
    pub fn set(&mut self, pair: Pair, value: &str) -> bool {
        match self.entries.get_mut(&pair) {
            Some(old) if old == value => false,
            Some(old) => {
                old.clear();
                old.push_str(value);
                true
            }
            None => {
                self.entries.insert(pair, value.to_string());
                true
            }
        }
    }

    /// Move every entry of `other` into the document, replacing values
    /// already present.
    pub fn merge(&mut self, other: Document) {
        self.entries.extend(other.entries);
    }

    /// Entries ordered by category, then key, in interning order.
    pub fn iter(&self) -> impl Iterator<Item = (Pair, &str)> + '_ {
        self.entries.iter().map(|(&pair, value)| (pair, value.as_str()))
    }

    /// Join a run of command-line tokens into a single value.
    pub fn join<S: AsRef<str>>(values: &[S]) -> String {
        let mut out = String::new();
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(v.as_ref());
        }
        out
    }

    /// Merge every entry of `reader` into the document, interning section
    /// and key names in `words`. Returns the number of entries read.
    ///
    /// On a malformed line the entries before it stay merged and the error
    /// names the 1-based line number.
    pub fn load<R: BufRead>(&mut self, reader: R, words: &Words) -> Result<usize> {
        let mut section: Option<Word> = None;
        let mut count = 0;

        for (i, line) in reader.lines().enumerate() {
            let number = i + 1;
            let line = line?;
            let l = line.trim_matches(BLANK);
            if l.is_empty() || l.starts_with(';') || l.starts_with('#') {
                continue;
            }

            if let Some(rest) = l.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .ok_or_else(|| Error::parse(number, "unterminated section header"))?;
                section = Some(words.intern(&unescape(name.trim_matches(BLANK))));
                continue;
            }

            let (key, value) =
                split_entry(l).ok_or_else(|| Error::parse(number, "expected key=value"))?;
            let category =
                section.ok_or_else(|| Error::parse(number, "entry outside of a section"))?;

            let key = unescape(key.trim_matches(BLANK));
            self.set(
                (category, words.intern(&key)),
                &unescape(value.trim_matches(BLANK)),
            );
            count += 1;
        }
        Ok(count)
    }

    /// Write the whole document in its text form.
    pub fn store<W: Write>(&self, mut writer: W, words: &Words) -> Result<()> {
        let mut section: Option<Word> = None;
        for ((category, key), value) in self.iter() {
            if section != Some(category) {
                if section.is_some() {
                    writeln!(writer)?;
                }
                writeln!(writer, "[{}]", escape(&words.content_of(category), false))?;
                section = Some(category);
            }
            writeln!(
                writer,
                "{}={}",
                escape(&words.content_of(key), true),
                escape(value, false)
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Escape `text` so it reads back unchanged as a section name or value, or
/// as a key when `key` is set.
fn escape(text: &str, key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let last = text.chars().count().saturating_sub(1);
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' ' if i == 0 || i == last => out.push_str("\\s"),
            '=' if key => out.push_str("\\="),
            '[' | ';' | '#' if key && i == 0 => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('s') => out.push(' '),
            Some(c @ ('\\' | '=' | '[' | ';' | '#')) => out.push(c),
            Some(c) => {
                out.push('\\');
                out.push(c);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Split an entry line at its first unescaped `=`.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '=' => return Some((&line[..i], &line[i + 1..])),
            _ => {}
        }
    }
    None
}
