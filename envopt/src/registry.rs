//! The guarded configuration document shared by a [`Context`](crate::Context).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::ini::{Document, Pair};
use crate::word::Words;

/// A [`Document`] behind a reader-writer lock.
///
/// Every operation takes exactly one guard and releases it before returning.
pub struct Registry {
    words: Arc<Words>,
    document: RwLock<Document>,
}

impl Registry {
    /// An empty registry. No file is read.
    pub fn new(words: Arc<Words>) -> Registry {
        Registry {
            words,
            document: RwLock::new(Document::new()),
        }
    }

    /// Seed `application` with `program`, then merge the persisted file at
    /// `path` if one exists.
    ///
    /// Reading is best effort: a missing file is normal, an unreadable or
    /// malformed one is logged and whatever was merged before the failure
    /// is kept.
    pub fn bootstrap(words: Arc<Words>, application: Pair, program: &str, path: &Path) -> Registry {
        let registry = Registry::new(words);
        registry.set(application, program);

        match File::open(path) {
            Ok(file) => match registry.load(BufReader::new(file)) {
                Ok(n) => tracing::debug!(path = %path.display(), entries = n, "registry loaded"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "registry file"),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no registry file")
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "registry file"),
        }
        registry
    }

    /// Value at `pair`, or an empty string.
    pub fn get(&self, pair: Pair) -> String {
        self.document
            .read()
            .get(pair)
            .map(str::to_string)
            .unwrap_or_default()
    }

    pub fn contains(&self, pair: Pair) -> bool {
        self.document.read().contains(pair)
    }

    /// Returns true if this created or changed the entry.
    pub fn set(&self, pair: Pair, value: &str) -> bool {
        self.document.write().set(pair, value)
    }

    pub fn len(&self) -> usize {
        self.document.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.read().is_empty()
    }

    /// Copy of the current document.
    pub fn snapshot(&self) -> Document {
        self.document.read().clone()
    }

    /// Merge a document stream into the registry.
    ///
    /// The stream is read and parsed before the exclusive guard is taken, so
    /// neither a slow reader nor interning holds up queries. On a parse
    /// error the entries before the bad line are still merged.
    pub fn load<R: Read>(&self, mut reader: R) -> Result<usize> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        let mut parsed = Document::new();
        let outcome = parsed.load(text.as_bytes(), &self.words);
        self.document.write().merge(parsed);
        outcome
    }

    /// Serialize the whole registry from a snapshot; no guard is held while
    /// writing.
    pub fn store<W: Write>(&self, writer: W) -> Result<()> {
        self.snapshot().store(writer, &self.words)
    }

    /// Write the registry to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        self.store(BufWriter::new(file))?;
        tracing::debug!(path = %path.display(), "registry saved");
        Ok(())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn setup() -> (Arc<Words>, Pair) {
        let words = Arc::new(Words::new());
        let app = words.intern("Application");
        (words, (app, app))
    }

    #[test]
    fn bootstrap_without_file_seeds_program() {
        let (words, app) = setup();
        let dir = tempfile::tempdir().unwrap();
        let reg = Registry::bootstrap(words, app, "myapp", &dir.path().join("myapp.ini"));
        assert_eq!(reg.get(app), "myapp");
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn bootstrap_merges_file_over_seed() {
        let (words, app) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("myapp.ini");
        std::fs::write(
            &path,
            "[Application]\nApplication=renamed\n\n[Command Line]\nlevel=3\n",
        )
        .unwrap();

        let reg = Registry::bootstrap(Arc::clone(&words), app, "myapp", &path);
        assert_eq!(reg.get(app), "renamed");
        let level = (words.intern("Command Line"), words.intern("level"));
        assert_eq!(reg.get(level), "3");
    }

    #[test]
    fn bootstrap_keeps_entries_before_bad_line() {
        let (words, app) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ini");
        std::fs::write(&path, "[s]\ngood=1\ngarbage\nlost=2\n").unwrap();

        let reg = Registry::bootstrap(Arc::clone(&words), app, "bad", &path);
        let s = words.intern("s");
        assert_eq!(reg.get((s, words.intern("good"))), "1");
        assert!(!reg.contains((s, words.intern("lost"))));
        assert_eq!(reg.get(app), "bad");
    }

    #[test]
    fn get_missing_is_empty() {
        let (words, app) = setup();
        let reg = Registry::new(words);
        assert!(reg.is_empty());
        assert_eq!(reg.get(app), "");
        assert!(!reg.contains(app));
    }

    #[test]
    fn set_and_get() {
        let (words, app) = setup();
        let reg = Registry::new(words);
        assert!(reg.set(app, "x"));
        assert!(!reg.set(app, "x"));
        assert!(reg.contains(app));
        assert_eq!(reg.get(app), "x");
    }

    #[test]
    fn load_then_store() {
        let (words, _) = setup();
        let reg = Registry::new(words);
        reg.load(Cursor::new("[Command Line]\noutput=a.txt\n")).unwrap();

        let mut out = Vec::new();
        reg.store(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[Command Line]\noutput=a.txt\n"
        );
    }

    #[test]
    fn load_merges_entries_before_error() {
        let (words, app) = setup();
        let reg = Registry::new(Arc::clone(&words));
        reg.set(app, "seed");
        let err = reg
            .load(Cursor::new("[Application]\nApplication=file\nbroken\n"))
            .unwrap_err();
        assert!(matches!(err, crate::Error::Parse { line: 3, .. }), "{}", err);
        assert_eq!(reg.get(app), "file");
    }

    /// A writer that updates the registry while it is being stored.
    struct Meddling<'a> {
        registry: &'a Registry,
        pair: Pair,
        out: Vec<u8>,
    }

    impl Write for Meddling<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.registry.set(self.pair, "during");
            self.out.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn store_holds_no_guard_while_writing() {
        let (words, app) = setup();
        let reg = Registry::new(Arc::clone(&words));
        reg.set(app, "before");

        let mut writer = Meddling {
            registry: &reg,
            pair: app,
            out: Vec::new(),
        };
        reg.store(&mut writer).unwrap();
        assert_eq!(
            String::from_utf8(writer.out).unwrap(),
            "[Application]\nApplication=before\n"
        );
        assert_eq!(reg.get(app), "during");
        assert_eq!(reg.snapshot().get(app), Some("during"));
    }

    #[test]
    fn save_writes_file() {
        let (words, app) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ini");
        let reg = Registry::new(Arc::clone(&words));
        reg.set(app, "myapp");
        reg.save(&path).unwrap();

        let reread = Registry::bootstrap(words, app, "other", &path);
        assert_eq!(reread.get(app), "myapp");
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let (words, _) = setup();
        let reg = Registry::new(Arc::clone(&words));
        let cat = words.intern("Command Line");

        std::thread::scope(|s| {
            for t in 0..4 {
                let reg = &reg;
                let words = &words;
                s.spawn(move || {
                    for i in 0..50 {
                        let key = words.intern(&format!("k{}-{}", t, i));
                        reg.set((cat, key), &i.to_string());
                        assert_eq!(reg.get((cat, key)), i.to_string());
                    }
                });
            }
        });
        assert_eq!(reg.len(), 200);
    }
}
