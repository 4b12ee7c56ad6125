//! Interned strings.
//!
//! A [`Words`] table maps string content to a [`Word`] handle and back.
//! Every distinct content is stored exactly once; a handle, once handed out,
//! names the same content for as long as the table lives.
//!
//! Storage contract: each entry is a separately allocated `Arc<str>`. Growing
//! the table never moves or frees an existing entry, so content returned by
//! [`Words::content_of`] stays valid and unchanged for the life of the table
//! (and beyond, for as long as the caller holds the `Arc`).

use std::collections::HashMap;
use std::fmt;
use std::io::{BufRead, Write};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::error::{Error, Result};

/// Handle of an interned string.
///
/// Encoded as the bitwise complement of the entry's slot index, so slot 0 is
/// a legal index while the raw value 0 never names the first entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Word(usize);

impl Word {
    /// Handle for the entry stored at `index`.
    pub const fn from_index(index: usize) -> Word {
        Word(!index)
    }

    /// Slot index this handle refers to.
    pub const fn index(self) -> usize {
        !self.0
    }

    pub const fn from_raw(raw: usize) -> Word {
        Word(raw)
    }

    pub const fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word(#{})", self.index())
    }
}

// Handles order by insertion, not by raw value.
impl Ord for Word {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index().cmp(&other.index())
    }
}

impl PartialOrd for Word {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct Table {
    /// Canonical content, positionally indexed by `Word::index`.
    store: Vec<Arc<str>>,
    /// Content → handle; shares its keys with `store`.
    index: HashMap<Arc<str>, Word>,
}

impl Table {
    /// Append a new entry. The caller must already hold exclusive access and
    /// have checked that `content` is absent.
    fn insert(&mut self, content: &str) -> Word {
        let word = Word::from_index(self.store.len());
        let content: Arc<str> = Arc::from(content);
        let previous = self.index.insert(Arc::clone(&content), word);
        assert!(
            previous.is_none(),
            "interned content {:?} inserted twice",
            content
        );
        tracing::trace!(?word, content = &*content, "interned");
        self.store.push(content);
        word
    }
}

/// Thread-safe string interning table.
#[derive(Default)]
pub struct Words {
    table: RwLock<Table>,
}

impl Words {
    pub fn new() -> Words {
        Words::default()
    }

    /// Handle for `content`, creating an entry if it is not interned yet.
    ///
    /// The existence check and the insert run under one guard, so racing
    /// callers interning the same new content all receive the same handle.
    pub fn intern(&self, content: &str) -> Word {
        if let Some(&word) = self.table.read().index.get(content) {
            return word;
        }
        let table = self.table.upgradable_read();
        if let Some(&word) = table.index.get(content) {
            return word;
        }
        RwLockUpgradableReadGuard::upgrade(table).insert(content)
    }

    /// Canonical copy of `content`, interning it on miss.
    pub fn canonical(&self, content: &str) -> Arc<str> {
        if let Some((text, _)) = self.table.read().index.get_key_value(content) {
            return Arc::clone(text);
        }
        let table = self.table.upgradable_read();
        if let Some((text, _)) = table.index.get_key_value(content) {
            return Arc::clone(text);
        }
        let mut table = RwLockUpgradableReadGuard::upgrade(table);
        let word = table.insert(content);
        Arc::clone(&table.store[word.index()])
    }

    /// Content named by `word`.
    ///
    /// # Panics
    ///
    /// If `word` does not belong to this table. Handles are only minted by
    /// [`Words::intern`], so an unknown one is a caller bug.
    pub fn content_of(&self, word: Word) -> Arc<str> {
        let table = self.table.read();
        let index = word.index();
        assert!(
            index < table.store.len(),
            "{:?} out of range: table holds {} entries",
            word,
            table.store.len()
        );
        Arc::clone(&table.store[index])
    }

    /// Content named by `word`, or `None` if the handle is out of range.
    pub fn get(&self, word: Word) -> Option<Arc<str>> {
        self.table.read().store.get(word.index()).cloned()
    }

    /// Handle of `content` if already interned. Never creates an entry.
    pub fn handle_of(&self, content: &str) -> Option<Word> {
        self.table.read().index.get(content).copied()
    }

    pub fn contains(&self, content: &str) -> bool {
        self.table.read().index.contains_key(content)
    }

    pub fn contains_word(&self, word: Word) -> bool {
        word.index() < self.table.read().store.len()
    }

    pub fn len(&self) -> usize {
        self.table.read().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().store.is_empty()
    }

    /// Intern every `delimiter`-terminated record of `reader`.
    ///
    /// The stream is read in full first; the new entries are then added
    /// under one exclusive guard. Returns the number of entries created;
    /// records already present are skipped. On invalid UTF-8 the records
    /// before the bad one are still interned.
    pub fn load<R: BufRead>(&self, mut reader: R, delimiter: u8) -> Result<usize> {
        let mut records = Vec::new();
        let outcome = read_records(&mut reader, delimiter, &mut records);

        let mut table = self.table.write();
        let mut created = 0;
        for content in &records {
            if !table.index.contains_key(content.as_str()) {
                table.insert(content);
                created += 1;
            }
        }
        drop(table);
        outcome.map(|()| created)
    }

    /// Write every entry in handle order, each followed by `delimiter`.
    pub fn store<W: Write>(&self, mut writer: W, delimiter: u8) -> Result<()> {
        let store = self.table.read().store.clone();
        for content in &store {
            writer.write_all(content.as_bytes())?;
            writer.write_all(&[delimiter])?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn read_records<R: BufRead>(
    reader: &mut R,
    delimiter: u8,
    records: &mut Vec<String>,
) -> Result<()> {
    let mut record = Vec::new();
    loop {
        record.clear();
        if reader.read_until(delimiter, &mut record)? == 0 {
            return Ok(());
        }
        if record.last() == Some(&delimiter) {
            record.pop();
        }
        let content = std::str::from_utf8(&record).map_err(|e| {
            Error::parse(records.len() + 1, format!("invalid UTF-8: {}", e))
        })?;
        records.push(content.to_string());
    }
}

impl fmt::Debug for Words {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Words").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor, Read};

    #[test]
    fn word_is_complement_of_index() {
        let w = Word::from_index(0);
        assert_eq!(w.raw(), usize::MAX);
        assert_eq!(w.index(), 0);
        assert_eq!(Word::from_index(41).index(), 41);
        assert_eq!(Word::from_raw(!7).index(), 7);
    }

    #[test]
    fn words_order_by_insertion() {
        assert!(Word::from_index(1) < Word::from_index(2));
        assert!(Word::from_index(0) < Word::from_index(100));
    }

    #[test]
    fn intern_same_content_same_word() {
        let words = Words::new();
        let a = words.intern("Command Line");
        let b = words.intern("Command Line");
        assert_eq!(a, b);
        assert_eq!(words.len(), 1);
    }

    #[test]
    fn intern_distinct_content_distinct_words() {
        let words = Words::new();
        let a = words.intern("output");
        let b = words.intern("verbose");
        let c = words.intern("");
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
        assert_eq!(words.len(), 3);
    }

    #[test]
    fn content_round_trip() {
        let words = Words::new();
        let w = words.intern("Application");
        assert_eq!(&*words.content_of(w), "Application");
        assert_eq!(words.intern(&words.content_of(w)), w);
    }

    #[test]
    fn handle_of_does_not_create() {
        let words = Words::new();
        assert_eq!(words.handle_of("missing"), None);
        assert!(!words.contains("missing"));
        assert!(words.is_empty());

        let w = words.intern("present");
        assert_eq!(words.handle_of("present"), Some(w));
        assert!(words.contains("present"));
        assert!(words.contains_word(w));
    }

    #[test]
    fn out_of_range_word() {
        let words = Words::new();
        words.intern("one");
        let stray = Word::from_index(5);
        assert!(!words.contains_word(stray));
        assert!(words.get(stray).is_none());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn content_of_unknown_word_panics() {
        let words = Words::new();
        words.content_of(Word::from_index(0));
    }

    #[test]
    fn canonical_shares_storage() {
        let words = Words::new();
        let a = words.canonical("shared");
        let b = words.canonical("shared");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &words.content_of(words.intern("shared"))));
    }

    #[test]
    fn content_survives_growth() {
        let words = Words::new();
        let first = words.content_of(words.intern("first"));
        let ptr = first.as_ptr();
        for i in 0..1000 {
            words.intern(&format!("filler-{}", i));
        }
        let again = words.content_of(words.intern("first"));
        assert_eq!(again.as_ptr(), ptr);
    }

    #[test]
    fn concurrent_intern_converges() {
        let words = Words::new();
        let keys: Vec<String> = (0..200).map(|i| format!("key-{}", i)).collect();

        let results: Vec<Vec<Word>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|t| {
                    let words = &words;
                    let keys = &keys;
                    s.spawn(move || {
                        // Walk in different orders so threads race on each key.
                        let mut out = vec![Word::from_index(0); keys.len()];
                        for n in 0..keys.len() {
                            let i = if t % 2 == 0 { n } else { keys.len() - 1 - n };
                            out[i] = words.intern(&keys[i]);
                        }
                        out
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(words.len(), keys.len());
        for other in &results[1..] {
            assert_eq!(&results[0], other);
        }
        for (key, word) in keys.iter().zip(&results[0]) {
            assert_eq!(&*words.content_of(*word), key.as_str());
        }
    }

    #[test]
    fn load_interns_records() {
        let words = Words::new();
        words.intern("beta");
        let created = words
            .load(Cursor::new("alpha\nbeta\ngamma\n"), b'\n')
            .unwrap();
        assert_eq!(created, 2);
        assert_eq!(words.len(), 3);
        assert!(words.contains("alpha"));
        assert!(words.contains("gamma"));
    }

    #[test]
    fn load_without_trailing_delimiter() {
        let words = Words::new();
        words.load(Cursor::new("a\0b"), 0).unwrap();
        assert_eq!(words.handle_of("b"), Some(Word::from_index(1)));
    }

    #[test]
    fn load_rejects_invalid_utf8() {
        let words = Words::new();
        let err = words
            .load(Cursor::new(&b"ok\n\xff\xfe\n"[..]), b'\n')
            .unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
        assert!(words.contains("ok"));
    }

    /// A reader that interns into the table it is being loaded into.
    struct Interning<'a> {
        words: &'a Words,
        data: Cursor<&'static [u8]>,
    }

    impl Read for Interning<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.words.intern("from-reader");
            self.data.read(buf)
        }
    }

    #[test]
    fn load_reads_before_locking() {
        let words = Words::new();
        let reader = BufReader::new(Interning {
            words: &words,
            data: Cursor::new(&b"a\nb\nfrom-reader\n"[..]),
        });
        let created = words.load(reader, b'\n').unwrap();
        assert_eq!(created, 2);
        assert_eq!(words.len(), 3);
        assert_eq!(words.handle_of("from-reader"), Some(Word::from_index(0)));
    }

    #[test]
    fn store_writes_in_handle_order() {
        let words = Words::new();
        words.intern("z");
        words.intern("a");
        words.intern("m");
        let mut out = Vec::new();
        words.store(&mut out, b'\n').unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "z\na\nm\n");
    }
}
