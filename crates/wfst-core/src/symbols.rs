// Symbol table: label-to-string and string-to-label mapping.
// Origin: symbol-table.h, symbol-table.cc

use std::io::Write;

use hashbrown::HashMap;

use crate::FstError;
use crate::io::{ByteSource, FstWriter};

/// Magic number opening a binary symbol table.
pub const SYMBOL_TABLE_MAGIC: i32 = 2_125_658_996;

/// A bidirectional mapping between string symbols and integer keys.
///
/// Keys are assigned densely from 0 by [`add_symbol`](Self::add_symbol);
/// explicit keys may leave gaps. Insertion order is preserved for iteration
/// and serialization.
///
/// Binary layout (native-endian):
/// `magic: i32`, `name: string`, `available_key: i64`, `size: i64`, then
/// `size` pairs of `(symbol: string, key: i64)`.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    name: String,
    symbols: Vec<String>,
    keys: Vec<i64>,
    symbol_to_key: HashMap<String, i64>,
    key_to_index: HashMap<i64, usize>,
    available_key: i64,
}

impl SymbolTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds `symbol` with the next available key. Returns the existing key if
    /// the symbol is already present.
    pub fn add_symbol(&mut self, symbol: &str) -> i64 {
        if let Some(&key) = self.symbol_to_key.get(symbol) {
            return key;
        }
        let key = self.available_key;
        self.insert(symbol, key);
        key
    }

    /// Adds `symbol` under an explicit `key`. Returns the existing key if the
    /// symbol is already present.
    pub fn add_symbol_with_key(&mut self, symbol: &str, key: i64) -> i64 {
        if let Some(&existing) = self.symbol_to_key.get(symbol) {
            return existing;
        }
        self.insert(symbol, key);
        key
    }

    fn insert(&mut self, symbol: &str, key: i64) {
        self.key_to_index.insert(key, self.symbols.len());
        self.symbol_to_key.insert(symbol.to_string(), key);
        self.symbols.push(symbol.to_string());
        self.keys.push(key);
        if key >= self.available_key {
            self.available_key = key + 1;
        }
    }

    pub fn find_key(&self, symbol: &str) -> Option<i64> {
        self.symbol_to_key.get(symbol).copied()
    }

    pub fn find_symbol(&self, key: i64) -> Option<&str> {
        self.key_to_index
            .get(&key)
            .map(|&index| self.symbols[index].as_str())
    }

    /// Smallest key not below any assigned key.
    pub fn available_key(&self) -> i64 {
        self.available_key
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// `(key, symbol)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.keys
            .iter()
            .zip(&self.symbols)
            .map(|(&key, symbol)| (key, symbol.as_str()))
    }

    pub fn read<S: ByteSource>(src: &mut S) -> Result<Self, FstError> {
        let magic = src.read_i32()?;
        if magic != SYMBOL_TABLE_MAGIC {
            return Err(FstError::InvalidSymbolTable(format!(
                "bad magic number {magic}"
            )));
        }
        let mut table = Self::new(src.read_string()?);
        let available_key = src.read_i64()?;
        let size = src.read_i64()?;
        if size < 0 {
            return Err(FstError::InvalidSymbolTable(format!(
                "negative symbol count {size}"
            )));
        }
        for _ in 0..size {
            let symbol = src.read_string()?;
            let key = src.read_i64()?;
            if table.symbol_to_key.contains_key(symbol.as_str())
                || table.key_to_index.contains_key(&key)
            {
                return Err(FstError::InvalidSymbolTable(format!(
                    "duplicate entry {symbol:?} -> {key}"
                )));
            }
            table.insert(&symbol, key);
        }
        table.available_key = table.available_key.max(available_key);
        Ok(table)
    }

    pub fn write<W: Write>(&self, w: &mut FstWriter<W>) -> Result<(), FstError> {
        w.write_i32(SYMBOL_TABLE_MAGIC)?;
        w.write_string(&self.name)?;
        w.write_i64(self.available_key)?;
        w.write_i64(self.symbols.len() as i64)?;
        for (key, symbol) in self.iter() {
            w.write_string(symbol)?;
            w.write_i64(key)?;
        }
        Ok(())
    }
}

impl PartialEq for SymbolTable {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.symbols == other.symbols && self.keys == other.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::StreamSource;

    #[test]
    fn dense_keys() {
        let mut table = SymbolTable::new("letters");
        assert_eq!(table.add_symbol("<eps>"), 0);
        assert_eq!(table.add_symbol("a"), 1);
        assert_eq!(table.add_symbol("b"), 2);
        assert_eq!(table.add_symbol("a"), 1);
        assert_eq!(table.len(), 3);
        assert_eq!(table.find_symbol(2), Some("b"));
        assert_eq!(table.find_key("c"), None);
    }

    #[test]
    fn explicit_keys_advance_available() {
        let mut table = SymbolTable::new("sparse");
        table.add_symbol_with_key("x", 10);
        assert_eq!(table.available_key(), 11);
        assert_eq!(table.add_symbol("y"), 11);
        let pairs: Vec<_> = table.iter().collect();
        assert_eq!(pairs, vec![(10, "x"), (11, "y")]);
    }

    #[test]
    fn binary_round_trip() {
        let mut table = SymbolTable::new("words");
        table.add_symbol("<eps>");
        table.add_symbol("hello");
        table.add_symbol_with_key("world", 42);

        let mut w = FstWriter::new(Vec::new());
        table.write(&mut w).unwrap();
        let bytes = w.into_inner();

        let mut src = StreamSource::new(bytes.as_slice());
        let parsed = SymbolTable::read(&mut src).unwrap();
        assert_eq!(parsed, table);
        assert_eq!(parsed.find_key("world"), Some(42));
        assert_eq!(parsed.available_key(), 43);
        assert_eq!(src.position(), bytes.len() as u64);
    }

    #[test]
    fn reject_bad_magic() {
        let mut w = FstWriter::new(Vec::new());
        w.write_i32(1234).unwrap();
        let bytes = w.into_inner();
        let mut src = StreamSource::new(bytes.as_slice());
        assert!(matches!(
            SymbolTable::read(&mut src),
            Err(FstError::InvalidSymbolTable(_))
        ));
    }

    #[test]
    fn reject_duplicate_entries() {
        let mut w = FstWriter::new(Vec::new());
        w.write_i32(SYMBOL_TABLE_MAGIC).unwrap();
        w.write_string("dup").unwrap();
        w.write_i64(2).unwrap();
        w.write_i64(2).unwrap();
        w.write_string("a").unwrap();
        w.write_i64(0).unwrap();
        w.write_string("a").unwrap();
        w.write_i64(1).unwrap();
        let bytes = w.into_inner();
        let mut src = StreamSource::new(bytes.as_slice());
        assert!(matches!(
            SymbolTable::read(&mut src),
            Err(FstError::InvalidSymbolTable(_))
        ));
    }
}
