// FST file header: magic number, version, flags, type names, counts and
// optional symbol tables.
// Origin: fst.h, fst.cc (FstHeader)

use std::io::Write;
use std::sync::Arc;

use tracing::debug;

use crate::FstError;
use crate::io::{ByteSource, FstWriter};
use crate::symbols::SymbolTable;

/// Magic number at the start of every FST file.
pub const FST_MAGIC: u32 = 0x7EB2_FDD6;

/// Arrays following the header are padded to the architecture alignment.
pub const IS_ALIGNED: u32 = 0x1;
/// An input symbol table follows the header.
pub const HAS_ISYMBOLS: u32 = 0x2;
/// An output symbol table follows the header (after the input table).
pub const HAS_OSYMBOLS: u32 = 0x4;

/// Parsed FST file header.
///
/// Layout (native-endian):
/// - magic `u32`
/// - file version `i32`
/// - flags `u32`
/// - FST type, arc type: `i32` length + bytes each
/// - properties `u64`
/// - start, number of states, number of arcs: `i64` each
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstHeader {
    pub fst_type: String,
    pub arc_type: String,
    pub version: i32,
    pub flags: u32,
    pub properties: u64,
    pub start: i64,
    pub num_states: i64,
    pub num_arcs: i64,
}

impl FstHeader {
    pub fn is_aligned(&self) -> bool {
        self.flags & IS_ALIGNED != 0
    }

    pub fn has_isymbols(&self) -> bool {
        self.flags & HAS_ISYMBOLS != 0
    }

    pub fn has_osymbols(&self) -> bool {
        self.flags & HAS_OSYMBOLS != 0
    }

    /// Parses the header, checking the magic number.
    pub fn read<S: ByteSource>(src: &mut S, source: &str) -> Result<Self, FstError> {
        let magic = src.read_u32()?;
        if magic != FST_MAGIC {
            return Err(FstError::BadHeader(format!(
                "{source}: bad magic number {magic:#010x}"
            )));
        }
        let version = src.read_i32()?;
        let flags = src.read_u32()?;
        let fst_type = src.read_string()?;
        let arc_type = src.read_string()?;
        let properties = src.read_u64()?;
        let start = src.read_i64()?;
        let num_states = src.read_i64()?;
        let num_arcs = src.read_i64()?;
        if num_states < 0 || num_arcs < 0 {
            return Err(FstError::BadHeader(format!(
                "{source}: negative counts (states {num_states}, arcs {num_arcs})"
            )));
        }
        debug!(
            source,
            %fst_type, %arc_type, version, flags, num_states, num_arcs, "read FST header"
        );
        Ok(Self {
            fst_type,
            arc_type,
            version,
            flags,
            properties,
            start,
            num_states,
            num_arcs,
        })
    }

    pub fn write<W: Write>(&self, w: &mut FstWriter<W>) -> Result<(), FstError> {
        w.write_u32(FST_MAGIC)?;
        w.write_i32(self.version)?;
        w.write_u32(self.flags)?;
        w.write_string(&self.fst_type)?;
        w.write_string(&self.arc_type)?;
        w.write_u64(self.properties)?;
        w.write_i64(self.start)?;
        w.write_i64(self.num_states)?;
        w.write_i64(self.num_arcs)
    }
}

/// Symbol tables attached to an FST file.
pub type SymbolPair = (Option<Arc<SymbolTable>>, Option<Arc<SymbolTable>>);

/// Reads the symbol tables announced by `header`'s flags.
pub fn read_symbols<S: ByteSource>(src: &mut S, header: &FstHeader) -> Result<SymbolPair, FstError> {
    let isymbols = if header.has_isymbols() {
        Some(Arc::new(SymbolTable::read(src)?))
    } else {
        None
    };
    let osymbols = if header.has_osymbols() {
        Some(Arc::new(SymbolTable::read(src)?))
    } else {
        None
    };
    Ok((isymbols, osymbols))
}

/// Writes whichever symbol tables are present, in input/output order.
pub fn write_symbols<W: Write>(
    w: &mut FstWriter<W>,
    isymbols: Option<&SymbolTable>,
    osymbols: Option<&SymbolTable>,
) -> Result<(), FstError> {
    if let Some(table) = isymbols {
        table.write(w)?;
    }
    if let Some(table) = osymbols {
        table.write(w)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::StreamSource;

    fn sample_header() -> FstHeader {
        FstHeader {
            fst_type: "compact_acceptor".to_string(),
            arc_type: "standard".to_string(),
            version: 2,
            flags: HAS_ISYMBOLS,
            properties: 0x1_0001,
            start: 0,
            num_states: 3,
            num_arcs: 2,
        }
    }

    #[test]
    fn header_round_trip() {
        let header = sample_header();
        let mut w = FstWriter::new(Vec::new());
        header.write(&mut w).unwrap();
        let bytes = w.into_inner();
        let mut src = StreamSource::new(bytes.as_slice());
        let parsed = FstHeader::read(&mut src, "test").unwrap();
        assert_eq!(parsed, header);
        assert!(parsed.has_isymbols());
        assert!(!parsed.has_osymbols());
        assert!(!parsed.is_aligned());
    }

    #[test]
    fn reject_bad_magic() {
        let mut w = FstWriter::new(Vec::new());
        sample_header().write(&mut w).unwrap();
        let mut bytes = w.into_inner();
        bytes[0] ^= 0xFF;
        let mut src = StreamSource::new(bytes.as_slice());
        let err = FstHeader::read(&mut src, "test").unwrap_err();
        assert!(matches!(err, FstError::BadHeader(_)));
    }

    #[test]
    fn reject_truncated_header() {
        let mut w = FstWriter::new(Vec::new());
        sample_header().write(&mut w).unwrap();
        let bytes = w.into_inner();
        let mut src = StreamSource::new(&bytes[..20]);
        let err = FstHeader::read(&mut src, "test").unwrap_err();
        assert!(matches!(err, FstError::ShortRead { .. }));
    }

    #[test]
    fn reject_negative_counts() {
        let mut header = sample_header();
        header.num_states = -2;
        let mut w = FstWriter::new(Vec::new());
        header.write(&mut w).unwrap();
        let bytes = w.into_inner();
        let mut src = StreamSource::new(bytes.as_slice());
        assert!(matches!(
            FstHeader::read(&mut src, "test"),
            Err(FstError::BadHeader(_))
        ));
    }

    #[test]
    fn symbols_follow_header() {
        let mut isyms = SymbolTable::new("in");
        isyms.add_symbol("<eps>");
        isyms.add_symbol("a");
        let mut header = sample_header();
        header.flags = HAS_ISYMBOLS | HAS_OSYMBOLS;

        let mut osyms = SymbolTable::new("out");
        osyms.add_symbol("<eps>");

        let mut w = FstWriter::new(Vec::new());
        header.write(&mut w).unwrap();
        write_symbols(&mut w, Some(&isyms), Some(&osyms)).unwrap();
        let bytes = w.into_inner();

        let mut src = StreamSource::new(bytes.as_slice());
        let parsed = FstHeader::read(&mut src, "test").unwrap();
        let (i, o) = read_symbols(&mut src, &parsed).unwrap();
        assert_eq!(i.unwrap().find_key("a"), Some(1));
        assert_eq!(o.unwrap().name(), "out");
    }
}
