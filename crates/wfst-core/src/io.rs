// Binary I/O primitives: position-tracking sources and sinks, alignment,
// and arrays that are either owned or borrowed from a memory mapping.
// Origin: mapped-file.h, lib/mapped-file.cc, util.h
//
// All multi-byte values are native-endian.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use bytemuck::Pod;
use memmap2::Mmap;

use crate::FstError;

/// Alignment (in bytes) of arrays in files written with `align = true`.
/// A multiple of the natural alignment of every index and element type.
pub const ARCH_ALIGNMENT: usize = 16;

/// How arrays are brought into memory on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Copy arrays into owned heap buffers.
    #[default]
    Read,
    /// Borrow arrays from a memory mapping when the file layout allows it.
    Map,
}

/// Options for reading an FST.
#[derive(Debug, Clone, Default)]
pub struct FstReadOptions {
    /// Name of the source, used in log and error messages.
    pub source: String,
    pub mode: ReadMode,
}

impl FstReadOptions {
    pub fn new(source: impl Into<String>, mode: ReadMode) -> Self {
        Self {
            source: source.into(),
            mode,
        }
    }
}

/// Options for writing an FST.
#[derive(Debug, Clone)]
pub struct FstWriteOptions {
    /// Name of the destination, used in log and error messages.
    pub source: String,
    /// Pad arrays to [`ARCH_ALIGNMENT`] so the file can be memory-mapped.
    pub align: bool,
    pub write_isymbols: bool,
    pub write_osymbols: bool,
}

impl Default for FstWriteOptions {
    fn default() -> Self {
        Self {
            source: String::new(),
            align: false,
            write_isymbols: true,
            write_osymbols: true,
        }
    }
}

impl FstWriteOptions {
    pub fn aligned(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            align: true,
            ..Self::default()
        }
    }
}

/// Number of padding bytes needed to bring `pos` to a multiple of `alignment`.
#[inline]
pub fn padding_for(pos: u64, alignment: usize) -> usize {
    let partial = (pos % alignment as u64) as usize;
    if partial > 0 { alignment - partial } else { 0 }
}

/// Shared, immutable backing bytes for borrowed regions.
pub type SharedBytes = Arc<dyn AsRef<[u8]> + Send + Sync>;

/// A typed array, either owned or borrowed from shared bytes.
///
/// Borrowed regions keep their backing bytes alive, so a mapping outlives
/// every store built on it.
pub enum Region<T: Pod> {
    Owned(Vec<T>),
    Mapped {
        bytes: SharedBytes,
        offset: usize,
        len: usize,
        _marker: PhantomData<T>,
    },
}

impl<T: Pod> Region<T> {
    /// Borrows `len` values of `T` at `offset` in `bytes`.
    ///
    /// Fails with [`FstError::Alignment`] when the address is not suitably
    /// aligned for `T`.
    pub fn mapped(bytes: SharedBytes, offset: usize, len: usize) -> Result<Self, FstError> {
        let nbytes = len
            .checked_mul(size_of::<T>())
            .ok_or_else(|| FstError::BadHeader(format!("array of {len} elements overflows")))?;
        let available = (*bytes).as_ref().len().saturating_sub(offset);
        if nbytes > available {
            return Err(FstError::ShortRead {
                expected: nbytes,
                actual: available,
            });
        }
        let slice = &(*bytes).as_ref()[offset..offset + nbytes];
        if bytemuck::try_cast_slice::<u8, T>(slice).is_err() {
            return Err(FstError::Alignment(format!(
                "offset {offset} is not aligned to {} bytes",
                align_of::<T>()
            )));
        }
        Ok(Region::Mapped {
            bytes,
            offset,
            len,
            _marker: PhantomData,
        })
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, Region::Mapped { .. })
    }
}

impl<T: Pod> Deref for Region<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        match self {
            Region::Owned(values) => values,
            Region::Mapped {
                bytes, offset, len, ..
            } => {
                let start = *offset;
                let end = start + len * size_of::<T>();
                // Alignment and bounds were checked in `Region::mapped`.
                bytemuck::cast_slice(&(**bytes).as_ref()[start..end])
            }
        }
    }
}

impl<T: Pod> From<Vec<T>> for Region<T> {
    fn from(values: Vec<T>) -> Self {
        Region::Owned(values)
    }
}

impl<T: Pod> fmt::Debug for Region<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("len", &self.len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

/// A readable byte stream that knows its position, used to parse FST files.
pub trait ByteSource {
    /// Current offset from the beginning of the file.
    fn position(&self) -> u64;

    /// Fills `buf` completely or fails with [`FstError::ShortRead`].
    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), FstError>;

    /// Reads `len` bytes into a new buffer.
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, FstError>;

    /// Reads an array of `len` values. With [`ReadMode::Map`] a mapped source
    /// borrows the array instead of copying it.
    fn read_region<T: Pod>(&mut self, len: usize, mode: ReadMode) -> Result<Region<T>, FstError>;

    fn read_u32(&mut self) -> Result<u32, FstError> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(u32::from_ne_bytes(buf))
    }

    fn read_i32(&mut self) -> Result<i32, FstError> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(i32::from_ne_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64, FstError> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(u64::from_ne_bytes(buf))
    }

    fn read_i64(&mut self) -> Result<i64, FstError> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(i64::from_ne_bytes(buf))
    }

    /// Reads an `i32`-length-prefixed UTF-8 string.
    fn read_string(&mut self) -> Result<String, FstError> {
        let len = self.read_i32()?;
        let len = usize::try_from(len)
            .map_err(|_| FstError::BadHeader(format!("negative string length {len}")))?;
        let bytes = self.read_vec(len)?;
        String::from_utf8(bytes).map_err(|_| FstError::BadHeader("invalid UTF-8 string".to_string()))
    }

    /// Skips padding up to the next multiple of `alignment`.
    fn align(&mut self, alignment: usize) -> Result<(), FstError> {
        let pad = padding_for(self.position(), alignment);
        if pad > 0 {
            let mut buf = [0u8; ARCH_ALIGNMENT];
            if pad > buf.len() {
                self.read_vec(pad)?;
            } else {
                self.read_bytes(&mut buf[..pad])?;
            }
        }
        Ok(())
    }
}

/// Reads until `buf` is full or the stream ends; returns the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// A [`ByteSource`] over any [`Read`] stream. Arrays are always copied.
pub struct StreamSource<R> {
    inner: R,
    pos: u64,
}

impl<R: Read> StreamSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    /// Wraps a stream already positioned `pos` bytes into a file.
    pub fn with_position(inner: R, pos: u64) -> Self {
        Self { inner, pos }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteSource for StreamSource<R> {
    fn position(&self) -> u64 {
        self.pos
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), FstError> {
        let n = read_full(&mut self.inner, buf)?;
        self.pos += n as u64;
        if n < buf.len() {
            return Err(FstError::ShortRead {
                expected: buf.len(),
                actual: n,
            });
        }
        Ok(())
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, FstError> {
        // `take` avoids trusting `len` for the allocation size.
        let mut bytes = Vec::new();
        let n = (&mut self.inner).take(len as u64).read_to_end(&mut bytes)?;
        self.pos += n as u64;
        if n < len {
            return Err(FstError::ShortRead {
                expected: len,
                actual: n,
            });
        }
        Ok(bytes)
    }

    fn read_region<T: Pod>(&mut self, len: usize, _mode: ReadMode) -> Result<Region<T>, FstError> {
        let nbytes = len
            .checked_mul(size_of::<T>())
            .ok_or_else(|| FstError::BadHeader(format!("array of {len} elements overflows")))?;
        let bytes = self.read_vec(nbytes)?;
        let mut values = vec![T::zeroed(); len];
        bytemuck::cast_slice_mut::<T, u8>(&mut values).copy_from_slice(&bytes);
        Ok(Region::Owned(values))
    }
}

/// A [`ByteSource`] over bytes held in memory, typically a file mapping.
pub struct MappedSource {
    bytes: SharedBytes,
    pos: usize,
}

impl MappedSource {
    /// Memory-maps the file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FstError> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the mapping is read-only; callers must not truncate or
        // modify the file while FSTs borrowed from it are alive.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self::new(Arc::new(mmap)))
    }

    pub fn new(bytes: SharedBytes) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self::new(Arc::new(bytes))
    }

    pub fn len(&self) -> usize {
        (*self.bytes).as_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remaining(&self) -> usize {
        self.len().saturating_sub(self.pos)
    }
}

impl ByteSource for MappedSource {
    fn position(&self) -> u64 {
        self.pos as u64
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<(), FstError> {
        let available = self.remaining();
        if buf.len() > available {
            self.pos += available;
            return Err(FstError::ShortRead {
                expected: buf.len(),
                actual: available,
            });
        }
        buf.copy_from_slice(&(*self.bytes).as_ref()[self.pos..self.pos + buf.len()]);
        self.pos += buf.len();
        Ok(())
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, FstError> {
        let available = self.remaining();
        if len > available {
            self.pos += available;
            return Err(FstError::ShortRead {
                expected: len,
                actual: available,
            });
        }
        let bytes = (*self.bytes).as_ref()[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(bytes)
    }

    fn read_region<T: Pod>(&mut self, len: usize, mode: ReadMode) -> Result<Region<T>, FstError> {
        let nbytes = len
            .checked_mul(size_of::<T>())
            .ok_or_else(|| FstError::BadHeader(format!("array of {len} elements overflows")))?;
        let region = match mode {
            ReadMode::Map => Region::mapped(self.bytes.clone(), self.pos, len)?,
            ReadMode::Read => {
                let bytes = self.read_vec(nbytes)?;
                let mut values = vec![T::zeroed(); len];
                bytemuck::cast_slice_mut::<T, u8>(&mut values).copy_from_slice(&bytes);
                return Ok(Region::Owned(values));
            }
        };
        self.pos += nbytes;
        Ok(region)
    }
}

/// A position-tracking writer for FST files.
pub struct FstWriter<W> {
    inner: W,
    pos: u64,
}

fn map_write_error(e: io::Error) -> FstError {
    if e.kind() == io::ErrorKind::WriteZero {
        FstError::ShortWrite
    } else {
        FstError::Io(e)
    }
}

impl<W: Write> FstWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, pos: 0 }
    }

    /// Wraps a stream already positioned `pos` bytes into a file.
    pub fn with_position(inner: W, pos: u64) -> Self {
        Self { inner, pos }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), FstError> {
        self.inner.write_all(bytes).map_err(map_write_error)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), FstError> {
        self.write_bytes(&value.to_ne_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), FstError> {
        self.write_bytes(&value.to_ne_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<(), FstError> {
        self.write_bytes(&value.to_ne_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<(), FstError> {
        self.write_bytes(&value.to_ne_bytes())
    }

    /// Writes an `i32`-length-prefixed string.
    pub fn write_string(&mut self, value: &str) -> Result<(), FstError> {
        let len = i32::try_from(value.len())
            .map_err(|_| FstError::BadHeader(format!("string of {} bytes", value.len())))?;
        self.write_i32(len)?;
        self.write_bytes(value.as_bytes())
    }

    /// Writes an array of plain-old-data values.
    pub fn write_slice<T: Pod>(&mut self, values: &[T]) -> Result<(), FstError> {
        self.write_bytes(bytemuck::cast_slice(values))
    }

    pub fn write_value<T: Pod>(&mut self, value: &T) -> Result<(), FstError> {
        self.write_bytes(bytemuck::bytes_of(value))
    }

    /// Writes zero bytes up to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) -> Result<(), FstError> {
        let pad = padding_for(self.pos, alignment);
        if pad > 0 {
            let zeros = [0u8; ARCH_ALIGNMENT];
            if pad > zeros.len() {
                self.write_bytes(&vec![0u8; pad])?;
            } else {
                self.write_bytes(&zeros[..pad])?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), FstError> {
        self.inner.flush().map_err(map_write_error)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_computation() {
        assert_eq!(padding_for(0, 16), 0);
        assert_eq!(padding_for(1, 16), 15);
        assert_eq!(padding_for(16, 16), 0);
        assert_eq!(padding_for(21, 8), 3);
    }

    #[test]
    fn writer_tracks_position_and_aligns() {
        let mut w = FstWriter::new(Vec::new());
        w.write_u32(7).unwrap();
        w.write_string("abc").unwrap();
        assert_eq!(w.position(), 11);
        w.align(ARCH_ALIGNMENT).unwrap();
        assert_eq!(w.position(), 16);
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 16);
        assert!(bytes[11..].iter().all(|&b| b == 0));
    }

    #[test]
    fn stream_source_reads_back() {
        let mut w = FstWriter::new(Vec::new());
        w.write_i64(-3).unwrap();
        w.write_string("hello").unwrap();
        w.align(ARCH_ALIGNMENT).unwrap();
        w.write_slice(&[1u32, 2, 3]).unwrap();
        let bytes = w.into_inner();

        let mut src = StreamSource::new(bytes.as_slice());
        assert_eq!(src.read_i64().unwrap(), -3);
        assert_eq!(src.read_string().unwrap(), "hello");
        src.align(ARCH_ALIGNMENT).unwrap();
        let region: Region<u32> = src.read_region(3, ReadMode::Read).unwrap();
        assert_eq!(&*region, &[1, 2, 3]);
        assert!(!region.is_mapped());
    }

    #[test]
    fn short_read_is_reported() {
        let bytes = [1u8, 2];
        let mut src = StreamSource::new(&bytes[..]);
        let err = src.read_u32().unwrap_err();
        assert!(matches!(
            err,
            FstError::ShortRead {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn short_region_is_reported() {
        let bytes = [0u8; 6];
        let mut src = StreamSource::new(&bytes[..]);
        let err = src.read_region::<u32>(2, ReadMode::Read).unwrap_err();
        assert!(matches!(err, FstError::ShortRead { expected: 8, .. }));
    }

    #[test]
    fn mapped_source_copies_in_read_mode() {
        let mut w = FstWriter::new(Vec::new());
        w.write_slice(&[10u32, 20]).unwrap();
        let mut src = MappedSource::from_vec(w.into_inner());
        let region: Region<u32> = src.read_region(2, ReadMode::Read).unwrap();
        assert_eq!(&*region, &[10, 20]);
        assert_eq!(src.position(), 8);
    }

    #[test]
    fn mapped_file_borrows_aligned_arrays() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut w = FstWriter::new(file.as_file_mut());
        w.write_u32(0xFEED).unwrap();
        w.align(ARCH_ALIGNMENT).unwrap();
        w.write_slice(&[7u64, 8, 9]).unwrap();
        w.flush().unwrap();

        let mut src = MappedSource::open(file.path()).unwrap();
        assert_eq!(src.len(), 16 + 24);
        assert_eq!(src.read_u32().unwrap(), 0xFEED);
        src.align(ARCH_ALIGNMENT).unwrap();
        let region: Region<u64> = src.read_region(3, ReadMode::Map).unwrap();
        assert!(region.is_mapped());
        assert_eq!(&*region, &[7, 8, 9]);
        assert_eq!(src.position(), 40);
    }

    #[test]
    fn mapped_region_rejects_misalignment() {
        // A u64 region at an odd offset can never be aligned.
        let bytes: SharedBytes = Arc::new(vec![0u8; 64]);
        let err = Region::<u64>::mapped(bytes, 1, 2).unwrap_err();
        assert!(matches!(err, FstError::Alignment(_)));
    }

    #[test]
    fn mapped_region_rejects_overrun() {
        let bytes: SharedBytes = Arc::new(vec![0u8; 8]);
        let err = Region::<u8>::mapped(bytes, 4, 8).unwrap_err();
        assert!(matches!(err, FstError::ShortRead { expected: 8, actual: 4 }));
    }

    #[test]
    fn negative_string_length_is_bad_header() {
        let mut w = FstWriter::new(Vec::new());
        w.write_i32(-5).unwrap();
        let bytes = w.into_inner();
        let mut src = StreamSource::new(bytes.as_slice());
        assert!(matches!(src.read_string(), Err(FstError::BadHeader(_))));
    }
}
