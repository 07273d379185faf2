// Compact FST: a compactor and a shared compact store serving the Fst
// contract, unpacking elements on demand.
// Origin: compact-fst.h:411-1058 (CompactFstImpl, CompactFst, WriteFst)

use std::any::Any;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc as Shared, Mutex, PoisonError};

use tracing::{debug, error, warn};
use wfst_core::header::{FstHeader, HAS_ISYMBOLS, HAS_OSYMBOLS, IS_ALIGNED, read_symbols, write_symbols};
use wfst_core::io::{
    ARCH_ALIGNMENT, ByteSource, FstReadOptions, FstWriteOptions, FstWriter, MappedSource, ReadMode,
    StreamSource,
};
use wfst_core::properties::{
    COPY_PROPERTIES, ERROR, EXPANDED, I_LABEL_SORTED, O_LABEL_SORTED, test_properties,
};
use wfst_core::{Arc, Fst, FstError, NO_LABEL, NO_STATE, Semiring, StateId, SymbolTable};

use crate::cache::{ArcCache, CacheOptions, CachedState};
use crate::compactor::{ArcFlags, Arity, Compactor};
use crate::index::CompactIndex;
use crate::iter::ArcIterator;
use crate::store::{CompactStore, check_window, count_epsilons, to_index};

/// Current unaligned file version.
pub const FILE_VERSION: i32 = 2;
/// Version written for aligned files. Files of this version are read as
/// aligned even when the flag is missing.
pub const ALIGNED_FILE_VERSION: i32 = 1;
/// Oldest readable version.
pub const MIN_FILE_VERSION: i32 = 1;

/// A read-mostly FST whose arcs are packed by a [`Compactor`].
///
/// `U` is the width of the state offset array. Clones share the compactor
/// and the store (including any memory mapping) but get their own cache.
pub struct CompactFst<W: Semiring, C: Compactor<W>, U: CompactIndex = u32> {
    compactor: Shared<C>,
    store: Shared<CompactStore<C::Element, U>>,
    properties: u64,
    fst_type: String,
    isymbols: Option<Shared<SymbolTable>>,
    osymbols: Option<Shared<SymbolTable>>,
    error: Option<Shared<FstError>>,
    cache: Mutex<ArcCache<W>>,
}

impl<W: Semiring, C: Compactor<W>, U: CompactIndex> CompactFst<W, C, U> {
    /// `compact[bits]_tag`, with the bit width only when not 32.
    pub fn type_name() -> String {
        let mut name = String::from("compact");
        if U::BITS != 32 {
            name.push_str(&U::BITS.to_string());
        }
        name.push('_');
        name.push_str(C::TAG);
        name
    }

    fn assemble(
        compactor: Shared<C>,
        store: Shared<CompactStore<C::Element, U>>,
        properties: u64,
        isymbols: Option<Shared<SymbolTable>>,
        osymbols: Option<Shared<SymbolTable>>,
    ) -> Self {
        Self {
            compactor,
            store,
            properties,
            fst_type: Self::type_name(),
            isymbols,
            osymbols,
            error: None,
            cache: Mutex::new(ArcCache::new(CacheOptions::default())),
        }
    }

    fn from_error(compactor: C, err: FstError) -> Self {
        debug!(%err, fst_type = %Self::type_name(), "compact FST left in error state");
        let mut fst = Self::assemble(
            Shared::new(compactor),
            Shared::new(CompactStore::empty(C::ARITY)),
            ERROR | EXPANDED,
            None,
            None,
        );
        fst.error = Some(Shared::new(err));
        fst
    }

    /// Fails when `fst` is in error or cannot be packed by `compactor`.
    fn check_source<F: Fst<W>>(fst: &F, compactor: &C) -> Result<(), FstError> {
        if fst.properties() & ERROR != 0 {
            error!(fst_type = fst.fst_type(), "source FST is in an error state");
            return Err(FstError::PropagatedError);
        }
        if !compactor.is_compatible(fst) {
            error!(compactor = C::TAG, "compactor incompatible with FST");
            return Err(FstError::IncompatibleCompactor(format!(
                "{} compactor requires properties {:#x}",
                C::TAG,
                C::PROPERTIES
            )));
        }
        Ok(())
    }

    /// Packs `fst` with `compactor`.
    pub fn try_from_fst<F: Fst<W>>(fst: &F, compactor: C) -> Result<Self, FstError> {
        Self::check_source(fst, &compactor)?;
        let store = CompactStore::from_fst(fst, &compactor)?;
        let properties = test_properties(fst, COPY_PROPERTIES) | C::PROPERTIES | EXPANDED;
        Ok(Self::assemble(
            Shared::new(compactor),
            Shared::new(store),
            properties,
            fst.input_symbols().cloned(),
            fst.output_symbols().cloned(),
        ))
    }

    /// Like [`try_from_fst`](Self::try_from_fst), but a failure yields an
    /// empty FST whose properties include `ERROR`.
    pub fn from_fst<F: Fst<W>>(fst: &F, compactor: C) -> Self {
        match Self::try_from_fst(fst, compactor.clone()) {
            Ok(compact) => compact,
            Err(err) => Self::from_error(compactor, err),
        }
    }

    /// Builds from already packed elements (see [`CompactStore::from_elements`]).
    pub fn try_from_elements<I>(elements: I, compactor: C) -> Result<Self, FstError>
    where
        I: IntoIterator<Item = C::Element>,
    {
        let store = CompactStore::from_elements::<W, C, I>(elements, &compactor)?;
        Ok(Self::assemble(
            Shared::new(compactor),
            Shared::new(store),
            C::PROPERTIES | EXPANDED,
            None,
            None,
        ))
    }

    pub fn from_elements<I>(elements: I, compactor: C) -> Self
    where
        I: IntoIterator<Item = C::Element>,
    {
        match Self::try_from_elements(elements, compactor.clone()) {
            Ok(compact) => compact,
            Err(err) => Self::from_error(compactor, err),
        }
    }

    /// Wraps a store already built from `fst`, sharing it with other FSTs.
    pub fn with_store<F: Fst<W>>(
        fst: &F,
        compactor: Shared<C>,
        store: Shared<CompactStore<C::Element, U>>,
    ) -> Result<Self, FstError> {
        Self::check_source(fst, &*compactor)?;
        if store.num_states() != fst.num_states() || store.start() != fst.start() {
            return Err(FstError::IllFormedInput(format!(
                "store has {} states from {}, FST has {} from {}",
                store.num_states(),
                store.start(),
                fst.num_states(),
                fst.start()
            )));
        }
        let properties = test_properties(fst, COPY_PROPERTIES) | C::PROPERTIES | EXPANDED;
        Ok(Self::assemble(
            compactor,
            store,
            properties,
            fst.input_symbols().cloned(),
            fst.output_symbols().cloned(),
        ))
    }

    /// Replaces the store with one built from packed elements. Symbol tables
    /// are kept; the cache and any previous error are cleared.
    pub fn set_compact_elements<I>(&mut self, elements: I) -> Result<(), FstError>
    where
        I: IntoIterator<Item = C::Element>,
    {
        let store = CompactStore::from_elements::<W, C, I>(elements, &*self.compactor)?;
        self.store = Shared::new(store);
        self.properties = C::PROPERTIES | EXPANDED;
        self.error = None;
        self.cache
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    /// Uses `options` for this instance's arc cache, dropping cached states.
    pub fn with_cache_options(self, options: CacheOptions) -> Self {
        Self {
            cache: Mutex::new(ArcCache::new(options)),
            ..self
        }
    }

    pub fn compactor(&self) -> &C {
        &self.compactor
    }

    pub fn store(&self) -> &Shared<CompactStore<C::Element, U>> {
        &self.store
    }

    /// The error this FST was constructed with, if any.
    pub fn error(&self) -> Option<&FstError> {
        self.error.as_deref()
    }

    pub fn set_input_symbols(&mut self, symbols: Option<Shared<SymbolTable>>) {
        self.isymbols = symbols;
    }

    pub fn set_output_symbols(&mut self, symbols: Option<Shared<SymbolTable>>) {
        self.osymbols = symbols;
    }

    fn has_superfinal(&self, s: StateId, window: &[C::Element]) -> bool {
        window
            .first()
            .is_some_and(|e| self.compactor.unpack(s, e, ArcFlags::ILABEL).ilabel == NO_LABEL)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, ArcCache<W>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Materialises state `s` in the arc cache and returns it.
    pub fn expand(&self, s: StateId) -> CachedState<W> {
        let mut cache = self.lock_cache();
        if let Some(state) = cache.get(s) {
            return state.clone();
        }
        let window = self.store.window(s);
        let mut final_weight = W::zero();
        let mut arcs = Vec::with_capacity(window.len());
        for element in window {
            let arc = self.compactor.unpack(s, element, ArcFlags::VALUE);
            if arc.ilabel == NO_LABEL {
                final_weight = arc.weight;
            } else {
                arcs.push(arc);
            }
        }
        let state = CachedState {
            final_weight,
            arcs: arcs.into(),
        };
        cache.insert(s, state.clone());
        state
    }

    /// Arcs of `s` through the cache.
    pub fn cached_arcs(&self, s: StateId) -> Shared<[Arc<W>]> {
        self.expand(s).arcs
    }

    pub fn is_cached(&self, s: StateId) -> bool {
        self.lock_cache().get(s).is_some()
    }

    /// Number of states currently cached.
    pub fn num_cached_states(&self) -> usize {
        self.lock_cache().len()
    }

    /// Reads a compact FST from `src`, positioned at the file header.
    ///
    /// With [`ReadMode::Map`] and an aligned file, arrays are borrowed from
    /// the source's bytes; otherwise they are copied.
    pub fn read<S: ByteSource>(src: &mut S, opts: &FstReadOptions) -> Result<Self, FstError> {
        let source = opts.source.as_str();
        let mut header = FstHeader::read(src, source)?;
        if header.version < MIN_FILE_VERSION {
            return Err(FstError::BadHeader(format!(
                "{source}: file version {} is older than {MIN_FILE_VERSION}",
                header.version
            )));
        }
        if header.version == ALIGNED_FILE_VERSION && !header.is_aligned() {
            warn!(source, "file version {ALIGNED_FILE_VERSION} read as aligned");
            header.flags |= IS_ALIGNED;
        }
        let fst_type = Self::type_name();
        if header.fst_type != fst_type {
            return Err(FstError::BadHeader(format!(
                "{source}: FST type {:?} is not {fst_type:?}",
                header.fst_type
            )));
        }
        if header.arc_type != W::arc_type() {
            return Err(FstError::BadHeader(format!(
                "{source}: arc type {:?} is not {:?}",
                header.arc_type,
                W::arc_type()
            )));
        }
        if header.num_states > i64::from(StateId::MAX)
            || (header.start != i64::from(NO_STATE)
                && !(0..header.num_states).contains(&header.start))
        {
            return Err(FstError::BadHeader(format!(
                "{source}: start {} outside {} states",
                header.start, header.num_states
            )));
        }

        let (isymbols, osymbols) = read_symbols(src, &header)?;
        let compactor = C::read(src)?;
        let mode = match opts.mode {
            ReadMode::Map if header.is_aligned() => ReadMode::Map,
            ReadMode::Map => {
                warn!(source, "unaligned file cannot be mapped, copying arrays");
                ReadMode::Read
            }
            ReadMode::Read => ReadMode::Read,
        };
        let store = CompactStore::read(src, &header, C::ARITY, mode).inspect_err(|err| {
            if matches!(err, FstError::Alignment(_)) {
                error!(source, %err, "alignment failed");
            }
        })?;
        debug!(
            source,
            %fst_type,
            version = header.version,
            num_states = store.num_states(),
            mapped = store.is_mapped(),
            "read compact FST"
        );
        Ok(Self::assemble(
            Shared::new(compactor),
            Shared::new(store),
            header.properties,
            isymbols,
            osymbols,
        ))
    }

    /// Opens the file at `path`, memory-mapping it with [`ReadMode::Map`].
    pub fn open(path: impl AsRef<Path>, mode: ReadMode) -> Result<Self, FstError> {
        let path = path.as_ref();
        let opts = FstReadOptions::new(path.display().to_string(), mode);
        match mode {
            ReadMode::Map => Self::read(&mut MappedSource::open(path)?, &opts),
            ReadMode::Read => {
                let file = BufReader::new(File::open(path)?);
                Self::read(&mut StreamSource::new(file), &opts)
            }
        }
    }

    /// Serializes the header, symbol tables, compactor payload and store.
    pub fn write<Wr: Write>(&self, sink: Wr, opts: &FstWriteOptions) -> Result<(), FstError> {
        if self.error.is_some() {
            return Err(FstError::PropagatedError);
        }
        let mut w = FstWriter::new(sink);
        let (isymbols, osymbols) =
            select_symbols(opts, self.isymbols.as_deref(), self.osymbols.as_deref());
        let header = file_header::<W>(
            &self.fst_type,
            opts,
            self.properties,
            self.start(),
            (self.num_states(), self.store.num_arcs()),
            (isymbols.is_some(), osymbols.is_some()),
        );
        header.write(&mut w)?;
        write_symbols(&mut w, isymbols, osymbols)?;
        self.compactor.write(&mut w)?;
        self.store.write(&mut w, opts.align)?;
        w.flush()?;
        debug!(
            source = %opts.source,
            align = opts.align,
            bytes = w.position(),
            "wrote compact FST"
        );
        Ok(())
    }

    pub fn write_file(&self, path: impl AsRef<Path>, opts: &FstWriteOptions) -> Result<(), FstError> {
        let file = File::create(path)?;
        self.write(BufWriter::new(file), opts)
    }

    /// Writes `fst` in this compact format without building a store.
    ///
    /// A first pass counts states and arcs and shows every arc to a copy of
    /// `compactor` whose payload is then written; when `fst` already is a
    /// compact FST of this type its counts and compactor are reused. The
    /// second pass packs with `compactor`. The bytes equal those of
    /// `CompactFst::from_fst(fst, compactor).write(..)`.
    pub fn write_fst<F, Wr>(
        fst: &F,
        compactor: &C,
        sink: Wr,
        opts: &FstWriteOptions,
    ) -> Result<(), FstError>
    where
        F: Fst<W> + 'static,
        Wr: Write,
    {
        Self::check_source(fst, compactor)?;
        let num_states = fst.num_states();
        let source: &dyn Any = fst;
        let (first_pass, num_arcs, num_compacts) = match source.downcast_ref::<Self>() {
            Some(compact) => (
                (*compact.compactor).clone(),
                compact.store.num_arcs(),
                compact.store.num_compacts(),
            ),
            None => {
                let mut first_pass = compactor.clone();
                let mut num_arcs = 0;
                let mut num_finals = 0;
                for s in fst.states() {
                    let final_weight = fst.final_weight(s);
                    let is_final = !final_weight.is_zero();
                    if is_final {
                        first_pass.prepare(s, &Arc::superfinal(final_weight));
                        num_finals += 1;
                    }
                    let mut state_arcs = 0;
                    for arc in fst.arcs(s) {
                        first_pass.prepare(s, &arc);
                        state_arcs += 1;
                    }
                    check_window::<W, C>(s, state_arcs + usize::from(is_final))?;
                    num_arcs += state_arcs;
                }
                (first_pass, num_arcs, num_arcs + num_finals)
            }
        };
        match C::ARITY {
            Arity::Fixed(k) if num_compacts != k * num_states => {
                error!(compactor = C::TAG, num_compacts, num_states, "compactor incompatible with FST");
                return Err(FstError::IncompatibleCompactor(format!(
                    "{num_compacts} entries do not fill {num_states} states of {k}"
                )));
            }
            Arity::Variable => {
                to_index::<U>(num_compacts)?;
            }
            Arity::Fixed(_) => {}
        }

        let mut w = FstWriter::new(sink);
        let (isymbols, osymbols) = select_symbols(
            opts,
            fst.input_symbols().map(|t| &**t),
            fst.output_symbols().map(|t| &**t),
        );
        let properties = test_properties(fst, COPY_PROPERTIES) | C::PROPERTIES | EXPANDED;
        let header = file_header::<W>(
            &Self::type_name(),
            opts,
            properties,
            fst.start(),
            (num_states, num_arcs),
            (isymbols.is_some(), osymbols.is_some()),
        );
        header.write(&mut w)?;
        write_symbols(&mut w, isymbols, osymbols)?;
        first_pass.write(&mut w)?;

        if C::ARITY.is_variable() {
            if opts.align {
                w.align(ARCH_ALIGNMENT)?;
            }
            let mut offset = 0usize;
            for s in fst.states() {
                w.write_value(&to_index::<U>(offset)?)?;
                offset += fst.num_arcs(s) + usize::from(fst.is_final(s));
            }
            w.write_value(&to_index::<U>(offset)?)?;
        }
        if opts.align {
            w.align(ARCH_ALIGNMENT)?;
        }
        for s in fst.states() {
            let final_weight = fst.final_weight(s);
            if !final_weight.is_zero() {
                w.write_value(&compactor.pack(s, &Arc::superfinal(final_weight)))?;
            }
            for arc in fst.arcs(s) {
                w.write_value(&compactor.pack(s, &arc))?;
            }
        }
        w.flush()?;
        debug!(source = %opts.source, num_states, num_arcs, "wrote FST in compact format");
        Ok(())
    }
}

/// Symbol tables that `opts` asks to be written.
fn select_symbols<'a>(
    opts: &FstWriteOptions,
    isymbols: Option<&'a SymbolTable>,
    osymbols: Option<&'a SymbolTable>,
) -> (Option<&'a SymbolTable>, Option<&'a SymbolTable>) {
    (
        isymbols.filter(|_| opts.write_isymbols),
        osymbols.filter(|_| opts.write_osymbols),
    )
}

fn file_header<W: Semiring>(
    fst_type: &str,
    opts: &FstWriteOptions,
    properties: u64,
    start: StateId,
    (num_states, num_arcs): (usize, usize),
    (has_isymbols, has_osymbols): (bool, bool),
) -> FstHeader {
    let mut flags = 0;
    if opts.align {
        flags |= IS_ALIGNED;
    }
    if has_isymbols {
        flags |= HAS_ISYMBOLS;
    }
    if has_osymbols {
        flags |= HAS_OSYMBOLS;
    }
    FstHeader {
        fst_type: fst_type.to_string(),
        arc_type: W::arc_type().to_string(),
        version: if opts.align {
            ALIGNED_FILE_VERSION
        } else {
            FILE_VERSION
        },
        flags,
        properties,
        start: i64::from(start),
        num_states: num_states as i64,
        num_arcs: num_arcs as i64,
    }
}

impl<W: Semiring, C: Compactor<W>, U: CompactIndex> Fst<W> for CompactFst<W, C, U> {
    type Arcs<'a>
        = ArcIterator<'a, W, C>
    where
        Self: 'a;

    fn start(&self) -> StateId {
        self.store.start()
    }

    fn final_weight(&self, s: StateId) -> W {
        match self.store.window(s).first() {
            Some(element) => {
                let arc = self
                    .compactor
                    .unpack(s, element, ArcFlags::ILABEL | ArcFlags::WEIGHT);
                if arc.ilabel == NO_LABEL {
                    arc.weight
                } else {
                    W::zero()
                }
            }
            None => W::zero(),
        }
    }

    fn num_states(&self) -> usize {
        self.store.num_states()
    }

    fn num_arcs(&self, s: StateId) -> usize {
        let window = self.store.window(s);
        window.len() - usize::from(self.has_superfinal(s, window))
    }

    fn arcs(&self, s: StateId) -> ArcIterator<'_, W, C> {
        let sorted = self.properties & I_LABEL_SORTED != 0;
        ArcIterator::new(&*self.compactor, s, self.store.window(s), sorted)
    }

    fn properties(&self) -> u64 {
        self.properties
    }

    fn fst_type(&self) -> &str {
        &self.fst_type
    }

    fn input_symbols(&self) -> Option<&Shared<SymbolTable>> {
        self.isymbols.as_ref()
    }

    fn output_symbols(&self) -> Option<&Shared<SymbolTable>> {
        self.osymbols.as_ref()
    }

    fn num_input_epsilons(&self, s: StateId) -> usize {
        let sorted = self.properties & I_LABEL_SORTED != 0;
        count_epsilons(&*self.compactor, s, self.store.window(s), false, sorted)
    }

    fn num_output_epsilons(&self, s: StateId) -> usize {
        let sorted = self.properties & O_LABEL_SORTED != 0;
        count_epsilons(&*self.compactor, s, self.store.window(s), true, sorted)
    }
}

impl<W: Semiring, C: Compactor<W>, U: CompactIndex> Clone for CompactFst<W, C, U> {
    fn clone(&self) -> Self {
        let options = self.lock_cache().options();
        Self {
            compactor: Shared::clone(&self.compactor),
            store: Shared::clone(&self.store),
            properties: self.properties,
            fst_type: self.fst_type.clone(),
            isymbols: self.isymbols.clone(),
            osymbols: self.osymbols.clone(),
            error: self.error.clone(),
            cache: Mutex::new(ArcCache::new(options)),
        }
    }
}

impl<W: Semiring, C: Compactor<W>, U: CompactIndex> std::fmt::Debug for CompactFst<W, C, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompactFst")
            .field("fst_type", &self.fst_type)
            .field("num_states", &self.store.num_states())
            .field("num_arcs", &self.store.num_arcs())
            .field("properties", &format_args!("{:#x}", self.properties))
            .field("mapped", &self.store.is_mapped())
            .field("error", &self.error)
            .finish()
    }
}
