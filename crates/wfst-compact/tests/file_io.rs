//! Serialization of compact FSTs: streams, files, memory mappings and the
//! direct write path.

mod common;

use common::{XorShift, assert_same_fst, random_fst};
use tempfile::TempDir;
use wfst_compact::compact_fst::{ALIGNED_FILE_VERSION, FILE_VERSION};
use wfst_compact::{
    AcceptorCompactor, CompactFst, CompactIndex, Compactor, StdCompactAcceptorFst,
    StdCompactStringFst, StdCompactUnweightedFst, StringCompactor, UnweightedCompactor,
};
use wfst_core::header::{FstHeader, IS_ALIGNED};
use wfst_core::io::{FstReadOptions, FstWriteOptions, ReadMode, StreamSource};
use wfst_core::properties::{ACCEPTOR, ERROR};
use wfst_core::{Arc, Fst, FstError, Semiring, TropicalWeight, VectorFst};

type T = TropicalWeight;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_bytes<C: Compactor<T>, U: CompactIndex>(
    fst: &CompactFst<T, C, U>,
    opts: &FstWriteOptions,
) -> Vec<u8> {
    let mut bytes = Vec::new();
    fst.write(&mut bytes, opts).expect("write to memory");
    bytes
}

fn from_bytes<C: Compactor<T>, U: CompactIndex>(bytes: &[u8]) -> Result<CompactFst<T, C, U>, FstError> {
    CompactFst::read(&mut StreamSource::new(bytes), &FstReadOptions::default())
}

/// Three states, arcs `0 -a/w1-> 1 -b/w2-> 2`, final weight w3 on 2.
fn weighted_chain() -> VectorFst<T> {
    let mut fst = VectorFst::new();
    let s0 = fst.add_state();
    let s1 = fst.add_state();
    let s2 = fst.add_state();
    fst.set_start(s0);
    fst.add_arc(s0, Arc::new(1, 1, TropicalWeight(0.5), s1));
    fst.add_arc(s1, Arc::new(2, 2, TropicalWeight(1.5), s2));
    fst.set_final(s2, TropicalWeight(2.25));
    fst
}

// ---------------------------------------------------------------------------
// Round trips
// ---------------------------------------------------------------------------

#[test]
fn aligned_file_maps_without_copying() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("chain.fst");
    let src = weighted_chain();
    let fst = StdCompactAcceptorFst::try_from_fst(&src, AcceptorCompactor).unwrap();
    fst.write_file(&path, &FstWriteOptions::aligned("chain.fst")).unwrap();

    let mapped = StdCompactAcceptorFst::open(&path, ReadMode::Map).unwrap();
    assert!(mapped.store().is_mapped());
    assert_same_fst(&src, &mapped);
    assert_ne!(mapped.properties() & ACCEPTOR, 0);
    assert_eq!(mapped.arcs(1).next(), Some(Arc::new(2, 2, TropicalWeight(1.5), 2)));
    assert_eq!(mapped.final_weight(2), TropicalWeight(2.25));

    let copied = StdCompactAcceptorFst::open(&path, ReadMode::Read).unwrap();
    assert!(!copied.store().is_mapped());
    assert_same_fst(&src, &copied);
}

#[test]
fn every_option_combination_round_trips() {
    let dir = TempDir::new().unwrap();
    let mut rng = XorShift::new(0xf11e);
    for (i, align) in [false, true].into_iter().cycle().take(8).enumerate() {
        let n = 1 + rng.below(20);
        let src = random_fst(&mut rng, n, false, false, i % 3 == 0);
        let fst = StdCompactUnweightedFst::try_from_fst(&src, UnweightedCompactor).unwrap();
        let path = dir.path().join(format!("random{i}.fst"));
        let opts = FstWriteOptions {
            align,
            ..FstWriteOptions::default()
        };
        fst.write_file(&path, &opts).unwrap();
        for mode in [ReadMode::Read, ReadMode::Map] {
            let back = StdCompactUnweightedFst::open(&path, mode).unwrap();
            assert_same_fst(&src, &back);
            assert_eq!(back.properties(), fst.properties());
            assert_eq!(back.store().is_mapped(), align && mode == ReadMode::Map);
        }
    }
}

#[test]
fn wide_offsets_round_trip() {
    let mut rng = XorShift::new(64);
    let src = random_fst(&mut rng, 7, true, true, true);
    let fst = CompactFst::<T, AcceptorCompactor, u64>::try_from_fst(&src, AcceptorCompactor).unwrap();
    let bytes = to_bytes(&fst, &FstWriteOptions::aligned("wide"));
    let back: CompactFst<T, AcceptorCompactor, u64> = from_bytes(&bytes).unwrap();
    assert_eq!(back.fst_type(), "compact64_acceptor");
    assert_same_fst(&src, &back);

    // A 32-bit reader refuses the 64-bit type.
    let err = from_bytes::<AcceptorCompactor, u32>(&bytes).unwrap_err();
    assert!(matches!(err, FstError::BadHeader(_)));
}

#[test]
fn symbol_tables_follow_write_options() {
    let mut rng = XorShift::new(5);
    let src = random_fst(&mut rng, 4, false, false, false);
    let fst = StdCompactUnweightedFst::from_fst(&src, UnweightedCompactor);
    assert!(fst.input_symbols().is_some());

    let opts = FstWriteOptions {
        write_isymbols: false,
        ..FstWriteOptions::default()
    };
    let back: StdCompactUnweightedFst = from_bytes(&to_bytes(&fst, &opts)).unwrap();
    assert!(back.input_symbols().is_none());
    assert_eq!(back.output_symbols(), fst.output_symbols());
}

// ---------------------------------------------------------------------------
// Header and versions
// ---------------------------------------------------------------------------

#[test]
fn versions_follow_alignment() {
    let fst = StdCompactStringFst::from_fst(&VectorFst::linear(&[1, 2], T::one()), StringCompactor);
    let unaligned = to_bytes(&fst, &FstWriteOptions::default());
    let header = FstHeader::read(&mut StreamSource::new(unaligned.as_slice()), "unaligned").unwrap();
    assert_eq!(header.version, FILE_VERSION);
    assert!(!header.is_aligned());

    let aligned = to_bytes(&fst, &FstWriteOptions::aligned("aligned"));
    let header = FstHeader::read(&mut StreamSource::new(aligned.as_slice()), "aligned").unwrap();
    assert_eq!(header.version, ALIGNED_FILE_VERSION);
    assert_ne!(header.flags & IS_ALIGNED, 0);
}

#[test]
fn legacy_version_is_read_as_aligned() {
    let src = weighted_chain();
    let fst = StdCompactAcceptorFst::from_fst(&src, AcceptorCompactor);
    let mut bytes = to_bytes(&fst, &FstWriteOptions::aligned("legacy"));
    // Clear IS_ALIGNED; the flags word follows the magic and the version.
    bytes[8..12].copy_from_slice(&0u32.to_ne_bytes());
    let back: StdCompactAcceptorFst = from_bytes(&bytes).unwrap();
    assert_same_fst(&src, &back);
}

#[test]
fn corrupt_input_is_rejected() {
    let fst = StdCompactAcceptorFst::from_fst(&weighted_chain(), AcceptorCompactor);
    let bytes = to_bytes(&fst, &FstWriteOptions::default());

    let mut bad_magic = bytes.clone();
    bad_magic[0] ^= 0xff;
    assert!(matches!(
        from_bytes::<AcceptorCompactor, u32>(&bad_magic),
        Err(FstError::BadHeader(_))
    ));

    let mut old_version = bytes.clone();
    old_version[4..8].copy_from_slice(&0i32.to_ne_bytes());
    assert!(matches!(
        from_bytes::<AcceptorCompactor, u32>(&old_version),
        Err(FstError::BadHeader(_))
    ));

    let truncated = &bytes[..bytes.len() - 3];
    assert!(matches!(
        from_bytes::<AcceptorCompactor, u32>(truncated),
        Err(FstError::ShortRead { .. })
    ));
}

// ---------------------------------------------------------------------------
// Direct write path
// ---------------------------------------------------------------------------

#[test]
fn direct_write_matches_store_write() {
    let mut rng = XorShift::new(0xd1ec7);
    for align in [false, true] {
        let opts = FstWriteOptions {
            align,
            ..FstWriteOptions::default()
        };
        let src = random_fst(&mut rng, 13, true, true, false);
        let fst = StdCompactAcceptorFst::try_from_fst(&src, AcceptorCompactor).unwrap();
        let expected = to_bytes(&fst, &opts);

        let mut direct = Vec::new();
        StdCompactAcceptorFst::write_fst(&src, &AcceptorCompactor, &mut direct, &opts).unwrap();
        assert_eq!(direct, expected);

        // Re-compacting a compact FST reuses its counts.
        let mut again = Vec::new();
        StdCompactAcceptorFst::write_fst(&fst, &AcceptorCompactor, &mut again, &opts).unwrap();
        assert_eq!(again, expected);
    }

    let string = VectorFst::linear(&[3, 1, 4, 1, 5], T::one());
    let opts = FstWriteOptions::aligned("string");
    let mut direct = Vec::new();
    StdCompactStringFst::write_fst(&string, &StringCompactor, &mut direct, &opts).unwrap();
    let fst = StdCompactStringFst::from_fst(&string, StringCompactor);
    assert_eq!(direct, to_bytes(&fst, &opts));
}

#[test]
fn direct_write_rejects_incompatible_source() {
    let mut src = weighted_chain();
    src.add_arc(0, Arc::new(4, 5, T::one(), 2));
    let mut sink = Vec::new();
    let err = StdCompactAcceptorFst::write_fst(
        &src,
        &AcceptorCompactor,
        &mut sink,
        &FstWriteOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, FstError::IncompatibleCompactor(_)));
}

#[test]
fn fst_in_error_is_not_written() {
    let mut src = weighted_chain();
    src.add_arc(0, Arc::new(4, 5, T::one(), 2));
    let fst = StdCompactAcceptorFst::from_fst(&src, AcceptorCompactor);
    assert_ne!(fst.properties() & ERROR, 0);
    let mut sink = Vec::new();
    let err = fst.write(&mut sink, &FstWriteOptions::default()).unwrap_err();
    assert!(matches!(err, FstError::PropagatedError));
    assert!(fst.final_weight(0).is_zero());
}
