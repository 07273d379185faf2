// Semiring weights: the algebra arc weights live in.
// Origin: float-weight.h, weight.h

use std::fmt::Debug;

use bytemuck::{Pod, Zeroable};

use crate::FstError;
use crate::config::WeightConfig;

/// Default quantization and comparison tolerance.
pub const DELTA: f32 = 1.0 / 1024.0;

/// `Plus` distributes over `Times` from the left.
pub const LEFT_SEMIRING: u64 = 0x01;
/// `Plus` distributes over `Times` from the right.
pub const RIGHT_SEMIRING: u64 = 0x02;
/// Both left and right semiring.
pub const SEMIRING: u64 = LEFT_SEMIRING | RIGHT_SEMIRING;
/// `Times` is commutative.
pub const COMMUTATIVE: u64 = 0x04;
/// `Plus` is idempotent: `a + a == a`.
pub const IDEMPOTENT: u64 = 0x08;
/// `Plus` always returns one of its arguments.
pub const PATH: u64 = 0x10;

/// A weight algebra.
///
/// Weights are plain-old-data so that packed arc elements containing them can
/// be written to and borrowed from files without conversion.
pub trait Semiring: Pod + Debug + PartialEq + Send + Sync + 'static {
    /// Identity of `plus`, annihilator of `times`.
    fn zero() -> Self;
    /// Identity of `times`.
    fn one() -> Self;
    /// A value outside the semiring, produced by invalid operations.
    fn no_weight() -> Self;

    fn plus(&self, rhs: &Self) -> Self;
    fn times(&self, rhs: &Self) -> Self;

    /// Whether the value belongs to the semiring.
    fn member(&self) -> bool;

    /// Equality within `delta`.
    fn approx_eq(&self, rhs: &Self, delta: f32) -> bool;

    /// Rounds the weight to a multiple of `delta`.
    fn quantize(&self, delta: f32) -> Self;

    /// Algebraic properties (`LEFT_SEMIRING`, `COMMUTATIVE`, ...).
    fn properties() -> u64;

    /// Name of the weight type.
    fn weight_type() -> &'static str;

    /// Name of the arc type over this weight, persisted in FST headers.
    fn arc_type() -> &'static str;

    /// Formats the weight as text.
    fn to_text(&self, config: &WeightConfig) -> String;

    /// Parses a weight from text.
    fn parse_text(text: &str, config: &WeightConfig) -> Result<Self, FstError>;

    #[inline]
    fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    #[inline]
    fn is_one(&self) -> bool {
        *self == Self::one()
    }
}

fn float_to_text(value: f32, config: &WeightConfig) -> String {
    if value == f32::INFINITY {
        "Infinity".to_string()
    } else if value == f32::NEG_INFINITY {
        "-Infinity".to_string()
    } else if value.is_nan() {
        "BadNumber".to_string()
    } else {
        let text = format!("{:.*}", config.precision, value);
        // Trim trailing zeros the way `%g` would.
        if text.contains('.') {
            text.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            text
        }
    }
}

fn float_from_text(text: &str) -> Result<f32, FstError> {
    match text.trim() {
        "Infinity" | "inf" | "INF" => Ok(f32::INFINITY),
        "-Infinity" | "-inf" | "-INF" => Ok(f32::NEG_INFINITY),
        t => t
            .parse::<f32>()
            .map_err(|_| FstError::InvalidWeight(format!("cannot parse {t:?}"))),
    }
}

fn float_approx_eq(a: f32, b: f32, delta: f32) -> bool {
    a == b || (a <= b + delta && b <= a + delta)
}

fn float_quantize(value: f32, delta: f32) -> f32 {
    if value.is_infinite() || value.is_nan() {
        value
    } else {
        (value / delta + 0.5).floor() * delta
    }
}

/// Tropical semiring: `(min, +, inf, 0)`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TropicalWeight(pub f32);

impl TropicalWeight {
    pub fn new(value: f32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Semiring for TropicalWeight {
    fn zero() -> Self {
        Self(f32::INFINITY)
    }

    fn one() -> Self {
        Self(0.0)
    }

    fn no_weight() -> Self {
        Self(f32::NAN)
    }

    fn plus(&self, rhs: &Self) -> Self {
        if !self.member() || !rhs.member() {
            return Self::no_weight();
        }
        if self.0 < rhs.0 { *self } else { *rhs }
    }

    fn times(&self, rhs: &Self) -> Self {
        if !self.member() || !rhs.member() {
            return Self::no_weight();
        }
        if self.0 == f32::INFINITY || rhs.0 == f32::INFINITY {
            return Self::zero();
        }
        Self(self.0 + rhs.0)
    }

    fn member(&self) -> bool {
        !self.0.is_nan() && self.0 != f32::NEG_INFINITY
    }

    fn approx_eq(&self, rhs: &Self, delta: f32) -> bool {
        float_approx_eq(self.0, rhs.0, delta)
    }

    fn quantize(&self, delta: f32) -> Self {
        Self(float_quantize(self.0, delta))
    }

    fn properties() -> u64 {
        SEMIRING | COMMUTATIVE | IDEMPOTENT | PATH
    }

    fn weight_type() -> &'static str {
        "tropical"
    }

    fn arc_type() -> &'static str {
        "standard"
    }

    fn to_text(&self, config: &WeightConfig) -> String {
        float_to_text(self.0, config)
    }

    fn parse_text(text: &str, _config: &WeightConfig) -> Result<Self, FstError> {
        float_from_text(text).map(Self)
    }
}

/// Log semiring: `(-log(e^-a + e^-b), +, inf, 0)`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LogWeight(pub f32);

impl LogWeight {
    pub fn new(value: f32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl Semiring for LogWeight {
    fn zero() -> Self {
        Self(f32::INFINITY)
    }

    fn one() -> Self {
        Self(0.0)
    }

    fn no_weight() -> Self {
        Self(f32::NAN)
    }

    fn plus(&self, rhs: &Self) -> Self {
        if !self.member() || !rhs.member() {
            return Self::no_weight();
        }
        let (a, b) = (self.0, rhs.0);
        if a == f32::INFINITY {
            return *rhs;
        }
        if b == f32::INFINITY {
            return *self;
        }
        // -log(e^-a + e^-b) = min(a, b) - log(1 + e^-|a - b|)
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        Self(lo - (-(hi - lo)).exp().ln_1p())
    }

    fn times(&self, rhs: &Self) -> Self {
        if !self.member() || !rhs.member() {
            return Self::no_weight();
        }
        if self.0 == f32::INFINITY || rhs.0 == f32::INFINITY {
            return Self::zero();
        }
        Self(self.0 + rhs.0)
    }

    fn member(&self) -> bool {
        !self.0.is_nan() && self.0 != f32::NEG_INFINITY
    }

    fn approx_eq(&self, rhs: &Self, delta: f32) -> bool {
        float_approx_eq(self.0, rhs.0, delta)
    }

    fn quantize(&self, delta: f32) -> Self {
        Self(float_quantize(self.0, delta))
    }

    fn properties() -> u64 {
        SEMIRING | COMMUTATIVE
    }

    fn weight_type() -> &'static str {
        "log"
    }

    fn arc_type() -> &'static str {
        "log"
    }

    fn to_text(&self, config: &WeightConfig) -> String {
        float_to_text(self.0, config)
    }

    fn parse_text(text: &str, _config: &WeightConfig) -> Result<Self, FstError> {
        float_from_text(text).map(Self)
    }
}

const _: () = assert!(size_of::<TropicalWeight>() == 4);
const _: () = assert!(size_of::<LogWeight>() == 4);
