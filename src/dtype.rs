//! Element types understood by the planner.
//!
//! The set is closed: every descriptor carries one of four variants and the
//! planner matches on it once, at construction.

use core::fmt;

/// Whether an element is a real scalar or an interleaved complex pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Real,
    Complex,
}

/// Floating-point precision of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    Single,
    Double,
}

impl Precision {
    /// Size in bytes of one real scalar at this precision.
    pub const fn scalar_size(self) -> usize {
        match self {
            Precision::Single => 4,
            Precision::Double => 8,
        }
    }
}

/// Element type of an array view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Real32,
    Real64,
    Complex64,
    Complex128,
}

impl DType {
    pub const fn kind(self) -> Kind {
        match self {
            DType::Real32 | DType::Real64 => Kind::Real,
            DType::Complex64 | DType::Complex128 => Kind::Complex,
        }
    }

    pub const fn is_real(self) -> bool {
        matches!(self.kind(), Kind::Real)
    }

    pub const fn precision(self) -> Precision {
        match self {
            DType::Real32 | DType::Complex64 => Precision::Single,
            DType::Real64 | DType::Complex128 => Precision::Double,
        }
    }

    /// Size of one element in bytes.
    pub const fn itemsize(self) -> usize {
        match self {
            DType::Real32 => 4,
            DType::Real64 | DType::Complex64 => 8,
            DType::Complex128 => 16,
        }
    }

    /// Complex type with the same precision.
    pub const fn to_complex(self) -> DType {
        match self.precision() {
            Precision::Single => DType::Complex64,
            Precision::Double => DType::Complex128,
        }
    }

    /// Real type with the same precision.
    pub const fn to_real(self) -> DType {
        match self.precision() {
            Precision::Single => DType::Real32,
            Precision::Double => DType::Real64,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Real32 => "real32",
            DType::Real64 => "real64",
            DType::Complex64 => "complex64",
            DType::Complex128 => "complex128",
        };
        f.write_str(name)
    }
}
