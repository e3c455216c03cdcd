use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// Handle to a node of the decision diagram.
///
/// The sign carries complementation: `-r` denotes the negation of the
/// function referenced by `r`. Index 1 is the terminal node, so `Ref(1)`
/// is the constant true and `Ref(-1)` the constant false.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ref(i32);

impl Ref {
    pub const fn positive(index: u32) -> Self {
        Self(index as i32)
    }

    pub const fn is_negated(self) -> bool {
        self.0 < 0
    }

    pub const fn negate(self) -> Self {
        Self(-self.0)
    }

    /// Return the internal signed representation.
    pub const fn get(self) -> i32 {
        self.0
    }

    /// Return the index of the referenced node.
    pub const fn index(self) -> usize {
        self.0.unsigned_abs() as usize
    }

    /// Literal-style encoding (`2 * index + sign`), injective over all refs.
    pub const fn unsigned(self) -> u32 {
        (self.0.unsigned_abs() << 1) + self.is_negated() as u32
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", if self.is_negated() { "~" } else { "" }, self.index())
    }
}
