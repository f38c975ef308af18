/// The substructural qualifier lattice :
///```pseudo
///       Linear
///       /    \
///   Affine  Relevant
///       \    /
///      Unlimited
///```
/// Linear is the largest element of the partial order, Unlimited the
/// smallest. The two middle points are encoded as single bits so that
/// join is bitwise-or and meet is bitwise-and.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum QualifierTag {
    Unlimited = 0,
    Relevant  = 1,
    Affine    = 2,
    Linear    = 3,
}

pub const NUM_QUALIFIERS : usize = 4;

use QualifierTag::*;

impl QualifierTag {
    pub fn from_bits(bits : u8) -> Self {
        match bits & 3 {
            0 => Unlimited,
            1 => Relevant,
            2 => Affine,
            _ => Linear,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Also known as the least upper bound.
    pub fn join(self, other : Self) -> Self {
        QualifierTag::from_bits(self.bits() | other.bits())
    }

    /// Also known as the greatest lower bound.
    pub fn meet(self, other : Self) -> Self {
        QualifierTag::from_bits(self.bits() & other.bits())
    }

    /// The lattice order, NOT the declaration order of the enum. Affine and
    /// Relevant are incomparable, so this can't be a derived `Ord`.
    pub fn lt(self, other : Self) -> bool {
        if self == other {
            false
        } else if self == Unlimited {
            true
        } else {
            other == Linear
        }
    }

    pub fn leq(self, other : Self) -> bool {
        self == other || self.lt(other)
    }

    pub fn str(self) -> &'static str {
        match self {
            Unlimited => "ᵁ",
            Relevant  => "ᴿ",
            Affine    => "ᴬ",
            Linear    => "ᴸ",
        }
    }
}

impl std::fmt::Display for QualifierTag {
    fn fmt(&self, f : &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.str())
    }
}

#[cfg(test)]
mod qualifier_tests {
    use super::*;

    const ALL : [QualifierTag; 4] = [Unlimited, Relevant, Affine, Linear];

    #[test]
    fn lattice_order() {
        assert!(Unlimited.lt(Affine));
        assert!(Unlimited.lt(Relevant));
        assert!(Unlimited.lt(Linear));
        assert!(Affine.lt(Linear));
        assert!(Relevant.lt(Linear));
        assert!(!Affine.lt(Relevant));
        assert!(!Relevant.lt(Affine));
        for q in ALL.iter() {
            assert!(!q.lt(*q));
            assert!(q.leq(*q));
        }
    }

    #[test]
    fn join_meet_table() {
        assert_eq!(Unlimited.join(Unlimited), Unlimited);
        assert_eq!(Affine.join(Unlimited), Affine);
        assert_eq!(Relevant.join(Unlimited), Relevant);
        assert_eq!(Linear.join(Unlimited), Linear);
        assert_eq!(Affine.join(Affine), Affine);
        assert_eq!(Affine.join(Relevant), Linear);
        assert_eq!(Linear.join(Affine), Linear);
        assert_eq!(Linear.join(Relevant), Linear);

        assert_eq!(Linear.meet(Linear), Linear);
        assert_eq!(Linear.meet(Affine), Affine);
        assert_eq!(Affine.meet(Relevant), Unlimited);
        assert_eq!(Unlimited.meet(Linear), Unlimited);
    }

    #[test]
    fn lattice_laws() {
        for a in ALL.iter().copied() {
            for b in ALL.iter().copied() {
                // commutativity
                assert_eq!(a.join(b), b.join(a));
                assert_eq!(a.meet(b), b.meet(a));
                // absorption
                assert_eq!(a.join(a.meet(b)), a);
                assert_eq!(a.meet(a.join(b)), a);
                // idempotence
                assert_eq!(a.join(a), a);
                assert_eq!(a.meet(a), a);
                for c in ALL.iter().copied() {
                    // associativity
                    assert_eq!(a.join(b.join(c)), a.join(b).join(c));
                    assert_eq!(a.meet(b.meet(c)), a.meet(b).meet(c));
                }
            }
        }
        // U is bottom, L is top
        for a in ALL.iter().copied() {
            assert_eq!(Unlimited.join(a), a);
            assert_eq!(Linear.meet(a), a);
        }
    }
}
