use bitflags::bitflags;

/// The primitive operator taxonomy. Every operator is registered as an
/// `Axiom` with a curried Π-type (flags → width → shape → operands) and a
/// normalizer from the normalize module; the enums here only index the
/// world's operator tables and name the folds.

bitflags! {
    /// Wrap flags of the wrap-aware integer operators.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct WFlags : u64 {
        const NSW = 1 << 0;
        const NUW = 1 << 1;
    }
}

bitflags! {
    /// Fast-math flags of the float operators, LLVM-style.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct FFlags : u64 {
        const NNAN     = 1 << 0;
        const NINF     = 1 << 1;
        const NSZ      = 1 << 2;
        const ARCP     = 1 << 3;
        const CONTRACT = 1 << 4;
        const AFN      = 1 << 5;
        const REASSOC  = 1 << 6;
    }
}

/// Integer operators that might wrap and, hence, take `WFlags`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WOp { Add, Sub, Mul, Shl }

/// Integer operators threaded through an M token because they might produce
/// a "division by zero" side effect.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ZOp { Sdiv, Udiv, Smod, Umod }

/// Integer operators that neither take wrap flags nor produce side effects.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IOp { Ashr, Lshr, Iand, Ior, Ixor }

/// Float operators; all of them take `FFlags`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FOp { Fadd, Fsub, Fmul, Fdiv, Fmod }

/// Cross- and same-family casts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Cast { Scast, Ucast, Fcast, S2f, U2f, F2s, F2u }

pub const NUM_WOP : usize = 4;
pub const NUM_ZOP : usize = 4;
pub const NUM_IOP : usize = 5;
pub const NUM_FOP : usize = 5;
pub const NUM_CAST : usize = 7;
pub const NUM_ICMP : usize = 32;
pub const NUM_FCMP : usize = 16;

pub const ALL_WOP : [WOp; NUM_WOP] = [WOp::Add, WOp::Sub, WOp::Mul, WOp::Shl];
pub const ALL_ZOP : [ZOp; NUM_ZOP] = [ZOp::Sdiv, ZOp::Udiv, ZOp::Smod, ZOp::Umod];
pub const ALL_IOP : [IOp; NUM_IOP] = [IOp::Ashr, IOp::Lshr, IOp::Iand, IOp::Ior, IOp::Ixor];
pub const ALL_FOP : [FOp; NUM_FOP] = [FOp::Fadd, FOp::Fsub, FOp::Fmul, FOp::Fdiv, FOp::Fmod];
pub const ALL_CAST : [Cast; NUM_CAST] =
    [Cast::Scast, Cast::Ucast, Cast::Fcast, Cast::S2f, Cast::U2f, Cast::F2s, Cast::F2u];

/// Integer comparison key. Five independent relations, one bit each :
/// PM ("plus minus" : lhs non-negative, rhs negative when read signed),
/// MP (the mirror image), G (greater, same sign), L (less, same sign),
/// E (equal). The 32 predicates are all the subsets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ICmp(pub u8);

impl ICmp {
    pub const E : u8 = 1 << 0;
    pub const L : u8 = 1 << 1;
    pub const G : u8 = 1 << 2;
    pub const MP : u8 = 1 << 3;
    pub const PM : u8 = 1 << 4;

    pub const F : ICmp = ICmp(0);
    pub const T : ICmp = ICmp(31);
    pub const EQ : ICmp = ICmp(ICmp::E);
    pub const NE : ICmp = ICmp(31 ^ ICmp::E);
    pub const SL : ICmp = ICmp(ICmp::MP | ICmp::L);
    pub const SLE : ICmp = ICmp(ICmp::MP | ICmp::L | ICmp::E);
    pub const SG : ICmp = ICmp(ICmp::PM | ICmp::G);
    pub const SGE : ICmp = ICmp(ICmp::PM | ICmp::G | ICmp::E);
    pub const UL : ICmp = ICmp(ICmp::PM | ICmp::L);
    pub const ULE : ICmp = ICmp(ICmp::PM | ICmp::L | ICmp::E);
    pub const UG : ICmp = ICmp(ICmp::MP | ICmp::G);
    pub const UGE : ICmp = ICmp(ICmp::MP | ICmp::G | ICmp::E);
}

/// Float comparison key : U (unordered), G, L, E; the 16 predicates are all
/// the subsets.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FCmp(pub u8);

impl FCmp {
    pub const E : u8 = 1 << 0;
    pub const L : u8 = 1 << 1;
    pub const G : u8 = 1 << 2;
    pub const U : u8 = 1 << 3;

    pub const F : FCmp = FCmp(0);
    pub const T : FCmp = FCmp(15);
    pub const OEQ : FCmp = FCmp(FCmp::E);
    pub const OLT : FCmp = FCmp(FCmp::L);
    pub const OGT : FCmp = FCmp(FCmp::G);
    pub const ONE : FCmp = FCmp(FCmp::G | FCmp::L);
    pub const UNO : FCmp = FCmp(FCmp::U);
    pub const UEQ : FCmp = FCmp(FCmp::U | FCmp::E);
}

/// Axiom names of the 32 integer predicates, indexed by bit key
/// (PM MP G L E, E least significant).
pub const ICMP_NAMES : [&str; NUM_ICMP] = [
    "icmp_f",    //  o  o o o o - always false
    "icmp_e",    //  o  o o o x - equal
    "icmp_l",    //  o  o o x o - less (same sign)
    "icmp_le",   //  o  o o x x - less or equal
    "icmp_g",    //  o  o x o o - greater (same sign)
    "icmp_ge",   //  o  o x o x - greater or equal
    "icmp_gl",   //  o  o x x o - greater or less
    "icmp_gle",  //  o  o x x x - greater or less or equal == same sign
    "icmp_mp",   //  o  x o o o - minus plus
    "icmp_mpe",  //  o  x o o x - minus plus or equal
    "icmp_sl",   //  o  x o x o - signed less
    "icmp_sle",  //  o  x o x x - signed less or equal
    "icmp_ug",   //  o  x x o o - unsigned greater
    "icmp_uge",  //  o  x x o x - unsigned greater or equal
    "icmp_mpgl", //  o  x x x o - minus plus or greater or less
    "icmp_npm",  //  o  x x x x - not plus minus
    "icmp_pm",   //  x  o o o o - plus minus
    "icmp_pme",  //  x  o o o x - plus minus or equal
    "icmp_ul",   //  x  o o x o - unsigned less
    "icmp_ule",  //  x  o o x x - unsigned less or equal
    "icmp_sg",   //  x  o x o o - signed greater
    "icmp_sge",  //  x  o x o x - signed greater or equal
    "icmp_pmgl", //  x  o x x o - greater or less or plus minus
    "icmp_nmp",  //  x  o x x x - not minus plus
    "icmp_ds",   //  x  x o o o - different sign
    "icmp_dse",  //  x  x o o x - different sign or equal
    "icmp_sul",  //  x  x o x o - signed or unsigned less
    "icmp_sule", //  x  x o x x - signed or unsigned less or equal == not greater
    "icmp_sug",  //  x  x x o o - signed or unsigned greater
    "icmp_suge", //  x  x x o x - signed or unsigned greater or equal == not less
    "icmp_ne",   //  x  x x x o - not equal
    "icmp_t",    //  x  x x x x - always true
];

/// Axiom names of the 16 float predicates, indexed by bit key
/// (U G L E, E least significant).
pub const FCMP_NAMES : [&str; NUM_FCMP] = [
    "fcmp_f",   // o o o o - always false
    "fcmp_e",   // o o o x - ordered and equal
    "fcmp_l",   // o o x o - ordered and less
    "fcmp_le",  // o o x x - ordered and less or equal
    "fcmp_g",   // o x o o - ordered and greater
    "fcmp_ge",  // o x o x - ordered and greater or equal
    "fcmp_ne",  // o x x o - ordered and not equal
    "fcmp_o",   // o x x x - ordered (no NaNs)
    "fcmp_u",   // x o o o - unordered (either NaNs)
    "fcmp_ue",  // x o o x - unordered or equal
    "fcmp_ul",  // x o x o - unordered or less
    "fcmp_ule", // x o x x - unordered or less or equal
    "fcmp_ug",  // x x o o - unordered or greater
    "fcmp_uge", // x x o x - unordered or greater or equal
    "fcmp_une", // x x x o - unordered or not equal
    "fcmp_t",   // x x x x - always true
];

impl WOp {
    pub fn str(self) -> &'static str {
        match self {
            WOp::Add => "add",
            WOp::Sub => "sub",
            WOp::Mul => "mul",
            WOp::Shl => "shl",
        }
    }

    pub fn is_commutative(self) -> bool {
        match self {
            WOp::Add | WOp::Mul => true,
            _ => false,
        }
    }
}

impl ZOp {
    pub fn str(self) -> &'static str {
        match self {
            ZOp::Sdiv => "sdiv",
            ZOp::Udiv => "udiv",
            ZOp::Smod => "smod",
            ZOp::Umod => "umod",
        }
    }
}

impl IOp {
    pub fn str(self) -> &'static str {
        match self {
            IOp::Ashr => "ashr",
            IOp::Lshr => "lshr",
            IOp::Iand => "iand",
            IOp::Ior => "ior",
            IOp::Ixor => "ixor",
        }
    }

    pub fn is_commutative(self) -> bool {
        match self {
            IOp::Iand | IOp::Ior | IOp::Ixor => true,
            _ => false,
        }
    }
}

impl FOp {
    pub fn str(self) -> &'static str {
        match self {
            FOp::Fadd => "fadd",
            FOp::Fsub => "fsub",
            FOp::Fmul => "fmul",
            FOp::Fdiv => "fdiv",
            FOp::Fmod => "fmod",
        }
    }

    pub fn is_commutative(self) -> bool {
        match self {
            FOp::Fadd | FOp::Fmul => true,
            _ => false,
        }
    }
}

impl Cast {
    pub fn str(self) -> &'static str {
        match self {
            Cast::Scast => "scast",
            Cast::Ucast => "ucast",
            Cast::Fcast => "fcast",
            Cast::S2f => "s2f",
            Cast::U2f => "u2f",
            Cast::F2s => "f2s",
            Cast::F2u => "f2u",
        }
    }
}

/// The integer widths every integer operator is parametrized by.
pub const INT_WIDTHS : [u64; 4] = [8, 16, 32, 64];
/// The float widths; width 16 is carried through the type system but its
/// literals are never folded.
pub const FLOAT_WIDTHS : [u64; 3] = [16, 32, 64];
