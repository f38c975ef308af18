use std::fmt::Debug;

/// Hard failures of the construction protocol itself. Type errors inside the
/// IR never show up here; those are propagated as `Bottom` values through the
/// graph (a factory always returns a node). What's left are misuses of the
/// nominal mutation protocol and lookups that are simply out of range, which
/// callers do want to see as a `Result`.

pub type SkeinResult<T> = Result<T, SkeinErr>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkeinErr {
    BadIndexErr(&'static str, u32, usize),
    NotNominalErr(&'static str, u32),
    OpAlreadySetErr(&'static str, u32, usize),
    OpNotSetErr(&'static str, u32, usize),
    NotPiErr(&'static str, u32),
    NotVariantErr(&'static str, u32),
    NoneErr(&'static str, u32, &'static str),
}

impl std::fmt::Display for SkeinErr {
    fn fmt(&self, f : &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SkeinErr::BadIndexErr(file, loc, idx) => write!(f, "Fatal error at {} line {}; tried to get operand {}, which doesn't exist.\n", file, loc, idx),
            SkeinErr::NotNominalErr(file, loc) => write!(f, "Fatal error at {} line {}; operand mutation is only defined for nominal defs, but the def was structural.\n", file, loc),
            SkeinErr::OpAlreadySetErr(file, loc, idx) => write!(f, "Fatal error at {} line {}; operand {} of a nominal def was set twice.\n", file, loc, idx),
            SkeinErr::OpNotSetErr(file, loc, idx) => write!(f, "Fatal error at {} line {}; operand {} of a nominal def was read before being set.\n", file, loc, idx),
            SkeinErr::NotPiErr(file, loc) => write!(f, "Fatal error at {} line {}; expected a Pi type.\n", file, loc),
            SkeinErr::NotVariantErr(file, loc) => write!(f, "Fatal error at {} line {}; expected a Variant type.\n", file, loc),
            SkeinErr::NoneErr(file, loc, msg) => write!(f, "Fatal error (None err) at {} line {}; {}\n", file, loc, msg),
        }
    }
}

impl std::error::Error for SkeinErr {}

pub fn err_bad_rebuild<T : Debug>(loc : u32, owise : &T) -> ! {
    panic!("world line {}; rebuild is not defined for this def kind : {:?}\n", loc, owise)
}
