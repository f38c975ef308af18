#![forbid(unsafe_code)]

//! A hash-consed intermediate representation built on a dependently-typed
//! λ-calculus with substructural qualifiers and arities. Programs are graphs
//! of uniquely interned defs owned by a [`world::World`]; construction goes
//! through the world's factories, which normalize (β/η, constant folding,
//! algebraic simplification) before interning, so equal terms are pointer
//! (id-) equal and type errors surface as `Bottom` values rather than
//! failures.

pub mod errors;
pub mod qualifier;
pub mod bitset;
pub mod def;
pub mod tables;
pub mod fold;
pub mod world;
pub mod reduce;
pub mod check;
pub mod normalize;
pub mod import;
pub mod print;

pub use crate::bitset::BitSet;
pub use crate::def::{ Box64, Def, DefKind, NodeId, Normalizer, Sort, Use };
pub use crate::import::Importer;
pub use crate::qualifier::QualifierTag;
pub use crate::reduce::{ flatten, reduce, reduce1, shift_free_vars };
pub use crate::tables::{ Cast, FCmp, FFlags, FOp, ICmp, IOp, WFlags, WOp, ZOp };
pub use crate::world::World;
