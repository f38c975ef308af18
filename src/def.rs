use smallvec::SmallVec;
use fxhash::FxHashSet;

use crate::bitset::BitSet;
use crate::qualifier::QualifierTag;
use crate::world::World;

/// Stable index of a def inside its world's arena. A `NodeId` doubles as the
/// def's `gid` : ids are handed out monotonically and are never reused, so
/// ordering by id is ordering by creation time. Cross-world ids are
/// meaningless; see the import module for moving defs between worlds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Placeholder operand of a nominal def that hasn't been set yet.
    pub(crate) const PENDING : NodeId = NodeId(u32::MAX);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn gid(self) -> u32 {
        self.0
    }
}

/// Back-edge : the def `user` refers to some def as its `index`-th operand.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Use {
    pub user : NodeId,
    pub index : usize,
}

/// A normalization rule attached to an `Axiom`. Consulted by the world on
/// every application whose callee spine ends in that axiom; returning `Some`
/// replaces the application wholesale. Receives the already-computed result
/// type, the callee and the argument.
pub type Normalizer = fn(&mut World, NodeId, NodeId, NodeId) -> Option<NodeId>;

/// The boxed payload of a `Lit` : the raw bits of an 8/16/32/64-bit integer,
/// a 16/32/64-bit float, a bool or an index, all stored zero-extended in one
/// word. The type of the `Lit` says how to read it; equality and hashing are
/// on the bits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Box64(pub u64);

impl Box64 {
    pub fn from_u64(u : u64) -> Self { Box64(u) }
    pub fn from_bool(b : bool) -> Self { Box64(b as u64) }
    pub fn from_f32(f : f32) -> Self { Box64(f.to_bits() as u64) }
    pub fn from_f64(f : f64) -> Self { Box64(f.to_bits()) }

    pub fn get_u64(self) -> u64 { self.0 }
    pub fn get_bool(self) -> bool { self.0 != 0 }
    pub fn get_f32(self) -> f32 { f32::from_bits(self.0 as u32) }
    pub fn get_f64(self) -> f64 { f64::from_bits(self.0) }
}

/// How many levels sit between a def and the Universe when walking up the
/// `ty` chain. The hierarchy is strict : `Universe ⊐ Kind ⊐ Type ⊐ Term`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sort {
    Term,
    Type,
    Kind,
    Universe,
}

/// The tag of a def together with its variant-specific payload. Operand
/// lists and the type live in the shared `Def` header; everything that takes
/// part in structural identity but is not an operand lives here.
///
/// Operand layout per variant (shift = binders introduced before that
/// operand, 0 unless noted) :
///
/// - `Star`/`ArityKind`/`MultiArityKind` : `[qualifier]`
/// - `Pi` : `[domain, codomain]`, codomain at shift 1
/// - `Lambda` : `[filter, body]`, body at shift 1 (0 when nominal)
/// - `Sigma` : `[op0 … opn]`, op i at shift i
/// - `Variadic` : `[arity, body]`, body at shift 1
/// - `Pack` : `[body]` at shift 1
/// - `Extract` : `[scrutinee, index]`; `Insert` : `[scrutinee, index, value]`
/// - `App` : `[callee, arg]`; `Match` : `[destructee, handlers…]`
/// - `Any` : `[def]` with the case position as payload
/// - `Param` : `[lambda]`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DefKind {
    Universe,
    QualifierType,
    Qualifier(QualifierTag),
    Star,
    ArityKind,
    MultiArityKind,
    Arity(u64),
    Var(u64),
    Lit(Box64),
    Axiom(Option<Normalizer>),
    Pi,
    Lambda,
    Sigma,
    Variadic,
    Pack,
    Tuple,
    Extract,
    Insert,
    Variant,
    Intersection,
    Any(u64),
    Pick,
    Match,
    Singleton,
    App,
    Param,
    Bottom,
    Top,
}

use DefKind::*;

impl DefKind {
    /// The amount to shift De Bruijn indices when descending into operand
    /// `i`. Nominal defs never shift : their operands are closed.
    pub fn shift(&self, i : usize, nominal : bool) -> usize {
        if nominal {
            return 0
        }
        match self {
            Lambda => if i == 1 { 1 } else { 0 },
            Pack => 1,
            Pi | Sigma | Variadic => i,
            _ => 0,
        }
    }

    pub fn is_kind_tag(&self) -> bool {
        match self {
            Star | ArityKind | MultiArityKind | QualifierType => true,
            _ => false,
        }
    }
}

/// The shared header of every IR node. Variant payload sits in `kind`;
/// `ty` is `None` exactly for the Universe. `ops` never grows or shrinks
/// after construction apart from the nominal set-each-slot-once protocol.
pub struct Def {
    pub(crate) kind : DefKind,
    pub(crate) ty : Option<NodeId>,
    pub(crate) ops : SmallVec<[NodeId; 2]>,
    pub(crate) free_vars : BitSet,
    pub(crate) uses : FxHashSet<Use>,
    pub(crate) substitute : Option<NodeId>,
    pub(crate) nominal : bool,
    pub(crate) contains_lambda : bool,
    pub(crate) name : Option<String>,
}

impl Def {
    pub(crate) fn new_structural(kind : DefKind, ty : Option<NodeId>, ops : SmallVec<[NodeId; 2]>) -> Self {
        Def {
            kind,
            ty,
            ops,
            free_vars : BitSet::new(),
            uses : FxHashSet::default(),
            substitute : None,
            nominal : false,
            contains_lambda : false,
            name : None,
        }
    }

    pub(crate) fn new_nominal(kind : DefKind, ty : Option<NodeId>, num_ops : usize) -> Self {
        Def {
            kind,
            ty,
            ops : std::iter::repeat(NodeId::PENDING).take(num_ops).collect(),
            free_vars : BitSet::new(),
            uses : FxHashSet::default(),
            substitute : None,
            nominal : true,
            contains_lambda : false,
            name : None,
        }
    }

    pub fn kind(&self) -> &DefKind {
        &self.kind
    }

    pub fn ty(&self) -> Option<NodeId> {
        self.ty
    }

    pub fn ops(&self) -> &[NodeId] {
        &self.ops
    }

    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    pub fn op(&self, i : usize) -> NodeId {
        self.ops[i]
    }

    pub fn free_vars(&self) -> &BitSet {
        &self.free_vars
    }

    pub fn uses(&self) -> &FxHashSet<Use> {
        &self.uses
    }

    pub fn is_nominal(&self) -> bool {
        self.nominal
    }

    pub fn is_replaced(&self) -> bool {
        self.substitute.is_some()
    }

    pub fn contains_lambda(&self) -> bool {
        self.contains_lambda
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn shift(&self, i : usize) -> usize {
        self.kind.shift(i, self.nominal)
    }
}

impl std::fmt::Debug for Def {
    fn fmt(&self, f : &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}{:?}", self.kind, self.ops.as_slice())?;
        if let Some(n) = &self.name {
            write!(f, " \"{}\"", n)?;
        }
        Ok(())
    }
}

/// Structural identity key of a def : tag + payload, type id, operand ids.
/// Two structural constructions with equal keys collapse to one interned
/// node; nominal defs and axioms never enter the table.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct InternKey {
    pub kind : DefKind,
    pub ty : Option<NodeId>,
    pub ops : SmallVec<[NodeId; 2]>,
}

#[cfg(test)]
mod def_tests {
    use super::*;

    #[test]
    fn shift_table() {
        assert_eq!(Pi.shift(0, false), 0);
        assert_eq!(Pi.shift(1, false), 1);
        assert_eq!(Lambda.shift(0, false), 0);
        assert_eq!(Lambda.shift(1, false), 1);
        assert_eq!(Lambda.shift(1, true), 0);
        assert_eq!(Pack.shift(0, false), 1);
        assert_eq!(Sigma.shift(3, false), 3);
        assert_eq!(Variadic.shift(1, false), 1);
        assert_eq!(App.shift(1, false), 0);
        assert_eq!(Tuple.shift(2, false), 0);
    }

    #[test]
    fn box_bits() {
        assert_eq!(Box64::from_bool(true).get_u64(), 1);
        assert_eq!(Box64::from_f32(1.5).get_f32(), 1.5);
        assert_eq!(Box64::from_f64(-0.25).get_f64(), -0.25);
        assert_eq!(Box64::from_u64(0xFF).get_u64(), 255);
        // equality is on bits, so 0.0 and -0.0 are distinct boxes
        assert_ne!(Box64::from_f64(0.0), Box64::from_f64(-0.0));
    }
}
