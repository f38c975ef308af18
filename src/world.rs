use hashbrown::HashMap;
use fxhash::{ FxHashMap, FxHashSet };
use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{ debug, error };

use crate::bitset::BitSet;
use crate::def::{ Box64, Def, DefKind, InternKey, NodeId, Normalizer, Sort, Use };
use crate::errors::{ SkeinErr::*, SkeinResult };
use crate::normalize;
use crate::qualifier::QualifierTag;
use crate::reduce::{ reduce, reduce1, shift_free_vars };
use crate::tables::*;

use DefKind::*;

/// Ids of the primitive operator axioms, filled in by `World::new`. All of
/// them are ordinary axioms with normalizers attached; nothing in the core
/// treats them specially beyond these lookup tables.
pub struct OpTable {
    pub type_int : NodeId,
    pub type_float : NodeId,
    pub wop : [NodeId; NUM_WOP],
    pub zop : [NodeId; NUM_ZOP],
    pub iop : [NodeId; NUM_IOP],
    pub fop : [NodeId; NUM_FOP],
    pub icmp : [NodeId; NUM_ICMP],
    pub fcmp : [NodeId; NUM_FCMP],
    pub cast : [NodeId; NUM_CAST],
    pub arity_succ : NodeId,
}

impl OpTable {
    fn unfilled() -> Self {
        let z = NodeId(0);
        OpTable {
            type_int : z,
            type_float : z,
            wop : [z; NUM_WOP],
            zop : [z; NUM_ZOP],
            iop : [z; NUM_IOP],
            fop : [z; NUM_FOP],
            icmp : [z; NUM_ICMP],
            fcmp : [z; NUM_FCMP],
            cast : [z; NUM_CAST],
            arity_succ : z,
        }
    }
}

/// The owner of all defs. Structural defs are canonicalized through the
/// intern table keyed on (tag + payload, type, operands); nominal defs and
/// axioms are always fresh. The arena is append-only; a def's `NodeId` is
/// its position and doubles as its gid, so ids order defs by creation time.
pub struct World {
    pub(crate) defs : Vec<Def>,
    table : HashMap<InternKey, NodeId>,
    /// Memoized `App::unfold` results.
    unfolds : FxHashMap<NodeId, NodeId>,
    /// Applications of affine-or-stronger values that have already happened
    /// once. A second structural construction of the same key is a
    /// substructural violation and yields Bottom.
    consumed : FxHashSet<(NodeId, NodeId)>,
    /// Client-registered named axioms, in registration order.
    axioms : IndexMap<String, NodeId>,
    errors : Vec<String>,
    sink : Option<Box<dyn FnMut(&str)>>,
    typecheck : bool,

    universe : NodeId,
    qualifier_type : NodeId,
    unit : NodeId,
    tuple0 : NodeId,
    type_bool : NodeId,
    type_nat : NodeId,
    type_mem : NodeId,
    lit_false : NodeId,
    lit_true : NodeId,
    pub prim : OpTable,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f : &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "<world with {} defs>", self.defs.len())
    }
}

impl World {
    pub fn new() -> Self {
        let mut w = World {
            defs : Vec::with_capacity(1024),
            table : HashMap::with_capacity(1024),
            unfolds : FxHashMap::default(),
            consumed : FxHashSet::default(),
            axioms : IndexMap::new(),
            errors : Vec::new(),
            sink : None,
            typecheck : false,
            universe : NodeId(0),
            qualifier_type : NodeId(0),
            unit : NodeId(0),
            tuple0 : NodeId(0),
            type_bool : NodeId(0),
            type_nat : NodeId(0),
            type_mem : NodeId(0),
            lit_false : NodeId(0),
            lit_true : NodeId(0),
            prim : OpTable::unfilled(),
        };
        w.universe = w.intern(Universe, None, &[]);
        w.qualifier_type = w.intern(QualifierType, Some(w.universe), &[]);
        let star_u = w.star_u();
        w.unit = w.intern(Sigma, Some(star_u), &[]);
        w.tuple0 = w.intern(Tuple, Some(w.unit), &[]);
        w.type_bool = w.axiom(star_u, "bool");
        w.type_nat = w.axiom(star_u, "nat");
        w.lit_false = w.lit(w.type_bool, Box64::from_bool(false));
        w.lit_true = w.lit(w.type_bool, Box64::from_bool(true));
        let lin = w.linear();
        let star_l = w.star(lin);
        w.type_mem = w.axiom(star_l, "M");
        w.install_ops();
        w
    }

    /* -------------------------------------------------------------------- */
    /* accessors                                                            */
    /* -------------------------------------------------------------------- */

    pub fn def(&self, id : NodeId) -> &Def {
        &self.defs[id.index()]
    }

    pub fn num_defs(&self) -> usize {
        self.defs.len()
    }

    pub fn kind(&self, id : NodeId) -> &DefKind {
        &self.defs[id.index()].kind
    }

    pub fn ty(&self, id : NodeId) -> Option<NodeId> {
        self.defs[id.index()].ty
    }

    /// !! Partial function !!
    /// The type of anything but the Universe, which has none.
    pub fn ty_of(&self, id : NodeId) -> NodeId {
        match self.defs[id.index()].ty {
            Some(t) => t,
            None => panic!("the Universe has no type"),
        }
    }

    pub fn ops(&self, id : NodeId) -> &[NodeId] {
        self.defs[id.index()].ops()
    }

    pub fn op(&self, id : NodeId, i : usize) -> NodeId {
        self.defs[id.index()].op(i)
    }

    pub fn num_ops(&self, id : NodeId) -> usize {
        self.defs[id.index()].num_ops()
    }

    pub fn gid(&self, id : NodeId) -> u32 {
        id.gid()
    }

    pub fn name_of(&self, id : NodeId) -> Option<&str> {
        self.defs[id.index()].name()
    }

    pub fn is_nominal(&self, id : NodeId) -> bool {
        self.defs[id.index()].is_nominal()
    }

    pub fn free_vars(&self, id : NodeId) -> &BitSet {
        self.defs[id.index()].free_vars()
    }

    pub fn fv_any(&self, id : NodeId) -> bool {
        self.free_vars(id).any()
    }

    pub fn fv_none(&self, id : NodeId) -> bool {
        self.free_vars(id).none()
    }

    pub fn fv_test(&self, id : NodeId, i : usize) -> bool {
        self.free_vars(id).test(i)
    }

    pub fn fv_none_begin(&self, id : NodeId, begin : usize) -> bool {
        self.free_vars(id).none_begin(begin)
    }

    pub fn fv_any_end(&self, id : NodeId, end : usize) -> bool {
        self.free_vars(id).any_end(end)
    }

    pub fn shift_of(&self, id : NodeId, i : usize) -> usize {
        self.defs[id.index()].shift(i)
    }

    pub fn is_lit(&self, id : NodeId) -> bool {
        match self.kind(id) {
            Lit(..) => true,
            _ => false,
        }
    }

    pub fn lit_box(&self, id : NodeId) -> Option<Box64> {
        match self.kind(id) {
            Lit(b) => Some(*b),
            _ => None,
        }
    }

    pub fn lit_u64(&self, id : NodeId) -> Option<u64> {
        self.lit_box(id).map(|b| b.get_u64())
    }

    pub fn sort(&self, id : NodeId) -> Sort {
        if let Universe = self.kind(id) {
            return Sort::Universe
        }
        let t = self.ty_of(id);
        if let Universe = self.kind(t) {
            return Sort::Kind
        }
        let tt = self.ty_of(t);
        if let Universe = self.kind(tt) {
            return Sort::Type
        }
        debug_assert!(matches!(self.kind(self.ty_of(tt)), Universe));
        Sort::Term
    }

    pub fn is_kind(&self, id : NodeId) -> bool {
        self.sort(id) == Sort::Kind
    }

    pub fn is_type(&self, id : NodeId) -> bool {
        self.sort(id) == Sort::Type
    }

    pub fn is_term(&self, id : NodeId) -> bool {
        self.sort(id) == Sort::Term
    }

    /// Chase the forwarding pointers left behind by `replace`.
    pub fn resolve(&self, mut id : NodeId) -> NodeId {
        while let Some(s) = self.defs[id.index()].substitute {
            id = s;
        }
        id
    }

    pub fn registered_axioms(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.axioms.iter().map(|(n, id)| (n.as_str(), *id))
    }

    pub fn lookup_axiom(&self, name : &str) -> Option<NodeId> {
        self.axioms.get(name).copied()
    }

    /* -------------------------------------------------------------------- */
    /* diagnostics                                                          */
    /* -------------------------------------------------------------------- */

    pub fn enable_typecheck(&mut self, on : bool) {
        self.typecheck = on;
    }

    pub fn set_error_handler(&mut self, sink : Box<dyn FnMut(&str)>) {
        self.sink = Some(sink);
    }

    pub fn error_log(&self) -> &[String] {
        &self.errors
    }

    pub(crate) fn errorf(&mut self, msg : String) {
        error!("{}", msg);
        if let Some(sink) = &mut self.sink {
            sink(&msg);
        }
        self.errors.push(msg);
    }

    /// A type error at some position in the graph : logged, and represented
    /// in-place by the Bottom of the expected type.
    pub fn error(&mut self, ty : NodeId) -> NodeId {
        self.bottom(ty)
    }

    /* -------------------------------------------------------------------- */
    /* allocation / interning                                               */
    /* -------------------------------------------------------------------- */

    fn alloc(&mut self, def : Def) -> NodeId {
        let id = NodeId(self.defs.len() as u32);
        self.defs.push(def);
        id
    }

    pub(crate) fn intern(&mut self, kind : DefKind, ty : Option<NodeId>, ops : &[NodeId]) -> NodeId {
        let key = InternKey { kind : kind.clone(), ty, ops : SmallVec::from_slice(ops) };
        if let Some(&id) = self.table.get(&key) {
            return id
        }
        let id = self.alloc(Def::new_structural(kind, ty, SmallVec::from_slice(ops)));
        self.table.insert(key, id);
        self.finalize(id);
        id
    }

    fn alloc_nominal(&mut self, kind : DefKind, ty : Option<NodeId>, num_ops : usize, name : Option<&str>) -> NodeId {
        let mut def = Def::new_nominal(kind, ty, num_ops);
        def.name = name.map(|s| s.to_string());
        let id = self.alloc(def);
        if num_ops == 0 {
            self.finalize(id);
        }
        id
    }

    /// Runs once every operand of a def is known : registers use edges,
    /// computes the free-variable set, and (when enabled) typechecks closed
    /// defs on the spot.
    fn finalize(&mut self, id : NodeId) {
        let num = self.num_ops(id);
        let mut fv = BitSet::new();
        let mut contains_lambda = false;
        for i in 0..num {
            let op = self.op(id, i);
            debug_assert!(op != NodeId::PENDING);
            let shift = self.shift_of(id, i);
            self.defs[op.index()].uses.insert(Use { user : id, index : i });
            fv.or_assign(&self.defs[op.index()].free_vars.shr(shift));
            contains_lambda |= matches!(self.kind(op), Lambda) || self.defs[op.index()].contains_lambda;
        }
        if let Var(k) = self.kind(id) {
            fv.set(*k as usize);
        }
        if let Some(t) = self.ty(id) {
            fv.or_assign(&self.defs[t.index()].free_vars);
        }
        let nominal = self.is_nominal(id);
        if nominal && fv.any() {
            self.errorf(format!("nominal def {} must not have free variables", id.gid()));
        }
        let closed = fv.none();
        {
            let d = &mut self.defs[id.index()];
            d.free_vars = fv;
            d.contains_lambda = contains_lambda;
        }
        if self.typecheck && closed {
            crate::check::check_closed(self, id);
        }
    }

    /// Set the `i`-th operand of a nominal def. Slots are filled exactly
    /// once; filling the last one finalizes the def.
    pub fn set_op(&mut self, id : NodeId, i : usize, op : NodeId) -> SkeinResult<()> {
        if !self.is_nominal(id) {
            return Err(NotNominalErr(file!(), line!()))
        }
        if i >= self.num_ops(id) {
            return Err(BadIndexErr(file!(), line!(), i))
        }
        if self.op(id, i) != NodeId::PENDING {
            return Err(OpAlreadySetErr(file!(), line!(), i))
        }
        let op = self.check_nominal_op(id, i, op);
        self.defs[id.index()].ops[i] = op;
        if self.ops(id).iter().all(|&o| o != NodeId::PENDING) {
            self.finalize(id);
        }
        Ok(())
    }

    pub fn set_ops(&mut self, id : NodeId, ops : &[NodeId]) -> SkeinResult<()> {
        for (i, op) in ops.iter().enumerate() {
            self.set_op(id, i, *op)?;
        }
        Ok(())
    }

    /// The nominal mutation protocol still type-checks what it is given :
    /// a body whose type contradicts the declared Π/Σ slot becomes a Bottom
    /// of the declared type.
    fn check_nominal_op(&mut self, id : NodeId, i : usize, op : NodeId) -> NodeId {
        match self.kind(id) {
            Lambda if i == 1 => {
                let pi = self.ty_of(id);
                let codomain = self.op(pi, 1);
                if self.fv_none(codomain) {
                    let bt = self.ty_of(op);
                    if bt != codomain && !self.assignable(codomain, op) {
                        self.errorf(format!("nominal lambda body type does not match its codomain"));
                        return self.bottom(codomain)
                    }
                }
                op
            },
            _ => op,
        }
    }

    /* -------------------------------------------------------------------- */
    /* kinds, qualifiers, universes                                         */
    /* -------------------------------------------------------------------- */

    pub fn universe(&mut self) -> NodeId {
        self.universe
    }

    pub fn qualifier_type(&mut self) -> NodeId {
        self.qualifier_type
    }

    pub fn qualifier(&mut self, q : QualifierTag) -> NodeId {
        let qt = self.qualifier_type;
        self.intern(Qualifier(q), Some(qt), &[])
    }

    pub fn unlimited(&mut self) -> NodeId { self.qualifier(QualifierTag::Unlimited) }
    pub fn relevant(&mut self) -> NodeId { self.qualifier(QualifierTag::Relevant) }
    pub fn affine(&mut self) -> NodeId { self.qualifier(QualifierTag::Affine) }
    pub fn linear(&mut self) -> NodeId { self.qualifier(QualifierTag::Linear) }

    pub fn star(&mut self, q : NodeId) -> NodeId {
        let u = self.universe;
        self.intern(Star, Some(u), &[q])
    }

    pub fn star_u(&mut self) -> NodeId {
        let u = self.unlimited();
        self.star(u)
    }

    pub fn arity_kind(&mut self, q : NodeId) -> NodeId {
        let u = self.universe;
        self.intern(ArityKind, Some(u), &[q])
    }

    pub fn arity_kind_u(&mut self) -> NodeId {
        let u = self.unlimited();
        self.arity_kind(u)
    }

    pub fn multi_arity_kind(&mut self, q : NodeId) -> NodeId {
        let u = self.universe;
        self.intern(MultiArityKind, Some(u), &[q])
    }

    pub fn multi_arity_kind_u(&mut self) -> NodeId {
        let u = self.unlimited();
        self.multi_arity_kind(u)
    }

    pub fn is_const_qualifier(&self, id : NodeId) -> Option<QualifierTag> {
        match self.kind(id) {
            Qualifier(q) => Some(*q),
            _ => None,
        }
    }

    pub fn is_qualifier(&self, id : NodeId) -> bool {
        match self.ty(id) {
            Some(t) => matches!(self.kind(t), QualifierType),
            None => false,
        }
    }

    /// The qualifier of values inhabiting either this kind itself or types
    /// within this kind.
    pub fn kind_qualifier(&mut self, id : NodeId) -> NodeId {
        match self.kind(id).clone() {
            Star | ArityKind | MultiArityKind => self.op(id, 0),
            Sigma => {
                if self.num_ops(id) == 0 {
                    return self.unlimited()
                }
                let n = self.num_ops(id);
                let mut quals = Vec::with_capacity(n);
                for i in 0..n {
                    let op = self.op(id, i);
                    let q = if self.has_values(op) {
                        let q = self.qualifier_of(op);
                        shift_free_vars(self, q, -(i as i64))
                    } else {
                        self.unlimited()
                    };
                    quals.push(q);
                }
                let qt = self.qualifier_type;
                self.variant_with(qt, &quals)
            },
            Variadic => {
                let body = self.op(id, 1);
                if self.has_values(body) {
                    let q = self.qualifier_of(body);
                    shift_free_vars(self, q, -1)
                } else {
                    self.unlimited()
                }
            },
            Singleton => {
                let op = self.op(id, 0);
                self.qualifier_of(op)
            },
            Variant => {
                let ops = self.ops(id).to_vec();
                let quals : Vec<NodeId> = ops.into_iter().map(|op| self.qualifier_of(op)).collect();
                let qt = self.qualifier_type;
                self.variant_with(qt, &quals)
            },
            Intersection => {
                let ops = self.ops(id).to_vec();
                let quals : Vec<NodeId> = ops.into_iter().map(|op| self.qualifier_of(op)).collect();
                let qt = self.qualifier_type;
                self.intersection_with(qt, &quals)
            },
            _ => self.unlimited(),
        }
    }

    /// The qualifier of any def, through its sort.
    pub fn qualifier_of(&mut self, id : NodeId) -> NodeId {
        match self.sort(id) {
            Sort::Term => {
                let t = self.ty_of(id);
                let tt = self.ty_of(t);
                self.kind_qualifier(tt)
            },
            Sort::Type => {
                let t = self.ty_of(id);
                self.kind_qualifier(t)
            },
            Sort::Kind => self.kind_qualifier(id),
            Sort::Universe => self.unlimited(),
        }
    }

    /// Whether this def, seen as a type, has inhabitants.
    pub fn has_values(&mut self, id : NodeId) -> bool {
        match self.kind(id).clone() {
            Arity(..) | Pi | Variadic | QualifierType => true,
            Sigma => (0..self.num_ops(id)).all(|i| {
                let op = self.op(id, i);
                self.has_values(op)
            }),
            Axiom(..) | Lit(..) => {
                if self.sort(id) != Sort::Type {
                    return false
                }
                let t = self.ty_of(id);
                !self.has_values(t)
            },
            Intersection => (0..self.num_ops(id)).all(|i| {
                let op = self.op(id, i);
                self.has_values(op)
            }),
            Variant => (0..self.num_ops(id)).any(|i| {
                let op = self.op(id, i);
                self.has_values(op)
            }),
            Singleton => {
                let op = self.op(id, 0);
                self.is_value(op)
            },
            App | Var(..) => self.sort(id) == Sort::Type,
            _ => false,
        }
    }

    pub fn is_value(&mut self, id : NodeId) -> bool {
        match self.sort(id) {
            Sort::Universe | Sort::Kind => false,
            Sort::Type | Sort::Term => {
                let dt = self.destructing_type(id);
                self.has_values(dt)
            },
        }
    }

    /// Conservative : true when the def is a value whose qualifier is Affine
    /// or stronger, or is not statically known.
    pub fn maybe_affine(&mut self, id : NodeId) -> bool {
        if !self.is_value(id) {
            return false
        }
        let t = self.ty_of(id);
        if matches!(self.kind(t), QualifierType) {
            return false
        }
        let q = self.qualifier_of(id);
        match self.is_const_qualifier(q) {
            Some(tag) => QualifierTag::Affine.leq(tag),
            None => true,
        }
    }

    /* -------------------------------------------------------------------- */
    /* arities and literals                                                 */
    /* -------------------------------------------------------------------- */

    pub fn arity_q(&mut self, q : NodeId, n : u64) -> NodeId {
        let ak = self.arity_kind(q);
        self.intern(Arity(n), Some(ak), &[])
    }

    pub fn arity(&mut self, n : u64) -> NodeId {
        let u = self.unlimited();
        self.arity_q(u, n)
    }

    /// The index literal `i_a` : the `i`-th inhabitant of the arity `a`.
    /// An out-of-bounds index is an error value.
    pub fn index(&mut self, i : u64, a : u64) -> NodeId {
        let at = self.arity(a);
        if i < a {
            self.lit(at, Box64::from_u64(i))
        } else {
            self.errorf(format!("index {} out of bounds for arity {}", i, a));
            self.error(at)
        }
    }

    pub fn lit(&mut self, ty : NodeId, b : Box64) -> NodeId {
        self.intern(Lit(b), Some(ty), &[])
    }

    pub fn lit_nat(&mut self, n : u64) -> NodeId {
        let t = self.type_nat;
        self.lit(t, Box64::from_u64(n))
    }

    pub fn lit_false(&mut self) -> NodeId { self.lit_false }
    pub fn lit_true(&mut self) -> NodeId { self.lit_true }

    pub fn lit_bool(&mut self, b : bool) -> NodeId {
        if b { self.lit_true } else { self.lit_false }
    }

    pub fn type_bool(&mut self) -> NodeId { self.type_bool }
    pub fn type_nat(&mut self) -> NodeId { self.type_nat }
    pub fn type_mem(&mut self) -> NodeId { self.type_mem }
    pub fn unit(&mut self) -> NodeId { self.unit }
    pub fn tuple0(&mut self) -> NodeId { self.tuple0 }

    /// `int w` as a type.
    pub fn type_int(&mut self, w : u64) -> NodeId {
        let ax = self.prim.type_int;
        let wl = self.lit_nat(w);
        self.app(ax, wl)
    }

    /// `float w` as a type.
    pub fn type_float(&mut self, w : u64) -> NodeId {
        let ax = self.prim.type_float;
        let wl = self.lit_nat(w);
        self.app(ax, wl)
    }

    pub fn lit_int(&mut self, w : u64, bits : u64) -> NodeId {
        let t = self.type_int(w);
        self.lit(t, Box64::from_u64(bits))
    }

    pub fn lit_f32(&mut self, f : f32) -> NodeId {
        let t = self.type_float(32);
        self.lit(t, Box64::from_f32(f))
    }

    pub fn lit_f64(&mut self, f : f64) -> NodeId {
        let t = self.type_float(64);
        self.lit(t, Box64::from_f64(f))
    }

    pub fn bottom(&mut self, ty : NodeId) -> NodeId {
        self.intern(Bottom, Some(ty), &[])
    }

    pub fn top(&mut self, ty : NodeId) -> NodeId {
        self.intern(Top, Some(ty), &[])
    }

    /* -------------------------------------------------------------------- */
    /* axioms and vars                                                      */
    /* -------------------------------------------------------------------- */

    pub fn axiom(&mut self, ty : NodeId, name : &str) -> NodeId {
        self.axiom_with(ty, None, Some(name))
    }

    pub fn axiom_anon(&mut self, ty : NodeId) -> NodeId {
        self.axiom_with(ty, None, None)
    }

    /// Axioms are identity-bearing : every call mints a fresh constant, even
    /// at an identical type.
    pub fn axiom_with(&mut self, ty : NodeId, normalizer : Option<Normalizer>, name : Option<&str>) -> NodeId {
        if self.fv_any(ty) {
            self.errorf(format!("the type of an axiom must be closed"));
        }
        let id = self.alloc_nominal(Axiom(normalizer), Some(ty), 0, name);
        if let Some(n) = name {
            self.axioms.insert(n.to_string(), id);
        }
        id
    }

    pub fn var(&mut self, ty : NodeId, index : u64) -> NodeId {
        if matches!(self.kind(ty), Universe) {
            self.errorf(format!("a variable cannot have the Universe as its type"));
        }
        self.intern(Var(index), Some(ty), &[])
    }

    /* -------------------------------------------------------------------- */
    /* binders                                                              */
    /* -------------------------------------------------------------------- */

    pub fn pi(&mut self, domain : NodeId, codomain : NodeId) -> NodeId {
        let ty = if self.sort(domain) >= Sort::Kind || self.sort(codomain) >= Sort::Kind {
            self.universe
        } else {
            self.star_u()
        };
        self.intern(Pi, Some(ty), &[domain, codomain])
    }

    /// Multi-domain sugar : the domains become one Σ binder.
    pub fn pi_n(&mut self, domains : &[NodeId], codomain : NodeId) -> NodeId {
        let d = self.sigma(domains);
        self.pi(d, codomain)
    }

    pub fn lambda(&mut self, domain : NodeId, body : NodeId) -> NodeId {
        let filter = self.lit_false;
        self.lambda_with(filter, domain, body)
    }

    pub fn lambda_n(&mut self, domains : &[NodeId], body : NodeId) -> NodeId {
        let d = self.sigma(domains);
        self.lambda(d, body)
    }

    pub fn lambda_with(&mut self, filter : NodeId, domain : NodeId, body : NodeId) -> NodeId {
        if let Some(f) = self.lambda_eta(domain, body) {
            return f
        }
        let bt = self.ty_of(body);
        let pi = self.pi(domain, bt);
        self.intern(Lambda, Some(pi), &[filter, body])
    }

    /// `λx. f x` is `f` when `x` does not occur in `f`; the same through an
    /// argument tuple of in-order projections covering the whole domain.
    fn lambda_eta(&mut self, domain : NodeId, body : NodeId) -> Option<NodeId> {
        if !matches!(self.kind(body), App) {
            return None
        }
        let f = self.op(body, 0);
        let arg = self.op(body, 1);
        if self.fv_test(f, 0) {
            return None
        }
        match self.kind(arg).clone() {
            Var(0) => Some(shift_free_vars(self, f, -1)),
            Tuple => {
                let n = self.num_ops(arg);
                if self.has_constant_arity(domain) != Some(n as u64) {
                    return None
                }
                for j in 0..n {
                    let el = self.op(arg, j);
                    if !matches!(self.kind(el), Extract) {
                        return None
                    }
                    let scrut = self.op(el, 0);
                    let idx = self.op(el, 1);
                    if !matches!(self.kind(scrut), Var(0)) {
                        return None
                    }
                    if self.lit_u64(idx) != Some(j as u64) {
                        return None
                    }
                }
                Some(shift_free_vars(self, f, -1))
            },
            _ => None,
        }
    }

    /// A nominal λ : created empty (filter and body pending), mutated via
    /// `set_op`; identity is the allocation, never the contents.
    pub fn nominal_lambda(&mut self, pi : NodeId, name : Option<&str>) -> NodeId {
        if !matches!(self.kind(pi), Pi) {
            self.errorf(format!("a nominal lambda needs a Π type"));
        }
        self.alloc_nominal(Lambda, Some(pi), 2, name)
    }

    pub fn nominal_sigma(&mut self, ty : NodeId, num_ops : usize, name : Option<&str>) -> NodeId {
        self.alloc_nominal(Sigma, Some(ty), num_ops, name)
    }

    pub fn nominal_variant(&mut self, ty : NodeId, num_ops : usize, name : Option<&str>) -> NodeId {
        self.alloc_nominal(Variant, Some(ty), num_ops, name)
    }

    /// The (hash-consed, hence unique) parameter projection of a nominal λ.
    pub fn param(&mut self, lambda : NodeId) -> NodeId {
        if !self.is_nominal(lambda) {
            self.errorf(format!("only nominal lambdas have parameters"));
        }
        let pi = self.ty_of(lambda);
        let domain = self.op(pi, 0);
        self.intern(Param, Some(domain), &[lambda])
    }

    pub fn sigma(&mut self, ops : &[NodeId]) -> NodeId {
        self.sigma_q(None, ops)
    }

    pub fn sigma_q(&mut self, q : Option<NodeId>, ops : &[NodeId]) -> NodeId {
        match ops.len() {
            0 => self.unit,
            1 => ops[0],
            n => {
                // a sigma of arities is a multi-arity; a zero extent
                // anywhere empties the whole index space
                let all_arities = ops.iter().all(|&o| {
                    let t = self.ty_of(o);
                    matches!(self.kind(t), ArityKind)
                });
                if all_arities && ops.iter().any(|&o| matches!(self.kind(o), Arity(0))) {
                    return self.arity(0)
                }
                // all-equal components make a homogeneous variadic
                if ops.iter().all(|&o| o == ops[0]) {
                    let a = self.arity(n as u64);
                    let body = shift_free_vars(self, ops[0], 1);
                    return self.variadic(a, body)
                }
                if all_arities {
                    let ty = self.multi_arity_kind_u();
                    return self.intern(Sigma, Some(ty), ops)
                }
                let ty = self.infer_max_type(ops, false, q);
                self.intern(Sigma, Some(ty), ops)
            }
        }
    }

    /// The least Kind containing all of `ops`, with the lattice direction of
    /// the qualifier chosen by the caller (join for Σ/Variant, meet for
    /// Intersection).
    fn infer_max_type(&mut self, ops : &[NodeId], use_meet : bool, provided_q : Option<NodeId>) -> NodeId {
        let mut max_sort = Sort::Type;
        let mut quals = Vec::with_capacity(ops.len());
        for (i, &op) in ops.iter().enumerate() {
            let s = self.sort(op);
            if s < Sort::Type {
                self.errorf(format!("operands of a type former must be at least types"));
            }
            max_sort = max_sort.max(s);
            let q = if self.has_values(op) {
                let q = self.qualifier_of(op);
                shift_free_vars(self, q, -(i as i64))
            } else {
                self.unlimited()
            };
            quals.push(q);
        }
        if max_sort > Sort::Type {
            return self.universe
        }
        let q = match provided_q {
            Some(q) => q,
            None => {
                let qt = self.qualifier_type;
                if use_meet {
                    self.intersection_with(qt, &quals)
                } else {
                    self.variant_with(qt, &quals)
                }
            },
        };
        self.star(q)
    }

    pub fn variadic(&mut self, a : NodeId, body : NodeId) -> NodeId {
        match self.kind(a).clone() {
            Arity(0) => return self.unit,
            Arity(1) => {
                let i = self.index(0, 1);
                return reduce1(self, body, i)
            },
            Arity(n) if self.fv_test(body, 0) => {
                let mut comps = Vec::with_capacity(n as usize);
                for i in 0..n {
                    let idx = self.index(i, n);
                    comps.push(reduce1(self, body, idx));
                }
                return self.sigma(&comps)
            },
            Sigma if !self.fv_test(body, 0) => {
                // a multi-arity unfolds into nested variadics; the sigma's
                // components are already expressed at the right depths
                let comps : Vec<NodeId> = self.ops(a).to_vec();
                let k = comps.len();
                let mut acc = shift_free_vars(self, body, k as i64 - 1);
                for &c in comps.iter().rev() {
                    acc = self.variadic(c, acc);
                }
                return acc
            },
            _ => (),
        }
        let at = self.ty_of(a);
        if !matches!(self.kind(at), ArityKind | MultiArityKind) {
            self.errorf(format!("the arity of a variadic must inhabit an arity kind"));
        }
        let ty = self.variadic_type(a, body);
        self.intern(Variadic, Some(ty), &[a, body])
    }

    fn variadic_type(&mut self, _a : NodeId, body : NodeId) -> NodeId {
        let bt = self.ty_of(body);
        match self.kind(bt).clone() {
            Universe => self.universe,
            ArityKind => {
                let q = self.op(bt, 0);
                let q = shift_free_vars(self, q, -1);
                self.multi_arity_kind(q)
            },
            _ => {
                let q = if self.has_values(body) {
                    let q = self.qualifier_of(body);
                    shift_free_vars(self, q, -1)
                } else {
                    self.unlimited()
                };
                self.star(q)
            },
        }
    }

    pub fn pack(&mut self, a : NodeId, body : NodeId) -> NodeId {
        match self.kind(a).clone() {
            Arity(0) => return self.tuple0,
            Arity(1) => {
                let i = self.index(0, 1);
                return reduce1(self, body, i)
            },
            Arity(n) if self.fv_test(body, 0) => {
                let mut comps = Vec::with_capacity(n as usize);
                for i in 0..n {
                    let idx = self.index(i, n);
                    comps.push(reduce1(self, body, idx));
                }
                return self.tuple(&comps)
            },
            Sigma if !self.fv_test(body, 0) => {
                let comps : Vec<NodeId> = self.ops(a).to_vec();
                let k = comps.len();
                let mut acc = shift_free_vars(self, body, k as i64 - 1);
                for &c in comps.iter().rev() {
                    acc = self.pack(c, acc);
                }
                return acc
            },
            _ => (),
        }
        // η : (a; x#<0:a>) is x
        if matches!(self.kind(body), Extract) {
            let scrut = self.op(body, 0);
            let idx = self.op(body, 1);
            if matches!(self.kind(idx), Var(0)) && !self.fv_test(scrut, 0) {
                let it = self.ty_of(idx);
                if !self.fv_test(it, 0) {
                    let shifted_it = shift_free_vars(self, it, -1);
                    if shifted_it == a {
                        return shift_free_vars(self, scrut, -1)
                    }
                }
            }
        }
        let bt = self.ty_of(body);
        let vty = self.variadic(a, bt);
        self.intern(Pack, Some(vty), &[body])
    }

    /* -------------------------------------------------------------------- */
    /* aggregates                                                           */
    /* -------------------------------------------------------------------- */

    pub fn tuple(&mut self, ops : &[NodeId]) -> NodeId {
        match ops.len() {
            0 => self.tuple0,
            1 => ops[0],
            n => {
                if let Some(t) = self.tuple_eta(ops) {
                    return t
                }
                if ops.iter().all(|&o| o == ops[0]) {
                    let a = self.arity(n as u64);
                    let body = shift_free_vars(self, ops[0], 1);
                    return self.pack(a, body)
                }
                let mut types = Vec::with_capacity(n);
                for (i, &op) in ops.iter().enumerate() {
                    let t = self.ty_of(op);
                    types.push(shift_free_vars(self, t, i as i64));
                }
                let sig = self.sigma(&types);
                self.intern(Tuple, Some(sig), ops)
            }
        }
    }

    /// `(t#0, t#1, …, t#(n-1))` is `t`.
    fn tuple_eta(&mut self, ops : &[NodeId]) -> Option<NodeId> {
        let n = ops.len() as u64;
        let first = ops[0];
        if !matches!(self.kind(first), Extract) {
            return None
        }
        let scrut = self.op(first, 0);
        for (j, &el) in ops.iter().enumerate() {
            if !matches!(self.kind(el), Extract) {
                return None
            }
            if self.op(el, 0) != scrut {
                return None
            }
            let idx = self.op(el, 1);
            if self.lit_u64(idx) != Some(j as u64) {
                return None
            }
            let it = self.ty_of(idx);
            if !matches!(self.kind(it), Arity(m) if *m == n) {
                return None
            }
        }
        Some(scrut)
    }

    pub fn extract(&mut self, def : NodeId, index : NodeId) -> NodeId {
        if let Some(i) = self.lit_u64(index) {
            let it = self.ty_of(index);
            if matches!(self.kind(it), Arity(..)) {
                return self.extract_at(def, i)
            }
        }
        // non-literal index
        if matches!(self.kind(def), Tuple) {
            let ops = self.ops(def).to_vec();
            if ops.iter().all(|&o| o == ops[0]) {
                return ops[0]
            }
        }
        let dt = self.destructing_type(def);
        match self.kind(dt).clone() {
            Variadic => {
                let body = self.op(dt, 1);
                let ty = reduce1(self, body, index);
                self.intern(Extract, Some(ty), &[def, index])
            },
            Sigma => {
                // the result type is the least common supertype of the
                // components; without one, the extract is ill-typed
                let n = self.num_ops(dt);
                let mut lub = self.op(dt, 0);
                for i in 1..n {
                    let t = self.op(dt, i);
                    if self.fv_any_end(t, i) {
                        self.errorf(format!("variable index into a dependent sigma"));
                        let s = self.star_u();
                        return self.error(s)
                    }
                    let t = shift_free_vars(self, t, -(i as i64));
                    if self.subtype_of(lub, t) {
                        lub = t;
                    } else if !self.subtype_of(t, lub) {
                        self.errorf(format!("components of the scrutinee have no common supertype"));
                        let s = self.star_u();
                        return self.error(s)
                    }
                }
                self.intern(Extract, Some(lub), &[def, index])
            },
            _ => {
                self.errorf(format!("extract needs an aggregate scrutinee"));
                let s = self.star_u();
                self.error(s)
            },
        }
    }

    pub fn extract_at(&mut self, def : NodeId, i : u64) -> NodeId {
        match self.kind(def).clone() {
            Tuple | Sigma => {
                if (i as usize) < self.num_ops(def) {
                    return self.op(def, i as usize)
                }
                self.errorf(format!("extract index {} out of bounds", i));
                let s = self.star_u();
                return self.error(s)
            },
            Pack => {
                let dt = self.ty_of(def);
                if let Some(n) = self.has_constant_arity_of_type(dt) {
                    if i < n {
                        let body = self.op(def, 0);
                        let idx = self.index(i, n);
                        return reduce1(self, body, idx)
                    }
                }
            },
            _ => (),
        }
        let dt = self.destructing_type(def);
        match self.kind(dt).clone() {
            Sigma => {
                let n = self.num_ops(dt) as u64;
                if i >= n {
                    self.errorf(format!("extract index {} out of bounds for arity {}", i, n));
                    let s = self.star_u();
                    return self.error(s)
                }
                let mut t = self.op(dt, i as usize);
                if self.free_vars(t).any_end(i as usize) {
                    // substitute the earlier components into the projected type
                    let mut front = Vec::with_capacity(i as usize);
                    for j in 0..i {
                        front.push(self.extract_at(def, j));
                    }
                    t = reduce(self, t, &front, 0);
                } else {
                    t = shift_free_vars(self, t, -(i as i64));
                }
                let idx = self.index(i, n);
                self.intern(Extract, Some(t), &[def, idx])
            },
            Variadic => {
                let a = self.op(dt, 0);
                match self.kind(a) {
                    Arity(n) => {
                        let n = *n;
                        if i >= n {
                            self.errorf(format!("extract index {} out of bounds for arity {}", i, n));
                            let s = self.star_u();
                            return self.error(s)
                        }
                        let body = self.op(dt, 1);
                        let idx = self.index(i, n);
                        let ty = reduce1(self, body, idx);
                        self.intern(Extract, Some(ty), &[def, idx])
                    },
                    _ => {
                        self.errorf(format!("literal index into a variadic of unknown arity"));
                        let s = self.star_u();
                        self.error(s)
                    },
                }
            },
            _ => {
                // anything else is an aggregate of arity 1
                if i == 0 {
                    return def
                }
                self.errorf(format!("extract index {} out of bounds for arity 1", i));
                let s = self.star_u();
                self.error(s)
            },
        }
    }

    pub fn insert(&mut self, def : NodeId, index : NodeId, value : NodeId) -> NodeId {
        if matches!(self.kind(def), Tuple) {
            if let Some(i) = self.lit_u64(index) {
                if (i as usize) < self.num_ops(def) {
                    let mut ops = self.ops(def).to_vec();
                    ops[i as usize] = value;
                    return self.tuple(&ops)
                }
            }
        }
        let ty = self.ty_of(def);
        self.intern(Insert, Some(ty), &[def, index, value])
    }

    pub fn insert_at(&mut self, def : NodeId, i : u64, value : NodeId) -> NodeId {
        let dt = self.destructing_type(def);
        let n = match self.has_constant_arity_of_type(dt) {
            Some(n) => n,
            None => {
                self.errorf(format!("insert into an aggregate of unknown arity"));
                return def
            },
        };
        let idx = self.index(i, n);
        self.insert(def, idx, value)
    }

    /* -------------------------------------------------------------------- */
    /* application                                                          */
    /* -------------------------------------------------------------------- */

    pub fn app(&mut self, callee : NodeId, arg : NodeId) -> NodeId {
        let cty = self.destructing_type(callee);
        let (domain, codomain) = match self.kind(cty) {
            Pi => (self.op(cty, 0), self.op(cty, 1)),
            _ => {
                self.errorf(format!("applied a non-Π callee"));
                return self.error(cty)
            },
        };
        if !self.assignable(domain, arg) {
            self.errorf(format!("argument is not assignable to the callee's domain"));
            let ty = reduce1(self, codomain, arg);
            return self.error(ty)
        }
        let ty = reduce1(self, codomain, arg);
        // substructural discipline : an affine-or-stronger callee or
        // argument is consumed by this application; repeating it is an error
        if self.maybe_affine(callee) || self.maybe_affine(arg) {
            if !self.consumed.insert((callee, arg)) {
                self.errorf(format!("substructural violation : affine value used twice"));
                return self.bottom(ty)
            }
        }
        if let Some(ax) = self.tail_axiom(callee) {
            if let Axiom(Some(norm)) = self.kind(ax).clone() {
                if let Some(res) = norm(self, ty, callee, arg) {
                    return res
                }
            }
        }
        // β at construction for structural λ callees
        if matches!(self.kind(callee), Lambda) && !self.is_nominal(callee) {
            let body = self.op(callee, 1);
            return reduce1(self, body, arg)
        }
        self.intern(App, Some(ty), &[callee, arg])
    }

    /// Like `app`, but skips the normalizer. Used by the normalizers
    /// themselves to emit a canonical form without re-entering it.
    pub(crate) fn raw_app(&mut self, callee : NodeId, arg : NodeId) -> NodeId {
        let cty = self.destructing_type(callee);
        let codomain = match self.kind(cty) {
            Pi => self.op(cty, 1),
            _ => {
                self.errorf(format!("applied a non-Π callee"));
                return self.error(cty)
            },
        };
        let ty = reduce1(self, codomain, arg);
        self.intern(App, Some(ty), &[callee, arg])
    }

    pub fn app_n(&mut self, callee : NodeId, args : &[NodeId]) -> NodeId {
        if args.len() == 1 {
            return self.app(callee, args[0])
        }
        let t = self.tuple(args);
        self.app(callee, t)
    }

    pub(crate) fn app_pair(&mut self, callee : NodeId, a : NodeId, b : NodeId) -> NodeId {
        let t = self.tuple(&[a, b]);
        self.app(callee, t)
    }

    /// The axiom at the head of a (possibly curried) application spine.
    pub fn tail_axiom(&self, mut def : NodeId) -> Option<NodeId> {
        loop {
            match self.kind(def) {
                Axiom(..) => return Some(def),
                App => def = self.op(def, 0),
                _ => return None,
            }
        }
    }

    /// Forces an unfold of an App over a nominal λ, memoized. Apps headed by
    /// axioms are already in normal form.
    pub fn unfold(&mut self, app : NodeId) -> NodeId {
        if !matches!(self.kind(app), App) {
            return app
        }
        if self.tail_axiom(app).is_some() {
            return app
        }
        if let Some(&c) = self.unfolds.get(&app) {
            return c
        }
        let callee = self.op(app, 0);
        let arg = self.op(app, 1);
        let callee = self.unfold(callee);
        let res = if matches!(self.kind(callee), Lambda) && self.is_nominal(callee) {
            self.drop_param(callee, arg)
        } else {
            app
        };
        self.unfolds.insert(app, res);
        res
    }

    /// The type to destruct a def at : unfolds one App layer of the type
    /// when the type is an application of a nominal λ.
    pub fn destructing_type(&mut self, def : NodeId) -> NodeId {
        let t = self.ty_of(def);
        if matches!(self.kind(t), App) {
            self.unfold(t)
        } else {
            t
        }
    }

    /// Specializes the body of a nominal λ by its argument : every
    /// occurrence of the λ's Param becomes `arg`. Only the λ's own scope is
    /// rewritten; sharing outside it is untouched.
    fn drop_param(&mut self, lambda : NodeId, arg : NodeId) -> NodeId {
        let body = self.op(lambda, 1);
        let param = self.param(lambda);
        let mut map = FxHashMap::default();
        map.insert(param, arg);
        map.insert(lambda, lambda);
        self.rewrite(body, &mut map)
    }

    fn rewrite(&mut self, def : NodeId, map : &mut FxHashMap<NodeId, NodeId>) -> NodeId {
        if let Some(&m) = map.get(&def) {
            return m
        }
        if self.is_nominal(def) {
            map.insert(def, def);
            return def
        }
        let new_ty = match self.ty(def) {
            Some(t) => Some(self.rewrite(t, map)),
            None => None,
        };
        let ops = self.ops(def).to_vec();
        let mut new_ops = SmallVec::<[NodeId; 2]>::new();
        let mut changed = new_ty != self.ty(def);
        for op in ops {
            let n = self.rewrite(op, map);
            changed |= n != op;
            new_ops.push(n);
        }
        let res = if changed {
            self.rebuild(def, new_ty, &new_ops)
        } else {
            def
        };
        map.insert(def, res);
        res
    }

    /* -------------------------------------------------------------------- */
    /* sums, intersections, singletons                                      */
    /* -------------------------------------------------------------------- */

    pub fn variant(&mut self, ops : &[NodeId]) -> NodeId {
        let ty = self.infer_max_type(ops, false, None);
        self.variant_with(ty, ops)
    }

    pub fn variant_with(&mut self, ty : NodeId, ops : &[NodeId]) -> NodeId {
        debug_assert!(!ops.is_empty());
        if ops.len() == 1 {
            return ops[0]
        }
        if self.is_qualifier(ops[0]) {
            return self.qualifier_bound(ops, false)
        }
        let sorted = self.unique_gid_sorted(ops);
        if sorted.len() == 1 {
            return sorted[0]
        }
        self.intern(Variant, Some(ty), &sorted)
    }

    pub fn intersection(&mut self, ops : &[NodeId]) -> NodeId {
        let ty = self.infer_max_type(ops, true, None);
        self.intersection_with(ty, ops)
    }

    pub fn intersection_with(&mut self, ty : NodeId, ops : &[NodeId]) -> NodeId {
        debug_assert!(!ops.is_empty());
        if ops.len() == 1 {
            return ops[0]
        }
        if self.is_qualifier(ops[0]) {
            return self.qualifier_bound(ops, true)
        }
        let sorted = self.unique_gid_sorted(ops);
        if sorted.len() == 1 {
            return sorted[0]
        }
        self.intern(Intersection, Some(ty), &sorted)
    }

    /// Fold constant qualifiers through the lattice, keeping only the
    /// variables the bound still depends on.
    fn qualifier_bound(&mut self, ops : &[NodeId], use_meet : bool) -> NodeId {
        use QualifierTag::*;
        let absorbing = if use_meet { Unlimited } else { Linear };
        let identity = if use_meet { Linear } else { Unlimited };
        let mut accu = identity;
        let mut vars = Vec::new();
        for &op in ops {
            match self.is_const_qualifier(op) {
                Some(tag) => {
                    accu = if use_meet { accu.meet(tag) } else { accu.join(tag) };
                },
                None => vars.push(op),
            }
        }
        if vars.is_empty() || accu == absorbing {
            return self.qualifier(accu)
        }
        if accu != identity {
            let q = self.qualifier(accu);
            vars.push(q);
        }
        let mut vars = self.unique_gid_sorted(&vars);
        if vars.len() == 1 {
            return vars.remove(0)
        }
        let qt = self.qualifier_type;
        let kind = if use_meet { Intersection } else { Variant };
        self.intern(kind, Some(qt), &vars)
    }

    fn unique_gid_sorted(&self, ops : &[NodeId]) -> Vec<NodeId> {
        let mut v = ops.to_vec();
        v.sort();
        v.dedup();
        v
    }

    /// `any(V, x)` injects `x` into the variant type `V`.
    pub fn any(&mut self, variant_ty : NodeId, def : NodeId) -> NodeId {
        if !matches!(self.kind(variant_ty), Variant) {
            if self.ty_of(def) != variant_ty {
                self.errorf(format!("injected value does not inhabit the target type"));
                return self.error(variant_ty)
            }
            return def
        }
        let dt = self.ty_of(def);
        let idx = self.ops(variant_ty).iter().position(|&t| t == dt);
        match idx {
            Some(i) => self.intern(Any(i as u64), Some(variant_ty), &[def]),
            None => {
                self.errorf(format!("injected value's type is not a case of the variant"));
                self.error(variant_ty)
            },
        }
    }

    /// Case analysis over a variant-typed destructee. The handler list is
    /// canonicalized by sorting on the gid of each handler's domain, which
    /// lines the handlers up with the (gid-sorted) cases of the variant.
    pub fn match_(&mut self, def : NodeId, handlers : &[NodeId]) -> NodeId {
        if handlers.len() == 1 {
            return self.app(handlers[0], def)
        }
        let dt = self.destructing_type(def);
        if !matches!(self.kind(dt), Variant) {
            self.errorf(format!("match needs a variant-typed destructee"));
            let s = self.star_u();
            return self.error(s)
        }
        if self.num_ops(dt) != handlers.len() {
            self.errorf(format!("number of handlers does not match number of cases"));
            let s = self.star_u();
            return self.error(s)
        }
        let mut sorted = handlers.to_vec();
        let mut keyed : Vec<(u32, NodeId)> = Vec::with_capacity(sorted.len());
        for h in sorted.drain(..) {
            let ht = self.ty_of(h);
            let dom = match self.kind(ht) {
                Pi => self.op(ht, 0),
                _ => {
                    self.errorf(format!("a match handler must be a function"));
                    let s = self.star_u();
                    return self.error(s)
                },
            };
            keyed.push((dom.gid(), h));
        }
        keyed.sort_by_key(|(g, _)| *g);
        let sorted : Vec<NodeId> = keyed.into_iter().map(|(_, h)| h).collect();
        if let Any(i) = self.kind(def).clone() {
            let inner = self.op(def, 0);
            return self.app(sorted[i as usize], inner)
        }
        let mut codomains = Vec::with_capacity(sorted.len());
        for &h in sorted.iter() {
            let ht = self.ty_of(h);
            let cod = self.op(ht, 1);
            if self.fv_test(cod, 0) {
                self.errorf(format!("match handlers may not have dependent codomains"));
            }
            codomains.push(shift_free_vars(self, cod, -1));
        }
        let mty = self.variant(&codomains);
        let mut ops = Vec::with_capacity(sorted.len() + 1);
        ops.push(def);
        ops.extend(sorted);
        self.intern(Match, Some(mty), &ops)
    }

    /// The dual of `any` : picks one member of an intersection.
    pub fn pick(&mut self, ty : NodeId, def : NodeId) -> NodeId {
        let dt = self.destructing_type(def);
        if matches!(self.kind(dt), Intersection) {
            if !self.ops(dt).contains(&ty) {
                self.errorf(format!("picked type is not a member of the intersection"));
                return self.error(ty)
            }
            return self.intern(Pick, Some(ty), &[def])
        }
        if dt != ty {
            self.errorf(format!("picked type does not match the destructee"));
            return self.error(ty)
        }
        def
    }

    /// The type whose sole inhabitant is `def`, distributed through sums,
    /// tuples and functions per PFPL 43.13. A singleton of an intersection
    /// stays opaque.
    pub fn singleton(&mut self, def : NodeId) -> NodeId {
        let t = self.ty_of(def);
        if matches!(self.kind(t), Singleton) {
            return t
        }
        if !self.is_nominal(def) && matches!(self.kind(def), Variant) {
            let ops = self.ops(def).to_vec();
            let sing : Vec<NodeId> = ops.into_iter().map(|o| self.singleton(o)).collect();
            let tt = self.ty_of(t);
            return self.variant_with(tt, &sing)
        }
        if matches!(self.kind(t), Sigma) {
            let n = self.num_ops(t);
            let mut sing = Vec::with_capacity(n);
            for i in 0..n {
                let e = self.extract_at(def, i as u64);
                sing.push(self.singleton(e));
            }
            return self.sigma(&sing)
        }
        if matches!(self.kind(t), Pi) {
            let domain = self.op(t, 0);
            let shifted_domain = shift_free_vars(self, domain, 1);
            let v = self.var(shifted_domain, 0);
            let f = shift_free_vars(self, def, 1);
            let applied = self.app(f, v);
            let s = self.singleton(applied);
            return self.pi(domain, s)
        }
        let uty = self.ty_of(t);
        self.intern(Singleton, Some(uty), &[def])
    }

    /* -------------------------------------------------------------------- */
    /* arity queries                                                        */
    /* -------------------------------------------------------------------- */

    /// The logical arity of a def, as a def.
    pub fn arity_of(&mut self, id : NodeId) -> Option<NodeId> {
        match self.kind(id).clone() {
            Arity(..) | ArityKind | MultiArityKind | Pi | Qualifier(..) | QualifierType | Star => {
                Some(self.arity(1))
            },
            Sigma => {
                let n = self.num_ops(id) as u64;
                Some(self.arity(n))
            },
            Variadic => Some(self.op(id, 0)),
            Singleton => {
                let op = self.op(id, 0);
                self.arity_of(op)
            },
            Variant => {
                let ops = self.ops(id).to_vec();
                let arities : Option<Vec<NodeId>> = ops.into_iter().map(|o| self.arity_of(o)).collect();
                arities.map(|a| self.variant(&a))
            },
            Universe => None,
            _ => {
                if self.is_value(id) {
                    let dt = self.destructing_type(id);
                    self.arity_of(dt)
                } else if matches!(self.kind(id), App | Axiom(..) | Bottom | Lit(..) | Top) {
                    Some(self.arity(1))
                } else {
                    None
                }
            },
        }
    }

    pub fn has_constant_arity(&mut self, id : NodeId) -> Option<u64> {
        let a = self.arity_of(id)?;
        match self.kind(a) {
            Arity(n) => Some(*n),
            _ => None,
        }
    }

    fn has_constant_arity_of_type(&mut self, t : NodeId) -> Option<u64> {
        match self.kind(t).clone() {
            Variadic => {
                let a = self.op(t, 0);
                match self.kind(a) {
                    Arity(n) => Some(*n),
                    _ => None,
                }
            },
            Sigma => Some(self.num_ops(t) as u64),
            _ => None,
        }
    }

    /* -------------------------------------------------------------------- */
    /* replacement                                                          */
    /* -------------------------------------------------------------------- */

    /// Rewrites every user of `old` to refer to `with` instead and leaves a
    /// forwarding pointer behind. The use set is snapshotted first, so users
    /// discovered during the walk do not perturb the iteration.
    pub fn replace(&mut self, old : NodeId, with : NodeId) {
        let with = self.resolve(with);
        if old == with {
            return
        }
        debug!("replace: {} -> {}", old.gid(), with.gid());
        if self.ty(old) != self.ty(with) {
            self.errorf(format!("replacement must preserve the type"));
            return
        }
        if self.defs[old.index()].is_replaced() {
            self.errorf(format!("def {} was already replaced", old.gid()));
            return
        }
        let uses : Vec<Use> = self.defs[old.index()].uses.iter().copied().collect();
        for u in uses {
            self.defs[u.user.index()].ops[u.index] = with;
            self.defs[with.index()].uses.insert(u);
        }
        self.defs[old.index()].uses.clear();
        self.defs[old.index()].substitute = Some(with);
    }

    /* -------------------------------------------------------------------- */
    /* rebuild / stub                                                       */
    /* -------------------------------------------------------------------- */

    /// Rebuild an equivalent def from new parts, re-running every factory
    /// normalization. The single dispatcher the substitution engine and the
    /// importer funnel through.
    pub(crate) fn rebuild(&mut self, old : NodeId, new_ty : Option<NodeId>, ops : &[NodeId]) -> NodeId {
        let kind = self.kind(old).clone();
        self.rebuild_kind(&kind, new_ty, ops)
    }

    pub(crate) fn rebuild_kind(&mut self, kind : &DefKind, new_ty : Option<NodeId>, ops : &[NodeId]) -> NodeId {
        match kind {
            App => self.app(ops[0], ops[1]),
            Arity(n) => {
                let q = match new_ty {
                    Some(t) => self.op(t, 0),
                    None => self.unlimited(),
                };
                self.arity_q(q, *n)
            },
            ArityKind => self.arity_kind(ops[0]),
            MultiArityKind => self.multi_arity_kind(ops[0]),
            Star => self.star(ops[0]),
            Universe => self.universe(),
            QualifierType => self.qualifier_type(),
            Qualifier(q) => self.qualifier(*q),
            Bottom => self.bottom(new_ty.unwrap()),
            Top => self.top(new_ty.unwrap()),
            Extract => self.extract(ops[0], ops[1]),
            Insert => self.insert(ops[0], ops[1], ops[2]),
            Intersection => self.intersection_with(new_ty.unwrap(), ops),
            Variant => self.variant_with(new_ty.unwrap(), ops),
            Any(..) => self.any(new_ty.unwrap(), ops[0]),
            Lambda => {
                let pi = new_ty.unwrap();
                let domain = self.op(pi, 0);
                self.lambda_with(ops[0], domain, ops[1])
            },
            Lit(b) => self.lit(new_ty.unwrap(), *b),
            Match => self.match_(ops[0], &ops[1..]),
            Pack => {
                let t = new_ty.unwrap();
                let a = match self.kind(t).clone() {
                    Variadic => self.op(t, 0),
                    Sigma => {
                        let n = self.num_ops(t) as u64;
                        self.arity(n)
                    },
                    _ => self.arity(1),
                };
                self.pack(a, ops[0])
            },
            Param => self.param(ops[0]),
            Pi => self.pi(ops[0], ops[1]),
            Pick => self.pick(new_ty.unwrap(), ops[0]),
            Sigma => self.sigma(ops),
            Singleton => self.singleton(ops[0]),
            Tuple => self.tuple(ops),
            Var(k) => self.var(new_ty.unwrap(), *k),
            Variadic => self.variadic(ops[0], ops[1]),
            Axiom(..) => crate::errors::err_bad_rebuild(line!(), kind),
        }
    }

    /// Clone the shell of a nominal def at a new type, operands pending.
    pub(crate) fn stub(&mut self, old_kind : &DefKind, new_ty : NodeId, num_ops : usize, name : Option<&str>) -> NodeId {
        match old_kind {
            Lambda => self.nominal_lambda(new_ty, name),
            Sigma => self.nominal_sigma(new_ty, num_ops, name),
            Variant => self.nominal_variant(new_ty, num_ops, name),
            Axiom(norm) => self.axiom_with(new_ty, *norm, name),
            _ => crate::errors::err_bad_rebuild(line!(), old_kind),
        }
    }

    /* -------------------------------------------------------------------- */
    /* primitive operators                                                  */
    /* -------------------------------------------------------------------- */

    fn install_ops(&mut self) {
        let int_ax = {
            let nat = self.type_nat;
            let s = self.star_u();
            let t = self.pi(nat, s);
            self.axiom(t, "int")
        };
        let float_ax = {
            let nat = self.type_nat;
            let s = self.star_u();
            let t = self.pi(nat, s);
            self.axiom(t, "float")
        };
        self.prim.type_int = int_ax;
        self.prim.type_float = float_ax;

        let wty = self.flagged_binop_type(int_ax, false);
        for (i, op) in ALL_WOP.iter().enumerate() {
            self.prim.wop[i] = self.axiom_with(wty, Some(normalize::normalize_wop), Some(op.str()));
        }
        let zty = self.zop_type(int_ax);
        for (i, op) in ALL_ZOP.iter().enumerate() {
            self.prim.zop[i] = self.axiom_with(zty, Some(normalize::normalize_zop), Some(op.str()));
        }
        let ity = self.plain_binop_type(int_ax, false);
        for (i, op) in ALL_IOP.iter().enumerate() {
            self.prim.iop[i] = self.axiom_with(ity, Some(normalize::normalize_iop), Some(op.str()));
        }
        let fty = self.flagged_binop_type(float_ax, false);
        for (i, op) in ALL_FOP.iter().enumerate() {
            self.prim.fop[i] = self.axiom_with(fty, Some(normalize::normalize_fop), Some(op.str()));
        }
        let icty = self.plain_binop_type(int_ax, true);
        for i in 0..NUM_ICMP {
            self.prim.icmp[i] = self.axiom_with(icty, Some(normalize::normalize_icmp), Some(ICMP_NAMES[i]));
        }
        let fcty = self.flagged_binop_type(float_ax, true);
        for i in 0..NUM_FCMP {
            self.prim.fcmp[i] = self.axiom_with(fcty, Some(normalize::normalize_fcmp), Some(FCMP_NAMES[i]));
        }
        for (i, c) in ALL_CAST.iter().enumerate() {
            let (src, dst) = match c {
                Cast::Scast | Cast::Ucast => (int_ax, int_ax),
                Cast::Fcast => (float_ax, float_ax),
                Cast::S2f | Cast::U2f => (int_ax, float_ax),
                Cast::F2s | Cast::F2u => (float_ax, int_ax),
            };
            let cty = self.cast_type(src, dst);
            self.prim.cast[i] = self.axiom_with(cty, Some(normalize::normalize_cast), Some(c.str()));
        }
        let asty = {
            let a = self.arity_kind_u();
            self.pi(a, a)
        };
        self.prim.arity_succ = self.axiom_with(asty, Some(normalize::normalize_arity_succ), Some("ASucc"));
    }

    /// `Πf:nat. Πw:nat. Πs:𝕄. Π[[s; T w], [s; T w]]. [s; R]` where `R` is
    /// `T w` or `bool`.
    fn flagged_binop_type(&mut self, scalar : NodeId, result_bool : bool) -> NodeId {
        let nat = self.type_nat;
        let inner = self.plain_binop_type(scalar, result_bool);
        // the flag binder wraps the width binder; inner already starts at w
        self.pi(nat, inner)
    }

    /// `Πw:nat. Πs:𝕄. Π[[s; T w], [s; T w]]. [s; R]`.
    fn plain_binop_type(&mut self, scalar : NodeId, result_bool : bool) -> NodeId {
        let nat = self.type_nat;
        let mk = self.multi_arity_kind_u();
        // inside the operand Π's domain : s = <0:𝕄>, w = <1:nat>
        let slot0 = {
            let s = self.var(mk, 0);
            let w = self.var(nat, 2);
            let elem = self.app(scalar, w);
            self.variadic(s, elem)
        };
        let slot1 = {
            let s = self.var(mk, 1);
            let w = self.var(nat, 3);
            let elem = self.app(scalar, w);
            self.variadic(s, elem)
        };
        let dom = self.intern_op_sigma(&[slot0, slot1]);
        let cod = if result_bool {
            let s = self.var(mk, 1);
            let b = self.type_bool;
            self.variadic(s, b)
        } else {
            slot1
        };
        let pi_ops = self.pi(dom, cod);
        let pi_s = self.pi(mk, pi_ops);
        self.pi(nat, pi_s)
    }

    /// `Πw:nat. Πs:𝕄. Π[M, [s; int w], [s; int w]]. [M, [s; int w]]`.
    fn zop_type(&mut self, scalar : NodeId) -> NodeId {
        let nat = self.type_nat;
        let mk = self.multi_arity_kind_u();
        let m = self.type_mem;
        let slot1 = {
            let s = self.var(mk, 1);
            let w = self.var(nat, 3);
            let elem = self.app(scalar, w);
            self.variadic(s, elem)
        };
        let slot2 = {
            let s = self.var(mk, 2);
            let w = self.var(nat, 4);
            let elem = self.app(scalar, w);
            self.variadic(s, elem)
        };
        let dom = self.intern_op_sigma(&[m, slot1, slot2]);
        let cod = {
            let s = self.var(mk, 2);
            let w = self.var(nat, 4);
            let elem = self.app(scalar, w);
            let v = self.variadic(s, elem);
            self.intern_op_sigma(&[m, v])
        };
        let pi_ops = self.pi(dom, cod);
        let pi_s = self.pi(mk, pi_ops);
        self.pi(nat, pi_s)
    }

    /// `Π[dw:nat, sw:nat]. Πs:𝕄. Π[s; S sw]. [s; D dw]`.
    fn cast_type(&mut self, src : NodeId, dst : NodeId) -> NodeId {
        let nat = self.type_nat;
        let mk = self.multi_arity_kind_u();
        let pair = self.sigma(&[nat, nat]);
        let dom = {
            let s = self.var(mk, 0);
            let p = self.var(pair, 2);
            let sw = self.extract_at(p, 1);
            let elem = self.app(src, sw);
            self.variadic(s, elem)
        };
        let cod = {
            let s = self.var(mk, 1);
            let p = self.var(pair, 3);
            let dw = self.extract_at(p, 0);
            let elem = self.app(dst, dw);
            self.variadic(s, elem)
        };
        let pi_ops = self.pi(dom, cod);
        let pi_s = self.pi(mk, pi_ops);
        self.pi(pair, pi_s)
    }

    /// Operand sigmas of the operator types must stay sigmas even when all
    /// slots coincide after interning, so they bypass the homogeneous
    /// collapse of the public factory.
    fn intern_op_sigma(&mut self, ops : &[NodeId]) -> NodeId {
        let ty = self.infer_max_type(ops, false, None);
        self.intern(Sigma, Some(ty), ops)
    }

    pub fn wop_axiom(&self, op : WOp) -> NodeId {
        self.prim.wop[op as usize]
    }

    pub fn zop_axiom(&self, op : ZOp) -> NodeId {
        self.prim.zop[op as usize]
    }

    pub fn iop_axiom(&self, op : IOp) -> NodeId {
        self.prim.iop[op as usize]
    }

    pub fn fop_axiom(&self, op : FOp) -> NodeId {
        self.prim.fop[op as usize]
    }

    pub fn icmp_axiom(&self, key : ICmp) -> NodeId {
        self.prim.icmp[key.0 as usize]
    }

    pub fn fcmp_axiom(&self, key : FCmp) -> NodeId {
        self.prim.fcmp[key.0 as usize]
    }

    pub fn cast_axiom(&self, c : Cast) -> NodeId {
        self.prim.cast[c as usize]
    }

    pub fn arity_succ_axiom(&self) -> NodeId {
        self.prim.arity_succ
    }

    pub(crate) fn which_wop(&self, ax : NodeId) -> Option<WOp> {
        ALL_WOP.iter().copied().find(|&o| self.prim.wop[o as usize] == ax)
    }

    pub(crate) fn which_zop(&self, ax : NodeId) -> Option<ZOp> {
        ALL_ZOP.iter().copied().find(|&o| self.prim.zop[o as usize] == ax)
    }

    pub(crate) fn which_iop(&self, ax : NodeId) -> Option<IOp> {
        ALL_IOP.iter().copied().find(|&o| self.prim.iop[o as usize] == ax)
    }

    pub(crate) fn which_fop(&self, ax : NodeId) -> Option<FOp> {
        ALL_FOP.iter().copied().find(|&o| self.prim.fop[o as usize] == ax)
    }

    pub(crate) fn which_icmp(&self, ax : NodeId) -> Option<ICmp> {
        (0..NUM_ICMP).find(|&i| self.prim.icmp[i] == ax).map(|i| ICmp(i as u8))
    }

    pub(crate) fn which_fcmp(&self, ax : NodeId) -> Option<FCmp> {
        (0..NUM_FCMP).find(|&i| self.prim.fcmp[i] == ax).map(|i| FCmp(i as u8))
    }

    pub(crate) fn which_cast(&self, ax : NodeId) -> Option<Cast> {
        ALL_CAST.iter().copied().find(|&c| self.prim.cast[c as usize] == ax)
    }

    /// The scalar width and the shape of an operand, read off its type.
    pub fn infer_width_and_shape(&mut self, a : NodeId) -> (NodeId, NodeId) {
        let t = self.destructing_type(a);
        match self.kind(t).clone() {
            Variadic => {
                let mut arities = Vec::new();
                let mut cur = t;
                while matches!(self.kind(cur), Variadic) {
                    arities.push(self.op(cur, 0));
                    cur = self.op(cur, 1);
                }
                let width = match self.kind(cur) {
                    App => self.op(cur, 1),
                    _ => {
                        self.errorf(format!("operand element type is not a primitive type application"));
                        self.lit_nat(0)
                    },
                };
                let shape = if arities.len() == 1 {
                    arities[0]
                } else {
                    self.sigma(&arities)
                };
                (width, shape)
            },
            App => {
                let w = self.op(t, 1);
                let a1 = self.arity(1);
                (w, a1)
            },
            _ => {
                self.errorf(format!("operand type carries no width"));
                let w = self.lit_nat(0);
                let a1 = self.arity(1);
                (w, a1)
            },
        }
    }

    pub fn op_wop(&mut self, op : WOp, flags : WFlags, a : NodeId, b : NodeId) -> NodeId {
        let (width, shape) = self.infer_width_and_shape(a);
        let ax = self.wop_axiom(op);
        let f = self.lit_nat(flags.bits());
        let c = self.app(ax, f);
        let c = self.app(c, width);
        let c = self.app(c, shape);
        self.app_pair(c, a, b)
    }

    pub fn op_zop(&mut self, op : ZOp, m : NodeId, a : NodeId, b : NodeId) -> NodeId {
        let (width, shape) = self.infer_width_and_shape(a);
        let ax = self.zop_axiom(op);
        let c = self.app(ax, width);
        let c = self.app(c, shape);
        let t = self.tuple(&[m, a, b]);
        self.app(c, t)
    }

    pub fn op_iop(&mut self, op : IOp, a : NodeId, b : NodeId) -> NodeId {
        let (width, shape) = self.infer_width_and_shape(a);
        let ax = self.iop_axiom(op);
        let c = self.app(ax, width);
        let c = self.app(c, shape);
        self.app_pair(c, a, b)
    }

    pub fn op_fop(&mut self, op : FOp, flags : FFlags, a : NodeId, b : NodeId) -> NodeId {
        let (width, shape) = self.infer_width_and_shape(a);
        let ax = self.fop_axiom(op);
        let f = self.lit_nat(flags.bits());
        let c = self.app(ax, f);
        let c = self.app(c, width);
        let c = self.app(c, shape);
        self.app_pair(c, a, b)
    }

    pub fn op_icmp(&mut self, key : ICmp, a : NodeId, b : NodeId) -> NodeId {
        let (width, shape) = self.infer_width_and_shape(a);
        let ax = self.icmp_axiom(key);
        let c = self.app(ax, width);
        let c = self.app(c, shape);
        self.app_pair(c, a, b)
    }

    pub fn op_fcmp(&mut self, flags : FFlags, key : FCmp, a : NodeId, b : NodeId) -> NodeId {
        let (width, shape) = self.infer_width_and_shape(a);
        let ax = self.fcmp_axiom(key);
        let f = self.lit_nat(flags.bits());
        let c = self.app(ax, f);
        let c = self.app(c, width);
        let c = self.app(c, shape);
        self.app_pair(c, a, b)
    }

    pub fn op_cast(&mut self, cast : Cast, dw : u64, a : NodeId) -> NodeId {
        let (sw, shape) = self.infer_width_and_shape(a);
        let ax = self.cast_axiom(cast);
        let dwl = self.lit_nat(dw);
        let pair = self.tuple(&[dwl, sw]);
        let c = self.app(ax, pair);
        let c = self.app(c, shape);
        self.app(c, a)
    }

    pub fn arity_succ(&mut self, a : NodeId) -> NodeId {
        let ax = self.prim.arity_succ;
        self.app(ax, a)
    }
}

impl Default for World {
    fn default() -> Self {
        World::new()
    }
}

#[cfg(test)]
mod world_tests {
    use super::*;
    use crate::qualifier::QualifierTag::*;

    #[test]
    fn sorts_walk_up_to_the_universe() {
        let w = &mut World::new();
        let u = w.universe();
        assert_eq!(w.sort(u), crate::def::Sort::Universe);
        let s = w.star_u();
        assert_eq!(w.sort(s), crate::def::Sort::Kind);
        let nat = w.type_nat();
        assert_eq!(w.sort(nat), crate::def::Sort::Type);
        let n = w.lit_nat(3);
        assert_eq!(w.sort(n), crate::def::Sort::Term);
        let a2 = w.arity(2);
        assert_eq!(w.sort(a2), crate::def::Sort::Type);
    }

    #[test]
    fn free_vars_of_binders() {
        let w = &mut World::new();
        let nat = w.type_nat();
        let s = w.star_u();
        let v0 = w.var(nat, 0);
        assert!(w.fv_test(v0, 0));
        let lam = w.lambda(nat, v0);
        assert!(w.fv_none(lam));

        let t1 = w.var(s, 0);
        let t2 = w.var(s, 1);
        assert!(w.free_vars(t2).test(1));
        assert!(w.free_vars(t2).any_begin(1));
        let inner = w.pi(t1, t2);
        let outer = w.pi(s, inner);
        assert!(w.fv_none(outer));
    }

    #[test]
    fn qualifier_values() {
        let w = &mut World::new();
        let u = w.unlimited();
        let r = w.relevant();
        let a = w.affine();
        let l = w.linear();
        for q in [u, r, a, l].iter() {
            assert!(w.is_value(*q));
            // the qualifier of a qualifier is unlimited
            let qq = w.qualifier_of(*q);
            assert_eq!(qq, u);
        }
        let qt = w.qualifier_type();
        let lub = |w : &mut World, defs : &[NodeId]| w.variant_with(qt, defs);
        assert_eq!(lub(w, &[u]), u);
        assert_eq!(lub(w, &[u, u, u]), u);
        assert_eq!(lub(w, &[u, r]), r);
        assert_eq!(lub(w, &[a, u]), a);
        assert_eq!(lub(w, &[a, l]), l);
        assert_eq!(lub(w, &[a, r]), l);
        assert_eq!(lub(w, &[u, l, r, r]), l);

        let v = w.var(qt, 0);
        assert_eq!(w.qualifier_of(v), u);
        assert_eq!(lub(w, &[v]), v);
        assert_eq!(lub(w, &[u, v, u]), v);
        assert_eq!(lub(w, &[v, l]), l);
        assert_eq!(lub(w, &[r, v, a]), l);
    }

    #[test]
    fn sigma_kind_qualifiers() {
        let w = &mut World::new();
        let a = w.affine();
        let r = w.relevant();
        let l = w.linear();
        let star_a = w.star(a);
        let star_r = w.star(r);
        let star_u = w.star_u();
        let anat = w.axiom(star_a, "anat");
        let rnat = w.axiom(star_r, "rnat");

        let mixed = w.sigma(&[anat, star_u]);
        assert_eq!(w.qualifier_of(mixed), a);

        let both = w.sigma(&[anat, rnat]);
        assert_eq!(w.qualifier_of(both), l);

        let star_l = w.star(l);
        let with_kind = w.sigma(&[anat, star_l]);
        assert_eq!(w.qualifier_of(with_kind), a);

        let variant = w.variant(&[star_u, star_a]);
        assert_eq!(w.qualifier_of(variant), a);
        let variant = w.variant(&[star_r, star_l]);
        assert_eq!(w.qualifier_of(variant), l);
    }

    #[test]
    fn sigma_collapses() {
        let w = &mut World::new();
        let nat = w.type_nat();
        let unit = w.unit();
        assert_eq!(w.sigma(&[]), unit);
        assert_eq!(w.sigma(&[nat]), nat);
        let hom = w.sigma(&[nat, nat]);
        assert!(matches!(w.kind(hom), Variadic));
        let a2 = w.arity(2);
        assert_eq!(w.op(hom, 0), a2);
    }

    #[test]
    fn arity_sigma_is_a_multi_arity() {
        let w = &mut World::new();
        let a0 = w.arity(0);
        let a2 = w.arity(2);
        let a3 = w.arity(3);
        assert_eq!(w.sigma(&[a0, a0]), a0);
        assert_eq!(w.sigma(&[a2, a0]), a0);
        assert_eq!(w.sigma(&[a0, a2]), a0);

        let m = w.sigma(&[a2, a3]);
        let mk = w.multi_arity_kind_u();
        assert_eq!(w.ty(m), Some(mk));

        // a component of multi-arity kind pushes the whole sigma to *
        let inner = w.sigma(&[a3, a2]);
        let s = w.sigma(&[a2, inner, a3]);
        let star = w.star_u();
        assert_eq!(w.ty(s), Some(star));
    }

    #[test]
    fn pi_types() {
        let w = &mut World::new();
        let s = w.star_u();
        let nat = w.type_nat();
        let a2 = w.arity(2);
        let ak = w.arity_kind_u();
        let u = w.universe();
        let p = w.pi(s, s);
        assert_eq!(w.ty(p), Some(u));
        let p = w.pi(s, ak);
        assert_eq!(w.ty(p), Some(u));
        let p = w.pi(nat, nat);
        assert_eq!(w.ty(p), Some(s));
        let p = w.pi(nat, a2);
        assert_eq!(w.ty(p), Some(s));
        let a3 = w.arity(3);
        let pair = w.sigma(&[a2, a3]);
        let p = w.pi(nat, pair);
        assert_eq!(w.ty(p), Some(s));
    }

    #[test]
    fn variadic_expansion_and_packs() {
        let w = &mut World::new();
        let nat = w.type_nat();
        let a3 = w.arity(3);
        let v = w.variadic(a3, nat);
        assert!(matches!(w.kind(v), Variadic));
        let five = w.arity(5);
        let v5 = w.variadic(five, nat);
        let arity = w.arity_of(v5).unwrap();
        assert_eq!(arity, five);

        // a dependent body of literal arity expands to a sigma
        let b = w.type_bool();
        let a2 = w.arity(2);
        let cases = w.tuple(&[nat, b]);
        let i = w.var(a2, 0);
        let body = w.extract(cases, i);
        let expanded = w.variadic(a2, body);
        let expected = w.sigma(&[nat, b]);
        assert_eq!(expanded, expected);

        let n0 = w.lit_nat(7);
        let p = w.pack(a3, n0);
        assert!(matches!(w.kind(p), Pack));
        assert_eq!(w.extract_at(p, 2), n0);

        let a0 = w.arity(0);
        let t0 = w.tuple0();
        assert_eq!(w.pack(a0, n0), t0);
        let a1 = w.arity(1);
        assert_eq!(w.pack(a1, n0), n0);
    }

    #[test]
    fn pack_eta() {
        let w = &mut World::new();
        let nat = w.type_nat();
        let ak = w.arity_kind_u();
        let v43 = w.var(ak, 43);
        let arr_ty = w.variadic(v43, nat);
        let arr = w.var(arr_ty, 23);
        let idx = w.var(v43, 0);
        let body = w.extract(arr, idx);
        let a42 = w.var(ak, 42);
        let packed = w.pack(a42, body);
        let shifted_ty = crate::reduce::shift_free_vars(w, arr_ty, -1);
        let expected = w.var(shifted_ty, 22);
        assert_eq!(packed, expected);
    }

    #[test]
    fn extract_through_dependent_sigma() {
        let w = &mut World::new();
        let s = w.star_u();
        let poly_t = w.pi(s, s);
        let poly = w.axiom(poly_t, "Poly");
        let v0 = w.var(s, 0);
        let applied = w.app(poly, v0);
        let sig = w.sigma(&[s, applied]);
        let val = w.axiom(sig, "val");
        let fst = w.extract_at(val, 0);
        assert_eq!(w.ty(fst), Some(s));
        let snd = w.extract_at(val, 1);
        // the projected type is Poly applied to the first projection
        let expected = w.app(poly, fst);
        assert_eq!(w.ty(snd), Some(expected));
    }

    #[test]
    fn extract_with_variable_index() {
        let w = &mut World::new();
        let a2 = w.arity(2);
        let nat = w.type_nat();
        let n2 = w.lit_nat(2);
        let n4 = w.lit_nat(4);
        let t = w.tuple(&[n2, n4]);
        let i = w.var(a2, 0);
        let e = w.extract(t, i);
        assert_eq!(w.ty(e), Some(nat));

        // all components equal : the extract disappears
        let t2 = w.tuple(&[n2, n2]);
        assert_eq!(w.extract(t2, i), n2);

        // components of different kinds join at their common supertype
        let s = w.star_u();
        let mixed = w.tuple(&[a2, nat]);
        let e = w.extract(mixed, i);
        assert_eq!(w.ty(e), Some(s));
    }

    #[test]
    fn insert_folds_on_tuples() {
        let w = &mut World::new();
        let n1 = w.lit_nat(1);
        let n2 = w.lit_nat(2);
        let n9 = w.lit_nat(9);
        let t = w.tuple(&[n1, n2]);
        let r = w.insert_at(t, 0, n9);
        let expected = w.tuple(&[n9, n2]);
        assert_eq!(r, expected);
    }

    #[test]
    fn nominal_protocol() {
        let w = &mut World::new();
        let nat = w.type_nat();
        let pi = w.pi(nat, nat);
        let f = w.nominal_lambda(pi, Some("f"));
        assert!(w.is_nominal(f));

        // a nominal is never interned together with an identical one
        let g = w.nominal_lambda(pi, Some("g"));
        assert_ne!(f, g);

        let filt = w.lit_false();
        w.set_op(f, 0, filt).unwrap();
        // recursion through the parameter : f's body calls f again
        let p = w.param(f);
        let call = w.app(f, p);
        w.set_op(f, 1, call).unwrap();
        assert!(w.fv_none(f));

        // the param is hash-consed, one per lambda
        assert_eq!(w.param(f), p);
        assert_ne!(w.param(g), p);

        // slots fill exactly once
        assert!(w.set_op(f, 1, filt).is_err());

        // unfolding the application substitutes the argument for the param
        let n3 = w.lit_nat(3);
        let app = w.app(f, n3);
        let unfolded = w.unfold(app);
        let expected = w.app(f, n3);
        assert_eq!(unfolded, expected);
    }

    #[test]
    fn use_sets_and_replace() {
        let w = &mut World::new();
        let n1 = w.lit_nat(1);
        let n2 = w.lit_nat(2);
        let pair = w.tuple(&[n1, n2]);
        assert!(w.def(n1).uses().iter().any(|u| u.user == pair && u.index == 0));

        let n9 = w.lit_nat(9);
        w.replace(n1, n9);
        assert_eq!(w.op(pair, 0), n9);
        assert_eq!(w.resolve(n1), n9);
        assert!(w.def(n1).uses().is_empty());
    }

    #[test]
    fn singleton_distribution() {
        let w = &mut World::new();
        let nat = w.type_nat();
        let n5 = w.lit_nat(5);
        let s1 = w.singleton(n5);
        assert!(matches!(w.kind(s1), Singleton));
        let star = w.star_u();
        assert_eq!(w.ty(s1), Some(star));
        // singleton is idempotent through the type
        let inhabitant = w.axiom_anon(s1);
        assert_eq!(w.singleton(inhabitant), s1);

        // a pair distributes componentwise
        let b = w.type_bool();
        let sig = w.sigma(&[nat, b]);
        let p = w.axiom(sig, "p");
        let sp = w.singleton(p);
        assert!(matches!(w.kind(sp), Sigma | Variadic));
    }

    #[test]
    fn any_pick_roundtrips() {
        let w = &mut World::new();
        let nat = w.type_nat();
        let b = w.type_bool();
        let v = w.variant(&[nat, b]);
        let n1 = w.lit_nat(1);
        let inj = w.any(v, n1);
        assert!(matches!(w.kind(inj), Any(..)));
        assert_eq!(w.ty(inj), Some(v));
        // injecting into a non-variant is the identity
        assert_eq!(w.any(nat, n1), n1);

        let i = w.intersection(&[nat, b]);
        let x = w.axiom(i, "x");
        let picked = w.pick(nat, x);
        assert!(matches!(w.kind(picked), Pick));
        assert_eq!(w.ty(picked), Some(nat));
    }

    #[test]
    fn error_sink_sees_diagnostics() {
        use std::sync::{ Arc, Mutex };
        let w = &mut World::new();
        let log : Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let log2 = log.clone();
        w.set_error_handler(Box::new(move |msg| {
            log2.lock().unwrap().push(msg.to_string());
        }));
        let n1 = w.lit_nat(1);
        // applying a non-function is a type error, reported and absorbed
        let r = w.app(n1, n1);
        assert!(matches!(w.kind(r), Bottom));
        assert!(!log.lock().unwrap().is_empty());
    }

    #[test]
    fn index_literals() {
        let w = &mut World::new();
        let i = w.index(1, 3);
        let a3 = w.arity(3);
        assert_eq!(w.ty(i), Some(a3));
        assert_eq!(w.lit_u64(i), Some(1));
        let oob = w.index(3, 3);
        assert!(matches!(w.kind(oob), Bottom));
    }

    #[test]
    fn qualifier_tags_roundtrip() {
        let w = &mut World::new();
        for tag in [Unlimited, Relevant, Affine, Linear].iter() {
            let q = w.qualifier(*tag);
            assert_eq!(w.is_const_qualifier(q), Some(*tag));
        }
    }
}
