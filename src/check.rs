use fxhash::FxHashSet;

use crate::def::{ DefKind, NodeId };
use crate::reduce::{ reduce, reduce1, shift_free_vars };
use crate::world::World;

use DefKind::*;

impl World {
    /// The declared-subkinding relation : an arity kind sits inside the
    /// multi-arity kind sits inside the star of the same qualifier, and Π is
    /// contravariant in its domain, covariant in its codomain. Σ and
    /// variadics are not subtyped.
    pub fn subtype_of(&mut self, a : NodeId, b : NodeId) -> bool {
        if a == b {
            return true
        }
        match (self.kind(a).clone(), self.kind(b).clone()) {
            (ArityKind, MultiArityKind)
            | (ArityKind, Star)
            | (MultiArityKind, Star) => self.op(a, 0) == self.op(b, 0),
            (Pi, Pi) => {
                let ta = self.ty_of(a);
                let tb = self.ty_of(b);
                if !self.subtype_of(ta, tb) {
                    return false
                }
                let dom_a = self.op(a, 0);
                let dom_b = self.op(b, 0);
                let cod_a = self.op(a, 1);
                let cod_b = self.op(b, 1);
                self.subtype_of(dom_b, dom_a) && self.subtype_of(cod_a, cod_b)
            },
            _ => false,
        }
    }

    /// Can `def` inhabit the type `ty`? Structural for Σ and variadics,
    /// subkinding everywhere else.
    pub fn assignable(&mut self, ty : NodeId, def : NodeId) -> bool {
        let dt = self.destructing_type(def);
        if dt == ty || self.subtype_of(dt, ty) {
            return true
        }
        match self.kind(ty) {
            Sigma => self.sigma_assignable(ty, def),
            Variadic => self.variadic_assignable(ty, def),
            _ => false,
        }
    }

    fn sigma_assignable(&mut self, sig : NodeId, def : NodeId) -> bool {
        let dt = self.destructing_type(def);
        if dt == sig {
            return true
        }
        if self.is_nominal(sig) && self.num_ops(sig) == 1 && dt == self.op(sig, 0) {
            return true
        }
        let tt = self.ty_of(dt);
        let st = self.ty_of(sig);
        if !self.subtype_of(tt, st) {
            return false
        }
        let n = self.num_ops(sig);
        let elems : Vec<NodeId> = match self.kind(def).clone() {
            Pack => {
                match self.has_constant_arity(def) {
                    Some(a) if a == n as u64 => (0..n).map(|i| i as u64).collect::<Vec<_>>()
                        .into_iter().map(|i| self.extract_at(def, i)).collect(),
                    _ => return false,
                }
            },
            Tuple => {
                if self.num_ops(def) != n {
                    return false
                }
                self.ops(def).to_vec()
            },
            _ => return false,
        };
        for i in 0..n {
            let slot = self.op(sig, i);
            let reduced = reduce(self, slot, &elems[..i], 0);
            if !self.assignable(reduced, elems[i]) {
                return false
            }
        }
        true
    }

    fn variadic_assignable(&mut self, var : NodeId, def : NodeId) -> bool {
        let dt = self.destructing_type(def);
        if dt == var {
            return true
        }
        let arity = self.op(var, 0);
        let body = self.op(var, 1);
        if matches!(self.kind(def), Pack) {
            let pt = self.ty_of(def);
            if !matches!(self.kind(pt), Variadic) || self.op(pt, 0) != arity {
                return false
            }
            let pbody = self.op(def, 0);
            return self.assignable(body, pbody)
        }
        // a tuple of matching literal length assigns component-wise
        if matches!(self.kind(def), Tuple) {
            if let Arity(n) = *self.kind(arity) {
                if n != self.num_ops(def) as u64 {
                    return false
                }
                for i in 0..n {
                    let idx = self.index(i, n);
                    let reduced = reduce1(self, body, idx);
                    let el = self.op(def, i as usize);
                    if !self.assignable(reduced, el) {
                        return false
                    }
                }
                return true
            }
        }
        false
    }
}

/// The environment-threaded validation pass : walks a closed def, keeping a
/// stack of the binder types in scope, and compares every variable's
/// declared type against the binder it points at. Nominal cycles are cut by
/// the (environment prefix, def) memo set.
pub struct TypeCheck {
    done : FxHashSet<(Box<[NodeId]>, NodeId)>,
}

impl TypeCheck {
    pub fn new() -> Self {
        TypeCheck { done : FxHashSet::default() }
    }

    pub fn check(&mut self, world : &mut World, def : NodeId, env : &mut Vec<NodeId>) {
        // anything closed checks in the empty environment, whatever context
        // it was reached from
        let key_env : Box<[NodeId]> = if world.fv_none(def) {
            Vec::new().into_boxed_slice()
        } else {
            env.clone().into_boxed_slice()
        };
        if !self.done.insert((key_env, def)) {
            return
        }
        match world.kind(def).clone() {
            Var(k) => {
                let k = k as usize;
                if env.len() <= k {
                    // free at this point; the enclosing binder checks it
                    return
                }
                let reverse_index = env.len() - 1 - k;
                let t = world.ty_of(def);
                let shifted = shift_free_vars(world, t, -(k as i64) - 1);
                let expected = env[reverse_index];
                if expected != shifted {
                    world.errorf(format!(
                        "the type of variable <{}> does not match the type declared by its binder", k));
                }
            },
            Lambda => {
                let pi = world.ty_of(def);
                let pi_ty = world.ty_of(pi);
                self.fcheck(world, pi_ty, env);
                let domain = world.op(pi, 0);
                let codomain = world.op(pi, 1);
                let body = world.op(def, 1);
                self.dependent_check(world, env, &[domain], &[codomain, body]);
            },
            Pi => {
                let t = world.ty_of(def);
                self.fcheck(world, t, env);
                let domain = world.op(def, 0);
                let codomain = world.op(def, 1);
                self.dependent_check(world, env, &[domain], &[codomain]);
            },
            Sigma => {
                let t = world.ty_of(def);
                self.fcheck(world, t, env);
                let ops = world.ops(def).to_vec();
                self.dependent_check(world, env, &ops, &[]);
            },
            Variadic => {
                let t = world.ty_of(def);
                self.fcheck(world, t, env);
                let arity = world.op(def, 0);
                let body = world.op(def, 1);
                self.dependent_check(world, env, &[arity], &[body]);
            },
            Pack => {
                let t = world.ty_of(def);
                self.fcheck(world, t, env);
                let arity = match world.kind(t) {
                    Variadic => world.op(t, 0),
                    _ => {
                        let n = world.num_ops(t) as u64;
                        world.arity(n)
                    },
                };
                let body = world.op(def, 0);
                self.dependent_check(world, env, &[arity], &[body]);
            },
            _ => {
                if let Some(t) = world.ty(def) {
                    self.fcheck(world, t, env);
                }
                let ops = world.ops(def).to_vec();
                for op in ops {
                    self.fcheck(world, op, env);
                }
            },
        }
    }

    /// Skip defs that cannot mention a binder : they were checked when they
    /// were closed.
    fn fcheck(&mut self, world : &mut World, def : NodeId, env : &mut Vec<NodeId>) {
        if world.fv_any(def) || matches!(world.kind(def), Var(..)) {
            self.check(world, def, env)
        }
    }

    fn dependent_check(&mut self, world : &mut World, env : &mut Vec<NodeId>, binders : &[NodeId], bodies : &[NodeId]) {
        let old_len = env.len();
        for &b in binders {
            self.fcheck(world, b, env);
            env.push(b);
        }
        for &b in bodies {
            self.fcheck(world, b, env);
        }
        env.truncate(old_len);
    }
}

/// Validate a closed def against an empty environment. Diagnostics go to the
/// world's error sink; the walk itself never fails.
pub fn check_closed(world : &mut World, def : NodeId) {
    debug_assert!(world.fv_none(def));
    let mut tc = TypeCheck::new();
    let mut env = Vec::new();
    tc.check(world, def, &mut env);
}
