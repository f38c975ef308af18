use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::def::{ DefKind, NodeId };
use crate::world::World;

/// Capture-avoiding substitution under De Bruijn indices. One engine serves
/// both β-reduction (replace the variables bound by the innermost binders
/// with arguments, shifting everything above down) and pure index shifting;
/// the two cases only differ in what happens at a `Var`.
///
/// Results are memoized per (def, offset) pair : the same subterm met at the
/// same binder depth reduces to the same thing, and expression graphs share
/// heavily, so the memo map is what keeps this linear in practice.
struct Reducer<'w> {
    world : &'w mut World,
    /// Substituends for β; empty for a pure shift. The *last* argument
    /// corresponds to index `offset` (the innermost binder).
    args : Vec<NodeId>,
    /// Amount subtracted from every free index : the argument count for β,
    /// the negated shift for a pure shift.
    delta : i64,
    map : FxHashMap<(NodeId, usize), NodeId>,
}

impl<'w> Reducer<'w> {
    fn run(&mut self, def : NodeId, offset : usize) -> NodeId {
        if self.world.fv_none_begin(def, offset) {
            return def
        }
        if let Some(&cached) = self.map.get(&(def, offset)) {
            return cached
        }
        let new_ty = match self.world.ty(def) {
            Some(t) => Some(self.run(t, offset)),
            None => None,
        };
        if let DefKind::Var(k) = *self.world.kind(def) {
            let k = k as usize;
            return self.var_case(k, new_ty.expect("vars are typed"), offset)
        }
        // nominals are closed, so the free-var guard already returned them
        debug_assert!(!self.world.is_nominal(def));
        let num = self.world.num_ops(def);
        let mut new_ops : SmallVec<[NodeId; 2]> = SmallVec::with_capacity(num);
        for i in 0..num {
            let op = self.world.op(def, i);
            let shift = self.world.shift_of(def, i);
            new_ops.push(self.run(op, offset + shift));
        }
        let res = self.world.rebuild(def, new_ty, &new_ops);
        self.map.insert((def, offset), res);
        res
    }

    fn var_case(&mut self, k : usize, new_ty : NodeId, offset : usize) -> NodeId {
        if !self.args.is_empty() {
            let nargs = self.args.len();
            if offset <= k && k < offset + nargs {
                // the lowest index names the last argument, De Bruijn-style
                let arg = self.args[nargs - 1 - (k - offset)];
                let shifted = shift_free_vars(self.world, arg, offset as i64);
                // a substituend of the wrong type turns into the Bottom of
                // the expected type, in place
                if !self.world.assignable(new_ty, shifted) {
                    self.world.errorf(format!("substituted argument does not inhabit the variable's type"));
                    return self.world.error(new_ty)
                }
                return shifted
            }
        }
        if k < offset {
            // bound below the substitution point : keep the index, the type
            // may still mention substituted variables
            return self.world.var(new_ty, k as u64)
        }
        let new_k = k as i64 - self.delta;
        debug_assert!(new_k >= 0);
        self.world.var(new_ty, new_k as u64)
    }
}

/// Replace the `args.len()` innermost binders of `def` (starting at depth
/// `index`) by `args` and shift the remaining free variables down.
pub fn reduce(world : &mut World, def : NodeId, args : &[NodeId], index : usize) -> NodeId {
    if args.is_empty() || world.fv_none_begin(def, index) {
        return def
    }
    let delta = args.len() as i64;
    let mut r = Reducer { world, args : args.to_vec(), delta, map : FxHashMap::default() };
    r.run(def, index)
}

/// β-reduce one binder : `def[arg/0]`.
pub fn reduce1(world : &mut World, def : NodeId, arg : NodeId) -> NodeId {
    reduce(world, def, &[arg], 0)
}

/// Add `delta` to every free De Bruijn index of `def`. Positive deltas move
/// a def under additional binders; negative deltas move it out, and require
/// that no index would drop below zero.
pub fn shift_free_vars(world : &mut World, def : NodeId, delta : i64) -> NodeId {
    if delta == 0 || world.fv_none(def) {
        return def
    }
    if delta < 0 && world.fv_any_end(def, (-delta) as usize) {
        world.errorf(format!("cannot shift def by {}, an index would become negative", delta));
        return def
    }
    let mut r = Reducer { world, args : Vec::new(), delta : -delta, map : FxHashMap::default() };
    r.run(def, 0)
}

/// Uncurry a body expecting one tuple argument into one expecting the
/// flattened argument list : substitutes a fresh tuple of vars.
pub fn flatten(world : &mut World, body : NodeId, arg_types : &[NodeId]) -> NodeId {
    let n = arg_types.len();
    let mut vars = Vec::with_capacity(n);
    for (i, &t) in arg_types.iter().enumerate() {
        let v = world.var(t, (n - 1 - i) as u64);
        vars.push(v);
    }
    let t = world.tuple(&vars);
    reduce1(world, body, t)
}

#[cfg(test)]
mod reduce_tests {
    use super::*;

    #[test]
    fn shift_roundtrip() {
        let w = &mut World::new();
        let nat = w.type_nat();
        let v0 = w.var(nat, 0);
        let up = shift_free_vars(w, v0, 3);
        assert!(matches!(w.kind(up), DefKind::Var(3)));
        let down = shift_free_vars(w, up, -3);
        assert_eq!(down, v0);
    }

    #[test]
    fn shift_composes() {
        let w = &mut World::new();
        let nat = w.type_nat();
        let s = w.star_u();
        let v2 = w.var(nat, 2);
        let v5 = w.var(s, 5);
        let t = w.tuple(&[v2, v5]);
        let one_then_two = {
            let a = shift_free_vars(w, t, 1);
            shift_free_vars(w, a, 2)
        };
        let three = shift_free_vars(w, t, 3);
        assert_eq!(one_then_two, three);
    }

    #[test]
    fn closed_defs_do_not_reduce() {
        let w = &mut World::new();
        let n = w.lit_nat(42);
        let arg = w.lit_nat(7);
        assert_eq!(reduce1(w, n, arg), n);
        assert_eq!(shift_free_vars(w, n, 5), n);
    }

    #[test]
    fn beta_replaces_var_zero() {
        let w = &mut World::new();
        let nat = w.type_nat();
        let v0 = w.var(nat, 0);
        let n23 = w.lit_nat(23);
        assert_eq!(reduce1(w, v0, n23), n23);
        // a var above the binder shifts down
        let v1 = w.var(nat, 1);
        let red = reduce1(w, v1, n23);
        assert!(matches!(w.kind(red), DefKind::Var(0)));
    }

    #[test]
    fn beta_type_mismatch_is_bottom() {
        let w = &mut World::new();
        let nat = w.type_nat();
        let v0 = w.var(nat, 0);
        let tru = w.lit_true();
        let red = reduce1(w, v0, tru);
        assert!(matches!(w.kind(red), DefKind::Bottom));
        assert_eq!(w.ty(red), Some(nat));
    }

    #[test]
    fn multi_arg_reduce_orders_args() {
        // under two binders, <1> is the first arg and <0> the second
        let w = &mut World::new();
        let nat = w.type_nat();
        let v0 = w.var(nat, 0);
        let v1 = w.var(nat, 1);
        let pair = w.tuple(&[v1, v0]);
        let a = w.lit_nat(1);
        let b = w.lit_nat(2);
        let red = reduce(w, pair, &[a, b], 0);
        let expected = w.tuple(&[a, b]);
        assert_eq!(red, expected);
    }
}
