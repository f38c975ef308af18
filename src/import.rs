use fxhash::FxHashMap;

use crate::def::{ DefKind, NodeId };
use crate::world::World;

/// Deep-copies defs from one world into another. Two worlds never share
/// nodes, so the only way to move a graph is this memoized DFS : import the
/// type, then either stub-and-fill (nominals) or import the operands and
/// rebuild (structurals). Rebuilding re-runs the destination's factory
/// normalizations, so an import can come out *smaller* than the source; the
/// `todo` flag records that some structural sharing changed, letting callers
/// iterate to a fixed point.
pub struct Importer {
    old2new : FxHashMap<NodeId, NodeId>,
    todo : bool,
}

impl Importer {
    pub fn new() -> Self {
        Importer { old2new : FxHashMap::default(), todo : false }
    }

    pub fn todo(&self) -> bool {
        self.todo
    }

    pub fn import(&mut self, src : &World, dst : &mut World, def : NodeId) -> NodeId {
        // follow forwarding pointers in the source before copying
        let def = src.resolve(def);
        if let Some(&n) = self.old2new.get(&def) {
            return n
        }
        if let DefKind::Universe = src.kind(def) {
            let u = dst.universe();
            self.old2new.insert(def, u);
            return u
        }
        let old_ty = src.ty(def).expect("only the Universe is untyped");
        let new_ty = self.import(src, dst, old_ty);

        let num = src.num_ops(def);
        if src.is_nominal(def) {
            let kind = src.kind(def).clone();
            let name = src.name_of(def).map(|s| s.to_string());
            let stub = dst.stub(&kind, new_ty, num, name.as_deref());
            self.old2new.insert(def, stub);
            for i in 0..num {
                let op = self.import(src, dst, src.op(def, i));
                if dst.set_op(stub, i, op).is_err() {
                    dst.errorf(format!("import could not fill operand {} of a nominal stub", i));
                }
            }
            self.check_todo(src, dst, def, stub);
            return stub
        }

        let mut new_ops = Vec::with_capacity(num);
        for i in 0..num {
            new_ops.push(self.import(src, dst, src.op(def, i)));
        }
        let kind = src.kind(def).clone();
        let new_def = dst.rebuild_kind(&kind, Some(new_ty), &new_ops);
        self.check_todo(src, dst, def, new_def);
        self.old2new.insert(def, new_def);
        new_def
    }

    /// Sharing was lost (or gained) when the rebuilt def does not use the
    /// imported operands one-for-one.
    fn check_todo(&mut self, src : &World, dst : &World, old_def : NodeId, new_def : NodeId) {
        if src.num_ops(old_def) != dst.num_ops(new_def) {
            self.todo = true;
            return
        }
        for i in 0..src.num_ops(old_def) {
            let mapped = self.old2new.get(&src.op(old_def, i)).copied();
            if mapped != Some(dst.op(new_def, i)) {
                self.todo = true;
                return
            }
        }
    }
}

impl Default for Importer {
    fn default() -> Self {
        Importer::new()
    }
}

#[cfg(test)]
mod import_tests {
    use super::*;

    #[test]
    fn import_identity_lambda() {
        let src = &mut World::new();
        let nat = src.type_nat();
        let v0 = src.var(nat, 0);
        let id = src.lambda(nat, v0);

        let dst = &mut World::new();
        let mut imp = Importer::new();
        let id2 = imp.import(src, dst, id);

        // "nat" is an axiom, so the imported constant is a fresh axiom in
        // dst, distinct from dst's own nat
        let nat2 = dst.type_nat();
        let v02 = dst.var(nat2, 0);
        let expected = dst.lambda(nat2, v02);
        assert_ne!(id2, expected);
        assert!(matches!(dst.kind(id2), DefKind::Lambda));
        let pi = dst.ty_of(id2);
        assert!(matches!(dst.kind(pi), DefKind::Pi));
    }

    #[test]
    fn import_preserves_sharing() {
        let src = &mut World::new();
        let n1 = src.lit_nat(1);
        let n2 = src.lit_nat(2);
        let pair = src.tuple(&[n1, n2]);
        let left = src.tuple(&[pair, n1]);
        let right = src.tuple(&[pair, n2]);
        let top = src.tuple(&[left, right]);

        let dst = &mut World::new();
        let mut imp = Importer::new();
        let top2 = imp.import(src, dst, top);
        // both occurrences of the shared pair map to one def in dst
        let l = dst.op(top2, 0);
        let r = dst.op(top2, 1);
        assert_eq!(dst.op(l, 0), dst.op(r, 0));
    }

    #[test]
    fn import_rebuilds_collapsed_forms() {
        let src = &mut World::new();
        let s = src.star_u();
        let ax = src.axiom(s, "T");
        // [T, T] is a homogeneous variadic in src; the rebuild in dst runs
        // the same normalization and lands on the same shape
        let sig = src.sigma(&[ax, ax]);
        assert!(matches!(src.kind(sig), DefKind::Variadic));
        let dst = &mut World::new();
        let mut imp = Importer::new();
        let sig2 = imp.import(src, dst, sig);
        assert!(matches!(dst.kind(sig2), DefKind::Variadic));
    }
}
