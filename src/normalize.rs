use crate::def::{ Box64, DefKind, NodeId };
use crate::fold::*;
use crate::reduce::shift_free_vars;
use crate::tables::*;
use crate::world::World;

use DefKind::*;

/// Per-family normalizers for the primitive operator axioms. Each operator
/// is a curried chain `axiom · flags · width · shape · operands`; the world
/// consults the tail axiom's normalizer on *every* application along the
/// chain, so the first thing each normalizer does is count the callee spine
/// and bail until the operand application arrives.

/// The head of a curried application together with the argument spine,
/// outermost first.
fn spine(world : &World, mut def : NodeId) -> (NodeId, Vec<NodeId>) {
    let mut args = Vec::new();
    while matches!(world.kind(def), App) {
        args.push(world.op(def, 1));
        def = world.op(def, 0);
    }
    args.reverse();
    (def, args)
}

fn split_pair(world : &mut World, arg : NodeId) -> (NodeId, NodeId) {
    let a = world.extract_at(arg, 0);
    let b = world.extract_at(arg, 1);
    (a, b)
}

fn is_foldable(world : &World, def : NodeId) -> bool {
    matches!(world.kind(def), Lit(..) | Tuple | Pack)
}

/// Commutative canonicalization : a foldable operand moves to the left.
fn foldable_to_left(world : &World, a : &mut NodeId, b : &mut NodeId) -> Option<Box64> {
    if is_foldable(world, *b) && !is_foldable(world, *a) {
        std::mem::swap(a, b);
    }
    world.lit_box(*a)
}

/// Order the operands of a commutative operator by gid, keeping literals on
/// the left, and intern without re-normalizing.
fn commute(world : &mut World, callee : NodeId, a : NodeId, b : NodeId) -> NodeId {
    let (x, y) = if world.gid(a) > world.gid(b) && !world.is_lit(a) {
        (b, a)
    } else {
        (a, b)
    };
    let t = world.tuple(&[x, y]);
    world.raw_app(callee, t)
}

/// Rebalance `(k1 ∘ x) ∘ (k2 ∘ y)` so the foldable heads meet, and absorb a
/// bare literal into the head of a literal-headed chain. Falls back to plain
/// commutation when neither operand exposes a foldable head.
fn reassociate(world : &mut World, callee : NodeId, a : NodeId, b : NodeId) -> NodeId {
    let args = [a, b];
    let mut heads = [None; 2];
    for i in 0..2 {
        if matches!(world.kind(args[i]), App) && world.op(args[i], 0) == callee {
            let (x, y) = split_pair(world, world.op(args[i], 1));
            if is_foldable(world, x) {
                heads[i] = Some((x, y));
            }
        }
    }
    match (heads[0], heads[1]) {
        (Some((xa, ya)), Some((xb, yb))) => {
            let k = world.app_pair(callee, xa, xb);
            let rest = world.app_pair(callee, ya, yb);
            world.app_pair(callee, k, rest)
        },
        (Some((x, y)), None) => {
            if is_foldable(world, b) {
                // k1 ∘ (k2 ∘ y) : the constants meet and fold
                let k = world.app_pair(callee, b, x);
                return world.app_pair(callee, k, y)
            }
            let rest = world.app_pair(callee, b, y);
            world.app_pair(callee, x, rest)
        },
        (None, Some((x, y))) => {
            if is_foldable(world, a) {
                let k = world.app_pair(callee, a, x);
                return world.app_pair(callee, k, y)
            }
            let rest = world.app_pair(callee, a, y);
            world.app_pair(callee, x, rest)
        },
        (None, None) => commute(world, callee, a, b),
    }
}

/// Split one dimension off a shape.
fn shrink_shape(world : &mut World, shape : NodeId) -> (NodeId, NodeId) {
    match world.kind(shape).clone() {
        Arity(..) => {
            let one = world.arity(1);
            (shape, one)
        },
        Sigma => {
            let head = world.op(shape, 0);
            let rest = world.ops(shape)[1..].to_vec();
            let tail = world.sigma(&rest);
            let tail = shift_free_vars(world, tail, -1);
            (head, tail)
        },
        Variadic => {
            let a = world.op(shape, 0);
            let body = world.op(shape, 1);
            match world.kind(a).clone() {
                Arity(n) if n > 0 => {
                    let smaller = world.arity(n - 1);
                    let tail = world.variadic(smaller, body);
                    (a, tail)
                },
                _ => {
                    let one = world.arity(1);
                    (shape, one)
                },
            }
        },
        _ => {
            let one = world.arity(1);
            (shape, one)
        },
    }
}

/// Push a pointwise operator through tuple/pack operands of matching shape.
fn normalize_tuple(world : &mut World, callee : NodeId, args : &[NodeId]) -> Option<NodeId> {
    if !matches!(world.kind(callee), App) {
        return None
    }
    let mut num = None;
    for &arg in args {
        match world.kind(arg) {
            Tuple => {
                let n = world.num_ops(arg);
                if let Some(m) = num {
                    if m != n {
                        return None
                    }
                }
                num = Some(n);
            },
            Pack => (),
            _ => return None,
        }
    }
    let prefix = world.op(callee, 0);
    let shape = world.op(callee, 1);
    let (head, tail) = shrink_shape(world, shape);
    let new_callee = world.app(prefix, tail);
    match num {
        None => {
            // every operand is a pack : apply to the bodies and repack
            let bodies : Vec<NodeId> = args.iter().map(|&p| world.op(p, 0)).collect();
            let applied = if bodies.len() == 1 {
                world.app(new_callee, bodies[0])
            } else {
                let t = world.tuple(&bodies);
                world.app(new_callee, t)
            };
            Some(world.pack(head, applied))
        },
        Some(n) => {
            let mut elems = Vec::with_capacity(n);
            for i in 0..n {
                let mut row = Vec::with_capacity(args.len());
                for &arg in args {
                    let el = match world.kind(arg) {
                        Pack => world.op(arg, 0),
                        _ => world.op(arg, i),
                    };
                    row.push(el);
                }
                let applied = if row.len() == 1 {
                    world.app(new_callee, row[0])
                } else {
                    let t = world.tuple(&row);
                    world.app(new_callee, t)
                };
                elems.push(applied);
            }
            Some(world.tuple(&elems))
        },
    }
}

fn is_zero_lit(b : Box64, w : u64) -> bool {
    let m = if w >= 64 { u64::MAX } else { (1u64 << w) - 1 };
    b.get_u64() & m == 0
}

fn is_one_lit(b : Box64, w : u64) -> bool {
    let m = if w >= 64 { u64::MAX } else { (1u64 << w) - 1 };
    b.get_u64() & m == 1
}

fn is_allset_lit(b : Box64, w : u64) -> bool {
    let m = if w >= 64 { u64::MAX } else { (1u64 << w) - 1 };
    b.get_u64() & m == m
}

pub fn normalize_wop(world : &mut World, ty : NodeId, callee : NodeId, arg : NodeId) -> Option<NodeId> {
    let (head, cargs) = spine(world, callee);
    if cargs.len() != 3 {
        return None
    }
    let op = world.which_wop(head)?;
    let (mut a, mut b) = split_pair(world, arg);
    let flags = world.lit_u64(cargs[0]).map(WFlags::from_bits_truncate);
    let width = world.lit_u64(cargs[1]);
    // the identity/folding rules only apply at scalar shape, where the
    // result type is the element type itself
    let scalar = matches!(world.kind(ty), App);
    if let (Some(f), Some(w)) = (flags, width) {
        if let (Some(ba), Some(bb)) = (world.lit_box(a), world.lit_box(b)) {
            return Some(match fold_wop(op, f, w, ba, bb) {
                Ok(res) => world.lit(ty, res),
                Err(_) => world.bottom(ty),
            })
        }
        if scalar {
            // the shift amount is positional, so Shl checks both slots in
            // place; the commutative swap only ever sees Add and Mul
            if op == WOp::Shl {
                if let Some(bb) = world.lit_box(b) {
                    if is_zero_lit(bb, w) {
                        return Some(a)
                    }
                }
                if let Some(ba) = world.lit_box(a) {
                    if is_zero_lit(ba, w) {
                        return Some(a)
                    }
                }
            } else {
                if op.is_commutative() {
                    if let Some(la) = foldable_to_left(world, &mut a, &mut b) {
                        match op {
                            WOp::Add if is_zero_lit(la, w) => return Some(b),
                            WOp::Mul if is_one_lit(la, w) => return Some(b),
                            WOp::Mul if is_zero_lit(la, w) => return Some(a),
                            _ => (),
                        }
                    }
                }
                match op {
                    WOp::Add if a == b => {
                        // x + x is 2·x
                        let two = world.lit(ty, Box64::from_u64(2));
                        let mul = world.wop_axiom(WOp::Mul);
                        let c = world.app(mul, cargs[0]);
                        let c = world.app(c, cargs[1]);
                        let c = world.app(c, cargs[2]);
                        return Some(world.app_pair(c, two, a))
                    },
                    WOp::Sub if a == b => {
                        return Some(world.lit(ty, Box64::from_u64(0)))
                    },
                    _ => (),
                }
            }
        }
    }
    if let Some(res) = normalize_tuple(world, callee, &[a, b]) {
        return Some(res)
    }
    if op.is_commutative() {
        if flags == Some(WFlags::empty()) {
            return Some(reassociate(world, callee, a, b))
        }
        return Some(commute(world, callee, a, b))
    }
    None
}

pub fn normalize_zop(world : &mut World, ty : NodeId, callee : NodeId, arg : NodeId) -> Option<NodeId> {
    let (head, cargs) = spine(world, callee);
    if cargs.len() != 2 {
        return None
    }
    let op = world.which_zop(head)?;
    let m = world.extract_at(arg, 0);
    let a = world.extract_at(arg, 1);
    let b = world.extract_at(arg, 2);
    let width = world.lit_u64(cargs[0])?;
    if let Some(bb) = world.lit_box(b) {
        if is_zero_lit(bb, width) {
            return Some(world.bottom(ty))
        }
        if let Some(ba) = world.lit_box(a) {
            return Some(match fold_zop(op, width, ba, bb) {
                Ok(res) => {
                    let et = world.ty_of(a);
                    let lit = world.lit(et, res);
                    world.tuple(&[m, lit])
                },
                Err(_) => world.bottom(ty),
            })
        }
    }
    None
}

pub fn normalize_iop(world : &mut World, ty : NodeId, callee : NodeId, arg : NodeId) -> Option<NodeId> {
    let (head, cargs) = spine(world, callee);
    if cargs.len() != 2 {
        return None
    }
    let op = world.which_iop(head)?;
    let (mut a, mut b) = split_pair(world, arg);
    let width = world.lit_u64(cargs[0]);
    let scalar = matches!(world.kind(ty), App);
    if let Some(w) = width {
        if let (Some(ba), Some(bb)) = (world.lit_box(a), world.lit_box(b)) {
            return Some(match fold_iop(op, w, ba, bb) {
                Ok(res) => world.lit(ty, res),
                Err(_) => world.bottom(ty),
            })
        }
        if scalar {
            match op {
                IOp::Ashr | IOp::Lshr => {
                    if let Some(bb) = world.lit_box(b) {
                        if is_zero_lit(bb, w) {
                            return Some(a)
                        }
                    }
                    if let Some(ba) = world.lit_box(a) {
                        if is_zero_lit(ba, w) {
                            return Some(a)
                        }
                    }
                },
                _ => {
                    if let Some(la) = foldable_to_left(world, &mut a, &mut b) {
                        match op {
                            IOp::Iand if is_zero_lit(la, w) => return Some(a),
                            IOp::Iand if is_allset_lit(la, w) => return Some(b),
                            IOp::Ior if is_zero_lit(la, w) => return Some(b),
                            IOp::Ior if is_allset_lit(la, w) => return Some(a),
                            IOp::Ixor if is_zero_lit(la, w) => return Some(b),
                            _ => (),
                        }
                    }
                    if op == IOp::Ixor && a == b {
                        return Some(world.lit(ty, Box64::from_u64(0)))
                    }
                },
            }
        }
    }
    if let Some(res) = normalize_tuple(world, callee, &[a, b]) {
        return Some(res)
    }
    if op.is_commutative() {
        return Some(reassociate(world, callee, a, b))
    }
    None
}

pub fn normalize_fop(world : &mut World, ty : NodeId, callee : NodeId, arg : NodeId) -> Option<NodeId> {
    let (head, cargs) = spine(world, callee);
    if cargs.len() != 3 {
        return None
    }
    let op = world.which_fop(head)?;
    let (a, b) = split_pair(world, arg);
    let flags = world.lit_u64(cargs[0]).map(FFlags::from_bits_truncate)?;
    let width = world.lit_u64(cargs[1])?;
    if let (Some(ba), Some(bb)) = (world.lit_box(a), world.lit_box(b)) {
        match fold_fop(op, width, ba, bb) {
            Ok(res) => return Some(world.lit(ty, res)),
            Err(FoldError::Unsupported) => (),
            Err(_) => return Some(world.bottom(ty)),
        }
    }
    if let Some(res) = normalize_tuple(world, callee, &[a, b]) {
        return Some(res)
    }
    // float operands only move when the client explicitly allowed it
    if op.is_commutative() && flags.contains(FFlags::REASSOC) {
        return Some(reassociate(world, callee, a, b))
    }
    None
}

pub fn normalize_icmp(world : &mut World, ty : NodeId, callee : NodeId, arg : NodeId) -> Option<NodeId> {
    let (head, cargs) = spine(world, callee);
    if cargs.len() != 2 {
        return None
    }
    let key = world.which_icmp(head)?;
    let (a, b) = split_pair(world, arg);
    let width = world.lit_u64(cargs[0])?;
    if let (Some(ba), Some(bb)) = (world.lit_box(a), world.lit_box(b)) {
        let res = fold_icmp(key, width, ba, bb);
        return Some(world.lit(ty, Box64::from_bool(res)))
    }
    if let Some(res) = normalize_tuple(world, callee, &[a, b]) {
        return Some(res)
    }
    None
}

pub fn normalize_fcmp(world : &mut World, ty : NodeId, callee : NodeId, arg : NodeId) -> Option<NodeId> {
    let (head, cargs) = spine(world, callee);
    if cargs.len() != 3 {
        return None
    }
    let key = world.which_fcmp(head)?;
    let (a, b) = split_pair(world, arg);
    let width = world.lit_u64(cargs[1])?;
    if let (Some(ba), Some(bb)) = (world.lit_box(a), world.lit_box(b)) {
        match fold_fcmp(key, width, ba, bb) {
            Ok(res) => return Some(world.lit(ty, Box64::from_bool(res))),
            Err(_) => (),
        }
    }
    if let Some(res) = normalize_tuple(world, callee, &[a, b]) {
        return Some(res)
    }
    None
}

pub fn normalize_cast(world : &mut World, ty : NodeId, callee : NodeId, arg : NodeId) -> Option<NodeId> {
    let (head, cargs) = spine(world, callee);
    if cargs.len() != 2 {
        return None
    }
    let cast = world.which_cast(head)?;
    let dw = {
        let p = world.extract_at(cargs[0], 0);
        world.lit_u64(p)?
    };
    let sw = {
        let p = world.extract_at(cargs[0], 1);
        world.lit_u64(p)?
    };
    if let Some(bv) = world.lit_box(arg) {
        match fold_cast(cast, dw, sw, bv) {
            Ok(res) => return Some(world.lit(ty, res)),
            Err(FoldError::Unsupported) => return None,
            Err(_) => return Some(world.bottom(ty)),
        }
    }
    if let Some(res) = normalize_tuple(world, callee, &[arg]) {
        return Some(res)
    }
    None
}

pub fn normalize_arity_succ(world : &mut World, _ty : NodeId, callee : NodeId, arg : NodeId) -> Option<NodeId> {
    let (_, cargs) = spine(world, callee);
    if !cargs.is_empty() {
        return None
    }
    match world.kind(arg).clone() {
        Arity(n) => {
            let at = world.ty_of(arg);
            let q = world.op(at, 0);
            Some(world.arity_q(q, n + 1))
        },
        _ => None,
    }
}

#[cfg(test)]
mod normalize_tests {
    use super::*;

    #[test]
    fn wop_identities_both_orders() {
        let w = &mut World::new();
        let i32t = w.type_int(32);
        let x = w.axiom_anon(i32t);
        let zero = w.lit_int(32, 0);
        let one = w.lit_int(32, 1);

        for (a, b) in [(zero, x), (x, zero)].iter().copied() {
            let r = w.op_wop(WOp::Add, WFlags::empty(), a, b);
            assert_eq!(r, x);
        }
        for (a, b) in [(one, x), (x, one)].iter().copied() {
            let r = w.op_wop(WOp::Mul, WFlags::empty(), a, b);
            assert_eq!(r, x);
        }
        for (a, b) in [(zero, x), (x, zero)].iter().copied() {
            let r = w.op_wop(WOp::Mul, WFlags::empty(), a, b);
            assert_eq!(r, zero);
        }
        let r = w.op_wop(WOp::Sub, WFlags::empty(), x, x);
        assert_eq!(r, zero);
    }

    #[test]
    fn shl_by_zero_keeps_the_shiftee() {
        let w = &mut World::new();
        let i32t = w.type_int(32);
        let x = w.axiom_anon(i32t);
        let zero = w.lit_int(32, 0);

        // x << 0 is x, never the zero from the amount slot
        let r = w.op_wop(WOp::Shl, WFlags::empty(), x, zero);
        assert_eq!(r, x);
        // 0 << x is 0
        let r = w.op_wop(WOp::Shl, WFlags::empty(), zero, x);
        assert_eq!(r, zero);

        // two literals go through the fold instead
        let one = w.lit_int(32, 1);
        let four = w.lit_int(32, 4);
        let r = w.op_wop(WOp::Shl, WFlags::empty(), one, four);
        let sixteen = w.lit_int(32, 16);
        assert_eq!(r, sixteen);
    }

    #[test]
    fn iop_identities_both_orders() {
        let w = &mut World::new();
        let i32t = w.type_int(32);
        let x = w.axiom_anon(i32t);
        let zero = w.lit_int(32, 0);
        let allset = w.lit_int(32, 0xFFFF_FFFF);

        for (a, b) in [(zero, x), (x, zero)].iter().copied() {
            let r = w.op_iop(IOp::Iand, a, b);
            assert_eq!(r, zero);
            let r = w.op_iop(IOp::Ior, a, b);
            assert_eq!(r, x);
            let r = w.op_iop(IOp::Ixor, a, b);
            assert_eq!(r, x);
        }
        for (a, b) in [(allset, x), (x, allset)].iter().copied() {
            let r = w.op_iop(IOp::Iand, a, b);
            assert_eq!(r, x);
            let r = w.op_iop(IOp::Ior, a, b);
            assert_eq!(r, allset);
        }
        let r = w.op_iop(IOp::Ixor, x, x);
        assert_eq!(r, zero);

        // shifts are positional too : x >> 0 keeps x, 0 >> x stays 0
        for op in [IOp::Ashr, IOp::Lshr].iter().copied() {
            let r = w.op_iop(op, x, zero);
            assert_eq!(r, x);
            let r = w.op_iop(op, zero, x);
            assert_eq!(r, zero);
        }
    }

    #[test]
    fn commutation_orders_by_gid() {
        let w = &mut World::new();
        let i32t = w.type_int(32);
        let x = w.axiom_anon(i32t);
        let y = w.axiom_anon(i32t);
        let xy = w.op_iop(IOp::Iand, x, y);
        let yx = w.op_iop(IOp::Iand, y, x);
        assert_eq!(xy, yx);
        let k = w.lit_int(32, 5);
        // a literal stays on the left whatever order it arrives in
        let kx = w.op_wop(WOp::Add, WFlags::empty(), k, x);
        let xk = w.op_wop(WOp::Add, WFlags::empty(), x, k);
        assert_eq!(kx, xk);
    }

    #[test]
    fn reassociation_merges_constants() {
        let w = &mut World::new();
        let i32t = w.type_int(32);
        let x = w.axiom_anon(i32t);
        let y = w.axiom_anon(i32t);
        let k3 = w.lit_int(32, 3);
        let k4 = w.lit_int(32, 4);
        let k7 = w.lit_int(32, 7);

        // (3 + x) + 4 and 4 + (3 + x) both land on 7 + x
        let inner = w.op_wop(WOp::Add, WFlags::empty(), k3, x);
        let expected = w.op_wop(WOp::Add, WFlags::empty(), k7, x);
        let r = w.op_wop(WOp::Add, WFlags::empty(), inner, k4);
        assert_eq!(r, expected);
        let r = w.op_wop(WOp::Add, WFlags::empty(), k4, inner);
        assert_eq!(r, expected);

        // (3 + x) + (4 + y) : the constants meet, the tails pair up
        let inner2 = w.op_wop(WOp::Add, WFlags::empty(), k4, y);
        let xy = w.op_wop(WOp::Add, WFlags::empty(), x, y);
        let expected = w.op_wop(WOp::Add, WFlags::empty(), k7, xy);
        let r = w.op_wop(WOp::Add, WFlags::empty(), inner, inner2);
        assert_eq!(r, expected);

        // wrap flags suppress reassociation : the nested shape survives
        let flagged_inner = w.op_wop(WOp::Add, WFlags::NUW, k3, x);
        let r = w.op_wop(WOp::Add, WFlags::NUW, flagged_inner, k4);
        assert!(matches!(w.kind(r), App));
        assert_ne!(r, w.op_wop(WOp::Add, WFlags::NUW, k7, x));
    }

    #[test]
    fn tuple_and_pack_lifting() {
        let w = &mut World::new();
        let a1 = w.lit_int(32, 1);
        let a2 = w.lit_int(32, 2);
        let b1 = w.lit_int(32, 10);
        let b2 = w.lit_int(32, 20);

        let ta = w.tuple(&[a1, a2]);
        let tb = w.tuple(&[b1, b2]);
        let r = w.op_wop(WOp::Add, WFlags::empty(), ta, tb);
        let e1 = w.lit_int(32, 11);
        let e2 = w.lit_int(32, 22);
        let expected = w.tuple(&[e1, e2]);
        assert_eq!(r, expected);

        // a pack broadcasts its body across the tuple's elements
        let five = w.lit_int(32, 5);
        let arity2 = w.arity(2);
        let pb = w.pack(arity2, five);
        let r = w.op_wop(WOp::Add, WFlags::empty(), ta, pb);
        let e1 = w.lit_int(32, 6);
        let e2 = w.lit_int(32, 7);
        let expected = w.tuple(&[e1, e2]);
        assert_eq!(r, expected);

        // two packs stay a pack
        let arity3 = w.arity(3);
        let ten = w.lit_int(32, 10);
        let four = w.lit_int(32, 4);
        let pa = w.pack(arity3, ten);
        let pb = w.pack(arity3, four);
        let r = w.op_wop(WOp::Add, WFlags::empty(), pa, pb);
        let fourteen = w.lit_int(32, 14);
        let expected = w.pack(arity3, fourteen);
        assert_eq!(r, expected);
    }
}
