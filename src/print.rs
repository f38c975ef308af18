use crate::def::{ DefKind, NodeId };
use crate::qualifier::QualifierTag;
use crate::world::World;

use DefKind::*;

/// Textual notation for defs :
///```pseudo
/// λD. B            lambda
/// ΠD. C            pi
/// [t0, t1, …]      sigma
/// [a; body]        variadic
/// (a; body)        pack
/// (t0 ∪ t1)        variant        (t0 ∩ t1)  intersection
/// k_n              index literal k of arity n
/// <i:T>            De Bruijn variable
/// *ᴬ 𝔸ᴸ …          kinds with their qualifier suffix
///```
/// Display borrows the world, so this is a read-only view; it never creates
/// defs, which keeps it usable from Debug contexts.
pub struct Show<'w> {
    world : &'w World,
    id : NodeId,
}

impl World {
    pub fn show(&self, id : NodeId) -> Show<'_> {
        Show { world : self, id }
    }

    pub fn show_string(&self, id : NodeId) -> String {
        format!("{}", self.show(id))
    }
}

impl<'w> Show<'w> {
    fn wrap(&self, id : NodeId) -> Show<'w> {
        Show { world : self.world, id }
    }

    fn qualifier_suffix(&self, kind_id : NodeId) -> &'static str {
        match self.world.kind(self.world.op(kind_id, 0)) {
            Qualifier(QualifierTag::Unlimited) => "",
            Qualifier(q) => q.str(),
            _ => "?",
        }
    }

    fn list(&self, f : &mut std::fmt::Formatter, ops : &[NodeId], open : &str, sep : &str, close : &str) -> std::fmt::Result {
        write!(f, "{}", open)?;
        for (i, op) in ops.iter().enumerate() {
            if i != 0 {
                write!(f, "{}", sep)?;
            }
            write!(f, "{}", self.wrap(*op))?;
        }
        write!(f, "{}", close)
    }
}

impl<'w> std::fmt::Display for Show<'w> {
    fn fmt(&self, f : &mut std::fmt::Formatter) -> std::fmt::Result {
        let w = self.world;
        let id = self.id;
        match w.kind(id) {
            Universe => write!(f, "□"),
            QualifierType => write!(f, "ℚ"),
            Qualifier(q) => write!(f, "{}", q),
            Star => write!(f, "*{}", self.qualifier_suffix(id)),
            ArityKind => write!(f, "𝔸{}", self.qualifier_suffix(id)),
            MultiArityKind => write!(f, "𝕄{}", self.qualifier_suffix(id)),
            Arity(n) => write!(f, "{}", n),
            Var(i) => write!(f, "<{}:{}>", i, self.wrap(w.ty_of(id))),
            Lit(b) => {
                let t = w.ty_of(id);
                match w.kind(t) {
                    Arity(n) => write!(f, "{}_{}", b.get_u64(), n),
                    _ => write!(f, "{}", b.get_u64()),
                }
            },
            Axiom(..) => match w.name_of(id) {
                Some(n) => write!(f, "{}", n),
                None => write!(f, "axiom_{}", id.gid()),
            },
            Pi => write!(f, "Π{}. {}", self.wrap(w.op(id, 0)), self.wrap(w.op(id, 1))),
            Lambda => {
                if w.is_nominal(id) {
                    if let Some(n) = w.name_of(id) {
                        return write!(f, "{}", n)
                    }
                }
                let pi = w.ty_of(id);
                write!(f, "λ{}. {}", self.wrap(w.op(pi, 0)), self.wrap(w.op(id, 1)))
            },
            Sigma => self.list(f, w.ops(id), "[", ", ", "]"),
            Variadic => write!(f, "[{}; {}]", self.wrap(w.op(id, 0)), self.wrap(w.op(id, 1))),
            Pack => {
                let t = w.ty_of(id);
                match w.kind(t) {
                    Variadic => write!(f, "({}; {})", self.wrap(w.op(t, 0)), self.wrap(w.op(id, 0))),
                    _ => write!(f, "({}ₐ; {})", w.num_ops(t), self.wrap(w.op(id, 0))),
                }
            },
            Tuple => self.list(f, w.ops(id), "(", ", ", ")"),
            Extract => write!(f, "{}#{}", self.wrap(w.op(id, 0)), self.wrap(w.op(id, 1))),
            Insert => write!(f, "{}.{}={}", self.wrap(w.op(id, 0)), self.wrap(w.op(id, 1)), self.wrap(w.op(id, 2))),
            Variant => self.list(f, w.ops(id), "(", " ∪ ", ")"),
            Intersection => self.list(f, w.ops(id), "(", " ∩ ", ")"),
            Any(_) => write!(f, "any:{}({})", self.wrap(w.ty_of(id)), self.wrap(w.op(id, 0))),
            Pick => write!(f, "pick:{}({})", self.wrap(w.ty_of(id)), self.wrap(w.op(id, 0))),
            Match => {
                write!(f, "match {} with ", self.wrap(w.op(id, 0)))?;
                self.list(f, &w.ops(id)[1..], "(", ", ", ")")
            },
            Singleton => write!(f, "S({})", self.wrap(w.op(id, 0))),
            App => {
                let callee = w.op(id, 0);
                let arg = w.op(id, 1);
                write!(f, "{}", self.wrap(callee))?;
                match w.kind(arg) {
                    Tuple | Pack => write!(f, "{}", self.wrap(arg)),
                    _ => write!(f, "({})", self.wrap(arg)),
                }
            },
            Param => write!(f, "param {}", self.wrap(w.op(id, 0))),
            Bottom => write!(f, "{{⊥: {}}}", self.wrap(w.ty_of(id))),
            Top => write!(f, "{{⊤: {}}}", self.wrap(w.ty_of(id))),
        }
    }
}

#[cfg(test)]
mod print_tests {
    use super::*;

    #[test]
    fn notation() {
        let w = &mut World::new();
        let nat = w.type_nat();
        let v0 = w.var(nat, 0);
        let id = w.lambda(nat, v0);
        assert_eq!(w.show_string(id), "λnat. <0:nat>");

        let pi = w.ty_of(id);
        assert_eq!(w.show_string(pi), "Πnat. nat");

        let b = w.type_bool();
        let sig = w.sigma(&[nat, b]);
        assert_eq!(w.show_string(sig), "[nat, bool]");

        let i = w.index(1, 3);
        assert_eq!(w.show_string(i), "1_3");

        let a = w.affine();
        let star_a = w.star(a);
        assert_eq!(w.show_string(star_a), "*ᴬ");
        let star_u = w.star_u();
        assert_eq!(w.show_string(star_u), "*");
    }

    #[test]
    fn variadic_and_variant_notation() {
        let w = &mut World::new();
        let nat = w.type_nat();
        let a3 = w.arity(3);
        let v = w.variadic(a3, nat);
        assert_eq!(w.show_string(v), "[3; nat]");

        let b = w.type_bool();
        let var = w.variant(&[nat, b]);
        // gid order : bool was created before nat
        assert_eq!(w.show_string(var), "(bool ∪ nat)");
    }
}
