use std::collections::{BTreeMap, HashMap};

use crate::config::AmbiguityPolicy;
use crate::graph::node::{NodeId, NodeKind};
use crate::parser::relationships::{Binding, join_qualified};

/// Maximum number of import hops followed when a name is re-exported through modules.
const MAX_REEXPORT_DEPTH: usize = 8;

/// One scope consulted by a scoped lookup, innermost first.
#[derive(Debug, Clone, Copy)]
pub struct ScopeFrame<'a> {
    /// Qualified name of the scope; `None` for anonymous scopes.
    pub prefix: Option<&'a str>,
    pub bindings: &'a BTreeMap<String, Binding>,
    /// Receiver parameter (`self`/`cls`) of a method scope.
    pub receiver: Option<&'a str>,
    /// Qualified name of the class the receiver stands for.
    pub receiver_of: Option<&'a str>,
}

/// Global symbol table of one scan: qualified name -> node id, plus the import aliases
/// bound at each module's top level.
#[derive(Debug)]
pub struct SymbolTable {
    policy: AmbiguityPolicy,
    qualified: HashMap<String, Vec<(NodeId, NodeKind)>>,
    /// module qualified name -> local name -> absolute target.
    module_aliases: HashMap<String, BTreeMap<String, String>>,
}

impl SymbolTable {
    pub fn new(policy: AmbiguityPolicy) -> Self {
        Self {
            policy,
            qualified: HashMap::new(),
            module_aliases: HashMap::new(),
        }
    }

    /// Register a named symbol. Defining the same name twice makes it ambiguous.
    pub fn define(&mut self, qualified_name: &str, id: NodeId, kind: NodeKind) {
        self.qualified
            .entry(qualified_name.to_owned())
            .or_default()
            .push((id, kind));
    }

    /// Record the import aliases bound at a module's top level, for re-export following.
    pub fn add_module_aliases(&mut self, module: &str, bindings: &BTreeMap<String, Binding>) {
        let aliases: BTreeMap<String, String> = bindings
            .iter()
            .filter_map(|(name, binding)| match binding {
                Binding::Alias(target) => Some((name.clone(), target.clone())),
                _ => None,
            })
            .collect();
        if !aliases.is_empty() {
            self.module_aliases.insert(module.to_owned(), aliases);
        }
    }

    /// True when at least one symbol carries this exact qualified name.
    pub fn is_defined(&self, qualified_name: &str) -> bool {
        self.qualified.contains_key(qualified_name)
    }

    pub fn len(&self) -> usize {
        self.qualified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qualified.is_empty()
    }

    /// Exact lookup. An ambiguous name yields `None` under [`AmbiguityPolicy::Skip`] and the
    /// lowest id under [`AmbiguityPolicy::First`].
    pub fn get(&self, qualified_name: &str) -> Option<(NodeId, NodeKind)> {
        let defs = self.qualified.get(qualified_name)?;
        match (defs.as_slice(), self.policy) {
            ([single], _) => Some(*single),
            (_, AmbiguityPolicy::Skip) => None,
            (_, AmbiguityPolicy::First) => defs.iter().min_by_key(|(id, _)| *id).copied(),
        }
    }

    /// Exact lookup that also follows re-exports: `m.x` where module `m` only imports `x`
    /// resolves to whatever that import names.
    pub fn resolve(&self, qualified_name: &str) -> Option<(NodeId, NodeKind)> {
        self.resolve_at(qualified_name, 0)
    }

    fn resolve_at(&self, qualified_name: &str, depth: usize) -> Option<(NodeId, NodeKind)> {
        if self.is_defined(qualified_name) {
            return self.get(qualified_name);
        }
        if depth >= MAX_REEXPORT_DEPTH {
            return None;
        }

        // Longest defined prefix decides: a module with a matching alias forwards the rest,
        // anything else ends the search.
        let mut split = qualified_name.len();
        while let Some(dot) = qualified_name[..split].rfind('.') {
            let (prefix, rest) = (&qualified_name[..dot], &qualified_name[dot + 1..]);
            split = dot;
            if !self.is_defined(prefix) {
                continue;
            }
            let (head, tail) = match rest.split_once('.') {
                Some((head, tail)) => (head, Some(tail)),
                None => (rest, None),
            };
            let target = self.module_aliases.get(prefix)?.get(head)?;
            let forwarded = match tail {
                Some(tail) => format!("{target}.{tail}"),
                None => target.clone(),
            };
            return self.resolve_at(&forwarded, depth + 1);
        }
        None
    }

    /// Resolution for plain reads: the full dotted name, else the longest resolvable prefix
    /// provided it is a module (`helpers.CONSTANT` references `helpers` when the constant
    /// itself is not a symbol; `Model.field` references nothing).
    pub fn resolve_read(&self, qualified_name: &str) -> Option<(NodeId, NodeKind)> {
        if let Some(found) = self.resolve(qualified_name) {
            return Some(found);
        }
        if self.is_defined(qualified_name) {
            // Ambiguous: leave it unresolved.
            return None;
        }
        let mut prefix = qualified_name;
        while let Some((shorter, _)) = prefix.rsplit_once('.') {
            prefix = shorter;
            if let Some(found) = self.resolve(prefix) {
                return (found.1 == NodeKind::Module).then_some(found);
            }
            if self.is_defined(prefix) {
                return None;
            }
        }
        None
    }

    /// Turn a name as written (`helper`, `self.save`, `np.array`) into an absolute dotted
    /// name by walking the scope chain outward.
    ///
    /// Each frame checks, in order: a symbol defined directly in it, the method receiver,
    /// an import alias (continue at the alias target), a local binding (stop, unresolved),
    /// a `global`/`nonlocal` declaration (skip the frame).
    pub fn lookup(&self, chain: &[ScopeFrame<'_>], dotted: &str) -> Option<String> {
        let (head, rest) = match dotted.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (dotted, None),
        };
        let with_rest = |base: &str| match rest {
            Some(rest) => format!("{base}.{rest}"),
            None => base.to_owned(),
        };

        for frame in chain {
            if let Some(prefix) = frame.prefix {
                let candidate = join_qualified(prefix, head);
                if self.is_defined(&candidate) {
                    return Some(with_rest(&candidate));
                }
            }
            if frame.receiver == Some(head) {
                return frame.receiver_of.map(with_rest);
            }
            match frame.bindings.get(head) {
                Some(Binding::Alias(target)) => return Some(with_rest(target)),
                Some(Binding::Local) => return None,
                Some(Binding::Outer) | None => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(policy: AmbiguityPolicy) -> SymbolTable {
        let mut t = SymbolTable::new(policy);
        t.define("a", 0, NodeKind::Module);
        t.define("a.helper", 1, NodeKind::Function);
        t.define("b", 2, NodeKind::Module);
        t.define("b.A", 3, NodeKind::Class);
        t.define("b.A.m", 4, NodeKind::Method);
        t
    }

    fn frame<'a>(prefix: &'a str, bindings: &'a BTreeMap<String, Binding>) -> ScopeFrame<'a> {
        ScopeFrame {
            prefix: Some(prefix),
            bindings,
            receiver: None,
            receiver_of: None,
        }
    }

    #[test]
    fn test_ambiguity_policies() {
        let mut skip = table(AmbiguityPolicy::Skip);
        skip.define("a.helper", 9, NodeKind::Function);
        assert_eq!(skip.get("a.helper"), None);
        assert_eq!(skip.get("b.A"), Some((3, NodeKind::Class)));

        let mut first = table(AmbiguityPolicy::First);
        first.define("a.helper", 9, NodeKind::Function);
        assert_eq!(first.get("a.helper"), Some((1, NodeKind::Function)));
    }

    #[test]
    fn test_reexport_is_followed() {
        let mut t = table(AmbiguityPolicy::Skip);
        t.define("pkg", 5, NodeKind::Module);
        let mut bindings = BTreeMap::new();
        bindings.insert("helper".to_owned(), Binding::Alias("a.helper".to_owned()));
        bindings.insert("local".to_owned(), Binding::Local);
        t.add_module_aliases("pkg", &bindings);

        assert_eq!(t.resolve("pkg.helper"), Some((1, NodeKind::Function)));
        assert_eq!(t.resolve("pkg.local"), None);
        assert_eq!(t.resolve("pkg.missing"), None);
    }

    #[test]
    fn test_reexport_cycle_terminates() {
        let mut t = table(AmbiguityPolicy::Skip);
        t.define("x", 5, NodeKind::Module);
        t.define("y", 6, NodeKind::Module);
        let mut xb = BTreeMap::new();
        xb.insert("name".to_owned(), Binding::Alias("y.name".to_owned()));
        let mut yb = BTreeMap::new();
        yb.insert("name".to_owned(), Binding::Alias("x.name".to_owned()));
        t.add_module_aliases("x", &xb);
        t.add_module_aliases("y", &yb);
        assert_eq!(t.resolve("x.name"), None);
    }

    #[test]
    fn test_read_falls_back_to_module_only() {
        let t = table(AmbiguityPolicy::Skip);
        assert_eq!(t.resolve_read("a.CONSTANT"), Some((0, NodeKind::Module)));
        assert_eq!(t.resolve_read("b.A.attr"), None, "class prefixes are not a fallback");
        assert_eq!(t.resolve_read("zzz.q"), None);
    }

    #[test]
    fn test_scoped_lookup_order() {
        let t = table(AmbiguityPolicy::Skip);
        let mut module_bindings = BTreeMap::new();
        module_bindings.insert("A".to_owned(), Binding::Alias("b.A".to_owned()));
        let mut function_bindings = BTreeMap::new();
        function_bindings.insert("tmp".to_owned(), Binding::Local);
        function_bindings.insert("helper".to_owned(), Binding::Outer);

        let chain = [frame("a.f", &function_bindings), frame("a", &module_bindings)];
        assert_eq!(t.lookup(&chain, "helper").as_deref(), Some("a.helper"));
        assert_eq!(t.lookup(&chain, "A.m").as_deref(), Some("b.A.m"));
        assert_eq!(t.lookup(&chain, "tmp"), None);
        assert_eq!(t.lookup(&chain, "print"), None);
    }

    #[test]
    fn test_receiver_maps_to_class() {
        let t = table(AmbiguityPolicy::Skip);
        let empty = BTreeMap::new();
        let chain = [
            ScopeFrame {
                prefix: Some("b.A.m"),
                bindings: &empty,
                receiver: Some("self"),
                receiver_of: Some("b.A"),
            },
            frame("b", &empty),
        ];
        assert_eq!(t.lookup(&chain, "self.m").as_deref(), Some("b.A.m"));
    }
}
