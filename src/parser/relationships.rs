use std::collections::HashSet;

use tree_sitter::Node;

use super::symbols::{Extractor, Step};
use super::{named_children, node_text};

/// Node kinds that group several assignment targets.
const TARGET_GROUPS: &[&str] = &[
    "pattern_list",
    "tuple_pattern",
    "list_pattern",
    "tuple",
    "list",
    "expression_list",
    "as_pattern_target",
    "parenthesized_expression",
    "list_splat_pattern",
    "list_splat",
];

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// How a name is bound inside one scope.
///
/// Precedence when a scope binds a name more than once: `Outer` > `Alias` > `Local`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Assigned, a parameter, or a loop/with/except target. Lookups stop here unresolved.
    Local,
    /// Bound by an import to the given absolute dotted name.
    Alias(String),
    /// Declared `global` or `nonlocal`; lookups skip this scope.
    Outer,
}

/// What a reference asks the resolver to find.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefKind {
    /// An import; the first candidate (absolute dotted name) that resolves wins.
    Import { candidates: Vec<String> },
    /// A call whose callee is a plain or dotted name.
    Call(String),
    /// A base class in a class header.
    Inherit(String),
    /// Any other read of a plain or dotted name.
    Read(String),
}

/// An unresolved name reference found during extraction.
///
/// The reference is looked up from the scope of the record that owns it; the resulting
/// edge starts at record `from` (the same record, the class for `Inherit`, the module for
/// `Import`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRef {
    pub kind: RefKind,
    /// 1-based line of the reference.
    pub line: u32,
    /// Index of the edge source within the file's records.
    pub from: usize,
}

// ---------------------------------------------------------------------------
// Name helpers
// ---------------------------------------------------------------------------

/// Join the identifiers of a `dotted_name` with `.` (ignoring interior whitespace).
pub(crate) fn dotted_text(node: Node, source: &[u8]) -> String {
    named_children(node)
        .into_iter()
        .filter(|c| c.kind() == "identifier")
        .map(|c| node_text(c, source))
        .collect::<Vec<_>>()
        .join(".")
}

/// `a` or `a.b.c` for identifiers and pure attribute chains; `None` for anything else
/// (calls, subscripts, literals in the chain).
pub(crate) fn dotted_expression(node: Node, source: &[u8]) -> Option<String> {
    let mut parts = Vec::new();
    let mut current = node;
    loop {
        match current.kind() {
            "identifier" => {
                parts.push(node_text(current, source));
                break;
            }
            "attribute" => {
                parts.push(node_text(current.child_by_field_name("attribute")?, source));
                current = current.child_by_field_name("object")?;
            }
            _ => return None,
        }
    }
    parts.reverse();
    Some(parts.join("."))
}

/// `base.name`, or `name` when `base` is the scan root (empty).
pub(crate) fn join_qualified(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_owned()
    } else {
        format!("{base}.{name}")
    }
}

/// The enclosing package of a dotted name; the root (`""`) for top-level names and `None`
/// above the root.
pub(crate) fn parent_package(name: &str) -> Option<&str> {
    if name.is_empty() {
        return None;
    }
    Some(name.rsplit_once('.').map_or("", |(parent, _)| parent))
}

// ---------------------------------------------------------------------------
// Reference collection
// ---------------------------------------------------------------------------

impl<'s> Extractor<'s> {
    /// Handle an expression or statement that does not define a symbol. Anything nested
    /// is scheduled, not visited in place.
    pub(crate) fn visit(&mut self, node: Node<'s>) {
        let field = |name: &str| node.child_by_field_name(name);
        match node.kind() {
            "function_definition" => self.visit_function(node, false),
            "class_definition" => self.visit_class(node),
            "decorated_definition" => self.visit_decorated(node),
            "lambda" => self.visit_lambda(node),
            "import_statement" => self.visit_import(node),
            "import_from_statement" => self.visit_import_from(node),
            "future_import_statement" | "comment" | "keyword_identifier" => {}
            "global_statement" | "nonlocal_statement" => {
                for name in named_children(node) {
                    if name.kind() == "identifier" {
                        let name = self.text(name).to_owned();
                        self.bind(name, Binding::Outer);
                    }
                }
            }
            "assignment" | "augmented_assignment" => self.then(
                [
                    field("type").map(Step::Visit),
                    field("right").map(Step::Visit),
                    field("left").map(Step::Bind),
                ]
                .into_iter()
                .flatten(),
            ),
            "for_statement" => self.then(
                [
                    field("right").map(Step::Visit),
                    field("left").map(Step::Bind),
                    field("body").map(Step::Visit),
                    field("alternative").map(Step::Visit),
                ]
                .into_iter()
                .flatten(),
            ),
            "list_comprehension"
            | "set_comprehension"
            | "dictionary_comprehension"
            | "generator_expression" => self.visit_comprehension(node),
            "as_pattern" | "except_clause" | "with_item" if field("alias").is_some() => {
                let mut steps: Vec<Step<'s>> = children_except(node, "alias")
                    .into_iter()
                    .map(Step::Visit)
                    .collect();
                steps.extend(field("alias").map(Step::Bind));
                self.then(steps);
            }
            "case_pattern" => self.bind_pattern(node),
            "named_expression" => self.then(
                [field("value").map(Step::Visit), field("name").map(Step::Bind)]
                    .into_iter()
                    .flatten(),
            ),
            "call" => self.visit_call(node),
            "attribute" => match dotted_expression(node, self.source) {
                Some(dotted) => self.push_ref(RefKind::Read(dotted), node),
                None => self.then(field("object").map(Step::Visit)),
            },
            "keyword_argument" => self.then(field("value").map(Step::Visit)),
            "identifier" => {
                let name = self.text(node).to_owned();
                self.push_ref(RefKind::Read(name), node);
            }
            "dotted_name" => {
                let dotted = dotted_text(node, self.source);
                self.push_ref(RefKind::Read(dotted), node);
            }
            _ => self.then(named_children(node).into_iter().map(Step::Visit)),
        }
    }

    fn visit_call(&mut self, node: Node<'s>) {
        let mut steps = Vec::with_capacity(2);
        if let Some(function) = node.child_by_field_name("function") {
            match dotted_expression(function, self.source) {
                Some(callee) => self.push_ref(RefKind::Call(callee), function),
                None => steps.push(Step::Visit(function)),
            }
        }
        steps.extend(node.child_by_field_name("arguments").map(Step::Visit));
        self.then(steps);
    }

    /// Comprehension targets are local to the comprehension. The first iterable is
    /// evaluated outside; the element, the conditions and the later iterables see the
    /// targets as shadowed names.
    fn visit_comprehension(&mut self, node: Node<'s>) {
        let mut names = HashSet::new();
        let mut outer = Vec::new();
        let mut inner: Vec<Step<'s>> =
            node.child_by_field_name("body").map(Step::Visit).into_iter().collect();
        let mut first = true;

        for clause in named_children(node) {
            match clause.kind() {
                "for_in_clause" => {
                    if let Some(left) = clause.child_by_field_name("left") {
                        self.collect_targets(left, &mut names);
                    }
                    let mut cursor = clause.walk();
                    let iterables = clause
                        .children_by_field_name("right", &mut cursor)
                        .map(Step::Visit);
                    if first {
                        outer.extend(iterables);
                        first = false;
                    } else {
                        inner.extend(iterables);
                    }
                }
                "if_clause" => inner.push(Step::Visit(clause)),
                _ => {}
            }
        }

        outer.push(Step::EnterShadow(names));
        outer.extend(inner);
        outer.push(Step::ExitShadow);
        self.then(outer);
    }

    fn collect_targets(&self, target: Node<'s>, names: &mut HashSet<String>) {
        let mut pending = vec![target];
        while let Some(node) = pending.pop() {
            match node.kind() {
                "identifier" => {
                    names.insert(self.text(node).to_owned());
                }
                kind if TARGET_GROUPS.contains(&kind) => pending.extend(named_children(node)),
                _ => {}
            }
        }
    }

    /// Bind every name in an assignment target in the current scope. Attribute and
    /// subscript targets bind nothing; their object expressions are reads.
    pub(crate) fn bind_target(&mut self, node: Node<'s>) {
        match node.kind() {
            "identifier" => {
                let name = self.text(node).to_owned();
                self.bind(name, Binding::Local);
            }
            kind if TARGET_GROUPS.contains(&kind) => {
                self.then(named_children(node).into_iter().map(Step::Bind));
            }
            _ => self.then([Step::Visit(node)]),
        }
    }

    /// `case` patterns: a bare name captures, a dotted name is a value read, a class
    /// pattern reads its class.
    pub(crate) fn bind_pattern(&mut self, node: Node<'s>) {
        match node.kind() {
            "dotted_name" => {
                let dotted = dotted_text(node, self.source);
                if dotted.contains('.') {
                    self.push_ref(RefKind::Read(dotted), node);
                } else if dotted != "_" {
                    self.bind(dotted, Binding::Local);
                }
            }
            "identifier" => {
                let name = self.text(node).to_owned();
                if name != "_" {
                    self.bind(name, Binding::Local);
                }
            }
            "class_pattern" => {
                let steps: Vec<Step<'s>> = named_children(node)
                    .into_iter()
                    .enumerate()
                    .map(|(i, child)| match (i, child.kind()) {
                        (0, "dotted_name") => Step::Visit(child),
                        _ => Step::Pattern(child),
                    })
                    .collect();
                self.then(steps);
            }
            // `key=pattern`: the key names an attribute.
            "keyword_pattern" => {
                self.then(named_children(node).into_iter().skip(1).map(Step::Pattern));
            }
            "case_pattern" | "as_pattern" | "union_pattern" | "list_pattern" | "tuple_pattern"
            | "dict_pattern" | "splat_pattern" => {
                self.then(named_children(node).into_iter().map(Step::Pattern));
            }
            _ => self.then([Step::Visit(node)]),
        }
    }

    /// `import a.b` binds `a`; `import a.b as x` binds `x` to `a.b`.
    fn visit_import(&mut self, node: Node) {
        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            let (full, local, target) = match name.kind() {
                "aliased_import" => {
                    let Some(full) = name.child_by_field_name("name") else { continue };
                    let Some(alias) = name.child_by_field_name("alias") else { continue };
                    let full = dotted_text(full, self.source);
                    (full.clone(), self.text(alias).to_owned(), full)
                }
                "dotted_name" => {
                    let full = dotted_text(name, self.source);
                    let head = full.split('.').next().unwrap_or_default().to_owned();
                    (full, head.clone(), head)
                }
                _ => continue,
            };
            self.bind(local, Binding::Alias(target));
            self.push_import(vec![full], name);
        }
    }

    /// `from X import n as m` binds `m` to `X.n` and imports `X.n`, falling back to `X`.
    fn visit_import_from(&mut self, node: Node) {
        let base = node
            .child_by_field_name("module_name")
            .and_then(|module| match module.kind() {
                "dotted_name" => Some(dotted_text(module, self.source)),
                "relative_import" => self.relative_base(module),
                _ => None,
            });

        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();

        if named_children(node).iter().any(|c| c.kind() == "wildcard_import") {
            if let Some(base) = &base {
                self.push_import(vec![base.clone()], node);
            }
            return;
        }

        for name in names {
            let (imported, local) = match name.kind() {
                "aliased_import" => {
                    let Some(imported) = name.child_by_field_name("name") else { continue };
                    let Some(alias) = name.child_by_field_name("alias") else { continue };
                    (dotted_text(imported, self.source), self.text(alias).to_owned())
                }
                "dotted_name" => {
                    let imported = dotted_text(name, self.source);
                    (imported.clone(), imported)
                }
                _ => continue,
            };

            match &base {
                Some(base) => {
                    let target = join_qualified(base, &imported);
                    self.bind(local, Binding::Alias(target.clone()));
                    self.push_import(vec![target, base.clone()], name);
                }
                // Unresolvable relative import: the name still shadows outer bindings.
                None => self.bind(local, Binding::Local),
            }
        }
    }

    /// Absolute package named by a `relative_import`, or `None` when the dots climb above
    /// the scan root.
    fn relative_base(&self, node: Node) -> Option<String> {
        let children = named_children(node);
        let level = children
            .iter()
            .find(|c| c.kind() == "import_prefix")
            .map(|p| self.text(*p).chars().filter(|&c| c == '.').count())
            .unwrap_or(1);

        let module = self.module();
        let mut package = if module.is_package {
            module.qualified_name.as_str()
        } else {
            parent_package(&module.qualified_name)?
        };
        for _ in 1..level {
            package = parent_package(package)?;
        }

        Some(match children.iter().find(|c| c.kind() == "dotted_name") {
            Some(name) => join_qualified(package, &dotted_text(*name, self.source)),
            None => package.to_owned(),
        })
    }
}

/// Named children of `node` except the one in `skip_field`.
fn children_except<'t>(node: Node<'t>, skip_field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let mut children = Vec::new();
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            if child.is_named() && cursor.field_name() != Some(skip_field) {
                children.push(child);
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    children
}
