use std::collections::{BTreeMap, HashSet};

use tree_sitter::{Node, Tree};

use crate::config::AnonymousPolicy;
use crate::graph::node::NodeKind;

use super::relationships::{Binding, NameRef, RefKind, dotted_expression, join_qualified};
use super::signature::{class_signature, docstring, function_signature};
use super::{named_children, node_text};

/// Name given to lambdas under [`AnonymousPolicy::Synthetic`].
pub const LAMBDA_NAME: &str = "<lambda>";

/// Identity of one source file as a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// File path relative to the scan root, `/`-separated.
    pub module_path: String,
    /// Dotted module name (`pkg/sub/mod.py` -> `pkg.sub.mod`, `pkg/__init__.py` -> `pkg`).
    pub qualified_name: String,
    /// True for `__init__` files; relative imports resolve against the module itself.
    pub is_package: bool,
}

impl ModuleInfo {
    /// Last dotted segment, used as the module node's `name`.
    pub fn name(&self) -> &str {
        self.qualified_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.qualified_name)
    }
}

/// A symbol extracted from one file, before it has a node id.
///
/// Records are stored in pre-order; record 0 is always the module and every `parent`
/// index is smaller than the record's own index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSymbol {
    pub kind: NodeKind,
    pub name: String,
    /// `None` for anonymous symbols and anything nested inside one.
    pub qualified_name: Option<String>,
    /// Index of the enclosing record; `None` only for the module.
    pub parent: Option<usize>,
    pub lineno: u32,
    pub end_lineno: u32,
    pub signature: Option<String>,
    pub doc: Option<String>,
    /// Parameter naming the instance (or class) for non-static methods.
    pub receiver: Option<String>,
    /// Names bound directly in this symbol's scope.
    pub bindings: BTreeMap<String, Binding>,
    /// References to resolve from this symbol's scope.
    pub references: Vec<NameRef>,
}

/// 1-based inclusive line span of a node. A node ending at column 0 of a later row ends
/// on the previous line (its trailing newline belongs to it).
pub fn line_span(node: Node) -> (u32, u32) {
    let start = node.start_position().row;
    let end = node.end_position();
    let last = if end.column == 0 && end.row > start {
        end.row
    } else {
        end.row + 1
    };
    (start as u32 + 1, last as u32)
}

/// One unit of pending traversal work.
///
/// The extractor pops steps off a stack instead of recursing, so arbitrarily deep
/// expressions cost heap, not thread stack.
pub(crate) enum Step<'t> {
    /// An expression or statement that may define or reference names.
    Visit(Node<'t>),
    /// An assignment target.
    Bind(Node<'t>),
    /// A `case` pattern.
    Pattern(Node<'t>),
    /// A `def` (decorators already visited).
    Function { node: Node<'t>, is_static: bool },
    /// A `class` (decorators already visited).
    Class(Node<'t>),
    /// Record, parameters and body of a `def`; defaults and annotations are done.
    FunctionBody { node: Node<'t>, is_static: bool },
    /// Body of a lambda; its defaults are done.
    LambdaBody(Node<'t>),
    /// One base in the header of the class record `class`.
    Base { node: Node<'t>, class: usize },
    EnterScope(usize),
    ExitScope,
    EnterShadow(HashSet<String>),
    ExitShadow,
}

/// Pre-order walker producing the [`RawSymbol`] records of one file.
pub(crate) struct Extractor<'s> {
    pub(crate) source: &'s [u8],
    module: &'s ModuleInfo,
    anonymous: AnonymousPolicy,
    records: Vec<RawSymbol>,
    /// Indices of the records whose scopes enclose the current position, innermost last.
    scope: Vec<usize>,
    /// Names local to enclosing lambdas and comprehensions that produce no record.
    shadows: Vec<HashSet<String>>,
    /// Pending steps, next on top.
    work: Vec<Step<'s>>,
}

/// Extract the module record and every class, function and method record of a file.
pub fn extract_symbols<'s>(
    tree: &'s Tree,
    source: &'s [u8],
    module: &'s ModuleInfo,
    anonymous: AnonymousPolicy,
) -> Vec<RawSymbol> {
    let root = tree.root_node();
    let text = String::from_utf8_lossy(source);
    let line_count = text.lines().count().max(1) as u32;

    let mut extractor = Extractor {
        source,
        module,
        anonymous,
        records: Vec::new(),
        scope: Vec::new(),
        shadows: Vec::new(),
        work: Vec::new(),
    };

    extractor.records.push(RawSymbol {
        kind: NodeKind::Module,
        name: module.name().to_owned(),
        qualified_name: Some(module.qualified_name.clone()),
        parent: None,
        lineno: 1,
        end_lineno: line_count,
        signature: None,
        doc: docstring(root, source),
        receiver: None,
        bindings: BTreeMap::new(),
        references: Vec::new(),
    });
    extractor.scope.push(0);

    extractor.then(named_children(root).into_iter().map(Step::Visit));
    extractor.run();
    extractor.records
}

impl<'s> Extractor<'s> {
    fn run(&mut self) {
        while let Some(step) = self.work.pop() {
            match step {
                Step::Visit(node) => self.visit(node),
                Step::Bind(node) => self.bind_target(node),
                Step::Pattern(node) => self.bind_pattern(node),
                Step::Function { node, is_static } => self.visit_function(node, is_static),
                Step::Class(node) => self.visit_class(node),
                Step::FunctionBody { node, is_static } => self.enter_function(node, is_static),
                Step::LambdaBody(node) => self.enter_lambda(node),
                Step::Base { node, class } => self.visit_base(node, class),
                Step::EnterScope(index) => self.scope.push(index),
                Step::ExitScope => {
                    self.scope.pop();
                }
                Step::EnterShadow(names) => self.shadows.push(names),
                Step::ExitShadow => {
                    self.shadows.pop();
                }
            }
        }
    }

    /// Schedule `steps` to run next, in the order given.
    pub(crate) fn then<I>(&mut self, steps: I)
    where
        I: IntoIterator<Item = Step<'s>>,
        I::IntoIter: DoubleEndedIterator,
    {
        self.work.extend(steps.into_iter().rev());
    }

    pub(crate) fn is_shadowed(&self, name: &str) -> bool {
        self.shadows.iter().any(|s| s.contains(name))
    }

    pub(crate) fn text(&self, node: Node) -> &'s str {
        node_text(node, self.source)
    }

    pub(crate) fn module(&self) -> &'s ModuleInfo {
        self.module
    }

    fn current(&self) -> usize {
        self.scope.last().copied().unwrap_or(0)
    }

    /// Record a binding in the current scope, honoring `Outer` > `Alias` > `Local`.
    pub(crate) fn bind(&mut self, name: String, binding: Binding) {
        if self.is_shadowed(&name) {
            return;
        }
        let current = self.current();
        let bindings = &mut self.records[current].bindings;
        let weaker = matches!(
            (bindings.get(&name), &binding),
            (Some(Binding::Outer), _) | (Some(Binding::Alias(_)), Binding::Local)
        );
        if !weaker {
            bindings.insert(name, binding);
        }
    }

    /// Queue a reference from the current scope unless its head is a lambda parameter.
    pub(crate) fn push_ref(&mut self, kind: RefKind, node: Node) {
        let dotted = match &kind {
            RefKind::Call(name) | RefKind::Inherit(name) | RefKind::Read(name) => name.as_str(),
            RefKind::Import { .. } => "",
        };
        let head = dotted.split('.').next().unwrap_or(dotted);
        if self.is_shadowed(head) {
            return;
        }
        let current = self.current();
        self.records[current].references.push(NameRef {
            kind,
            line: line_span(node).0,
            from: current,
        });
    }

    /// Queue an import; the edge always starts at the module.
    pub(crate) fn push_import(&mut self, candidates: Vec<String>, node: Node) {
        let current = self.current();
        self.records[current].references.push(NameRef {
            kind: RefKind::Import { candidates },
            line: line_span(node).0,
            from: 0,
        });
    }

    fn push_record(
        &mut self,
        kind: NodeKind,
        name: String,
        named: bool,
        span: (u32, u32),
        signature: Option<String>,
        doc: Option<String>,
    ) -> usize {
        let parent = self.current();
        let qualified_name = if named {
            self.records[parent]
                .qualified_name
                .as_deref()
                .map(|q| join_qualified(q, &name))
        } else {
            None
        };
        self.records.push(RawSymbol {
            kind,
            name,
            qualified_name,
            parent: Some(parent),
            lineno: span.0,
            end_lineno: span.1,
            signature,
            doc,
            receiver: None,
            bindings: BTreeMap::new(),
            references: Vec::new(),
        });
        self.records.len() - 1
    }

    /// Visit a decorated `def` or `class`. Decorators run in the enclosing scope.
    pub(crate) fn visit_decorated(&mut self, node: Node<'s>) {
        let mut is_static = false;
        let mut steps = Vec::new();
        for child in named_children(node) {
            if child.kind() != "decorator" {
                continue;
            }
            if let Some(expr) = named_children(child).into_iter().next() {
                is_static |= self.text(expr).trim() == "staticmethod";
                steps.push(Step::Visit(expr));
            }
        }
        if let Some(definition) = node.child_by_field_name("definition") {
            steps.push(match definition.kind() {
                "function_definition" => Step::Function {
                    node: definition,
                    is_static,
                },
                "class_definition" => Step::Class(definition),
                _ => Step::Visit(definition),
            });
        }
        self.then(steps);
    }

    /// Defaults and annotations are evaluated where the `def` runs, before its body.
    pub(crate) fn visit_function(&mut self, node: Node<'s>, is_static: bool) {
        if node.child_by_field_name("name").is_none() {
            return;
        }
        let mut steps = parameter_expressions(node.child_by_field_name("parameters"));
        steps.extend(node.child_by_field_name("return_type").map(Step::Visit));
        steps.push(Step::FunctionBody { node, is_static });
        self.then(steps);
    }

    fn enter_function(&mut self, node: Node<'s>, is_static: bool) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name).to_owned();
        let params = node.child_by_field_name("parameters");
        let return_type = node.child_by_field_name("return_type");

        let kind = if self.records[self.current()].kind == NodeKind::Class {
            NodeKind::Method
        } else {
            NodeKind::Function
        };
        let body = node.child_by_field_name("body");
        let signature = function_signature(params, return_type, self.source);
        let doc = body.and_then(|b| docstring(b, self.source));

        let index = self.push_record(kind, name, true, line_span(node), Some(signature), doc);
        self.scope.push(index);

        let names = params.map(|p| self.parameter_names(p)).unwrap_or_default();
        if kind == NodeKind::Method && !is_static {
            self.records[index].receiver = names.first().cloned();
        }
        for param in names {
            self.bind(param, Binding::Local);
        }

        let mut steps: Vec<Step<'s>> = body
            .map(named_children)
            .unwrap_or_default()
            .into_iter()
            .map(Step::Visit)
            .collect();
        steps.push(Step::ExitScope);
        self.then(steps);
    }

    pub(crate) fn visit_class(&mut self, node: Node<'s>) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name).to_owned();
        let superclasses = node.child_by_field_name("superclasses");
        let body = node.child_by_field_name("body");
        let signature = class_signature(superclasses, self.source);
        let doc = body.and_then(|b| docstring(b, self.source));

        let index = self.push_record(NodeKind::Class, name, true, line_span(node), signature, doc);

        let mut steps: Vec<Step<'s>> = superclasses
            .map(named_children)
            .unwrap_or_default()
            .into_iter()
            .map(|base| Step::Base {
                node: base,
                class: index,
            })
            .collect();
        steps.push(Step::EnterScope(index));
        steps.extend(
            body.map(named_children)
                .unwrap_or_default()
                .into_iter()
                .map(Step::Visit),
        );
        steps.push(Step::ExitScope);
        self.then(steps);
    }

    /// Bases resolve in the enclosing scope; the edge starts at the class.
    fn visit_base(&mut self, base: Node<'s>, class: usize) {
        match dotted_expression(base, self.source) {
            Some(dotted) => {
                let head = dotted.split('.').next().unwrap_or_default();
                if self.is_shadowed(head) {
                    return;
                }
                let current = self.current();
                self.records[current].references.push(NameRef {
                    kind: RefKind::Inherit(dotted),
                    line: line_span(base).0,
                    from: class,
                });
            }
            None => self.work.push(Step::Visit(base)),
        }
    }

    pub(crate) fn visit_lambda(&mut self, node: Node<'s>) {
        let mut steps = parameter_expressions(node.child_by_field_name("parameters"));
        steps.push(Step::LambdaBody(node));
        self.then(steps);
    }

    fn enter_lambda(&mut self, node: Node<'s>) {
        let params = node.child_by_field_name("parameters");
        let names = params.map(|p| self.parameter_names(p)).unwrap_or_default();
        let body = node.child_by_field_name("body").map(Step::Visit);

        match self.anonymous {
            AnonymousPolicy::Skip => {
                self.shadows.push(names.into_iter().collect());
                self.then(body.into_iter().chain([Step::ExitShadow]));
            }
            AnonymousPolicy::Synthetic => {
                let signature = function_signature(params, None, self.source);
                let index = self.push_record(
                    NodeKind::Function,
                    LAMBDA_NAME.to_owned(),
                    false,
                    line_span(node),
                    Some(signature),
                    None,
                );
                self.scope.push(index);
                for param in names {
                    self.bind(param, Binding::Local);
                }
                self.then(body.into_iter().chain([Step::ExitScope]));
            }
        }
    }

    /// Names bound by a parameter list, in declared order (separators excluded).
    fn parameter_names(&self, params: Node) -> Vec<String> {
        named_children(params)
            .into_iter()
            .filter_map(|param| self.parameter_name(param))
            .collect()
    }

    fn parameter_name(&self, param: Node) -> Option<String> {
        match param.kind() {
            "identifier" => Some(self.text(param).to_owned()),
            "default_parameter" | "typed_default_parameter" => {
                let name = param.child_by_field_name("name")?;
                self.parameter_name(name)
            }
            "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                named_children(param)
                    .into_iter()
                    .filter(|c| c.kind() != "type")
                    .find_map(|c| self.parameter_name(c))
            }
            _ => None,
        }
    }
}

/// Default values and annotations of a parameter list, in declared order.
fn parameter_expressions(params: Option<Node<'_>>) -> Vec<Step<'_>> {
    let mut steps = Vec::new();
    for param in params.map(named_children).unwrap_or_default() {
        for field in ["type", "value"] {
            if let Some(expr) = param.child_by_field_name(field) {
                steps.push(Step::Visit(expr));
            }
        }
    }
    steps
}
