use std::fmt;
use std::str::FromStr;

use super::node::NodeId;

/// Identifier of an edge: its zero-based position in the assembled edge list.
pub type EdgeId = u32;

/// The kind of directed edge between two nodes.
///
/// Declaration order is the assembly order: every `Contains` edge precedes every semantic
/// edge, and semantic edges are grouped by relation in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// Parent -> child in the single-parent containment tree.
    Contains,
    /// Module -> imported module or symbol.
    Imports,
    /// Enclosing symbol -> called function, method or class.
    Calls,
    /// Class -> base class.
    Inherits,
    /// Enclosing symbol -> symbol read by name.
    References,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Contains => "contains",
            Relation::Imports => "imports",
            Relation::Calls => "calls",
            Relation::Inherits => "inherits",
            Relation::References => "references",
        }
    }

    pub fn is_semantic(&self) -> bool {
        *self != Relation::Contains
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contains" => Ok(Relation::Contains),
            "imports" => Ok(Relation::Imports),
            "calls" => Ok(Relation::Calls),
            "inherits" => Ok(Relation::Inherits),
            "references" => Ok(Relation::References),
            other => Err(format!("unknown relation {other:?}")),
        }
    }
}

/// A directed, typed relation between two existing nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub relation: Relation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_order_matches_assembly_order() {
        let mut relations = vec![
            Relation::References,
            Relation::Inherits,
            Relation::Contains,
            Relation::Calls,
            Relation::Imports,
        ];
        relations.sort();
        let names: Vec<&str> = relations.iter().map(Relation::as_str).collect();
        assert_eq!(
            names,
            vec!["contains", "imports", "calls", "inherits", "references"]
        );
    }

    #[test]
    fn test_unknown_relation_is_rejected() {
        assert_eq!("calls".parse::<Relation>(), Ok(Relation::Calls));
        assert!("exports".parse::<Relation>().is_err());
    }
}
