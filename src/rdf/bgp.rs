//! Basic graph pattern extraction from SPARQL queries

use super::types::{Node, RdfError, RdfResult, TriplePattern, Variable};
use spargebra::algebra::GraphPattern;
use spargebra::term::{NamedNodePattern, TermPattern};
use spargebra::Query;

/// Parse a SPARQL query and return the triple patterns of its basic graph pattern
///
/// Filters, projections, modifiers and the required side of OPTIONAL are
/// looked through. Unions, MINUS, property paths and SERVICE blocks are not
/// basic graph patterns and are rejected.
pub fn parse_bgp(query: &str) -> RdfResult<Vec<TriplePattern>> {
    let query = Query::parse(query, None).map_err(|e| RdfError::Syntax(e.to_string()))?;
    let pattern = match &query {
        Query::Select { pattern, .. }
        | Query::Construct { pattern, .. }
        | Query::Describe { pattern, .. }
        | Query::Ask { pattern, .. } => pattern,
    };
    let mut patterns = Vec::new();
    collect(pattern, &mut patterns)?;
    Ok(patterns)
}

fn collect(pattern: &GraphPattern, out: &mut Vec<TriplePattern>) -> RdfResult<()> {
    match pattern {
        GraphPattern::Bgp { patterns } => {
            for p in patterns {
                out.push(TriplePattern::new(
                    convert_term(&p.subject)?,
                    convert_predicate(&p.predicate),
                    convert_term(&p.object)?,
                ));
            }
            Ok(())
        }
        GraphPattern::Join { left, right } => {
            collect(left, out)?;
            collect(right, out)
        }
        GraphPattern::LeftJoin { left, .. } => collect(left, out),
        GraphPattern::Filter { inner, .. }
        | GraphPattern::Project { inner, .. }
        | GraphPattern::Distinct { inner }
        | GraphPattern::Reduced { inner }
        | GraphPattern::Slice { inner, .. }
        | GraphPattern::OrderBy { inner, .. }
        | GraphPattern::Extend { inner, .. }
        | GraphPattern::Group { inner, .. }
        | GraphPattern::Graph { inner, .. } => collect(inner, out),
        GraphPattern::Values { .. } => Ok(()),
        other => Err(RdfError::Syntax(format!("not a basic graph pattern: {}", other))),
    }
}

fn convert_predicate(p: &NamedNodePattern) -> Node {
    match p {
        NamedNodePattern::NamedNode(n) => Node::Uri(n.clone().into()),
        NamedNodePattern::Variable(v) => Node::Variable(v.clone().into()),
    }
}

fn convert_term(t: &TermPattern) -> RdfResult<Node> {
    match t {
        TermPattern::NamedNode(n) => Ok(Node::Uri(n.clone().into())),
        TermPattern::Literal(l) => Ok(Node::Literal(l.clone().into())),
        TermPattern::Variable(v) => Ok(Node::Variable(v.clone().into())),
        // Query blank nodes are non-distinguished variables
        TermPattern::BlankNode(b) => Ok(Node::Variable(Variable::new(&format!("_bnode_{}", b.as_str()))?)),
        #[allow(unreachable_patterns)]
        other => Err(RdfError::InvalidPosition {
            position: "pattern",
            term: other.to_string(),
        }),
    }
}
