//! RDF type definitions
//!
//! This module provides wrapper types around the oxrdf library for RDF primitives,
//! plus the pattern-side types (nodes, variables, triple patterns and shapes)
//! consumed by the optimizer and the sampler.

use oxrdf::{
    BlankNode as OxBlankNode, Literal as OxLiteral, NamedNode as OxNamedNode,
    Subject as OxSubject, Term as OxTerm, Triple as OxTriple, Variable as OxVariable,
};
use std::fmt;
use thiserror::Error;

/// RDF errors
#[derive(Error, Debug)]
pub enum RdfError {
    /// Invalid IRI
    #[error("Invalid IRI: {0}")]
    InvalidIri(String),

    /// Invalid blank node
    #[error("Invalid blank node: {0}")]
    InvalidBlankNode(String),

    /// Invalid literal
    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),

    /// Invalid variable name
    #[error("Invalid variable: {0}")]
    InvalidVariable(String),

    /// A term cannot be used in the requested position
    #[error("Invalid {position} term: {term}")]
    InvalidPosition {
        position: &'static str,
        term: String,
    },

    /// Malformed RDF document or SPARQL query
    #[error("Syntax error: {0}")]
    Syntax(String),
}

impl From<rio_turtle::TurtleError> for RdfError {
    fn from(e: rio_turtle::TurtleError) -> Self {
        RdfError::Syntax(e.to_string())
    }
}

pub type RdfResult<T> = Result<T, RdfError>;

/// Named node (IRI)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamedNode(OxNamedNode);

impl NamedNode {
    /// Create a new named node from an IRI string
    pub fn new(iri: &str) -> RdfResult<Self> {
        OxNamedNode::new(iri)
            .map(Self)
            .map_err(|e| RdfError::InvalidIri(e.to_string()))
    }

    /// Get the IRI string
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the inner oxrdf NamedNode
    pub fn inner(&self) -> &OxNamedNode {
        &self.0
    }
}

impl fmt::Display for NamedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.as_str())
    }
}

impl From<OxNamedNode> for NamedNode {
    fn from(node: OxNamedNode) -> Self {
        Self(node)
    }
}

impl From<NamedNode> for OxNamedNode {
    fn from(node: NamedNode) -> Self {
        node.0
    }
}

/// Blank node (anonymous node)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlankNode(OxBlankNode);

impl BlankNode {
    /// Create a new blank node with a unique identifier
    pub fn new() -> Self {
        Self(OxBlankNode::default())
    }

    /// Create a blank node from a string identifier
    pub fn from_str(s: &str) -> RdfResult<Self> {
        OxBlankNode::new(s)
            .map(Self)
            .map_err(|e| RdfError::InvalidBlankNode(e.to_string()))
    }

    /// Get the blank node identifier
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for BlankNode {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.as_str())
    }
}

impl From<OxBlankNode> for BlankNode {
    fn from(node: OxBlankNode) -> Self {
        Self(node)
    }
}

/// RDF literal value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal(OxLiteral);

impl Literal {
    /// Create a simple literal (plain string)
    pub fn new_simple_literal(value: impl Into<String>) -> Self {
        Self(OxLiteral::new_simple_literal(value))
    }

    /// Create a literal with language tag
    pub fn new_language_tagged_literal(
        value: impl Into<String>,
        language: impl Into<String>,
    ) -> RdfResult<Self> {
        OxLiteral::new_language_tagged_literal(value, language)
            .map(Self)
            .map_err(|e| RdfError::InvalidLiteral(e.to_string()))
    }

    /// Create a typed literal
    pub fn new_typed_literal(value: impl Into<String>, datatype: NamedNode) -> Self {
        Self(OxLiteral::new_typed_literal(value, datatype.0))
    }

    /// Get the lexical value
    pub fn value(&self) -> &str {
        self.0.value()
    }

    /// Get the language tag if present
    pub fn language(&self) -> Option<&str> {
        self.0.language()
    }

    /// Get the datatype
    pub fn datatype(&self) -> NamedNode {
        NamedNode(self.0.datatype().into_owned())
    }
}

/// Literals are written in N-Triples syntax, which is also valid SPARQL.
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<OxLiteral> for Literal {
    fn from(lit: OxLiteral) -> Self {
        Self(lit)
    }
}

/// Query variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(OxVariable);

impl Variable {
    /// Create a variable from its name (without the leading `?`)
    pub fn new(name: &str) -> RdfResult<Self> {
        OxVariable::new(name)
            .map(Self)
            .map_err(|e| RdfError::InvalidVariable(e.to_string()))
    }

    /// Get the variable name
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    // Canonical names are statically valid.
    pub(crate) fn canonical(name: &'static str) -> Self {
        Self(OxVariable::new_unchecked(name))
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.as_str())
    }
}

impl From<OxVariable> for Variable {
    fn from(var: OxVariable) -> Self {
        Self(var)
    }
}

/// RDF subject (NamedNode or BlankNode)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RdfSubject {
    /// Named node (IRI)
    NamedNode(NamedNode),
    /// Blank node
    BlankNode(BlankNode),
}

impl RdfSubject {
    /// Check if this is a named node
    pub fn is_named_node(&self) -> bool {
        matches!(self, RdfSubject::NamedNode(_))
    }

    /// Check if this is a blank node
    pub fn is_blank_node(&self) -> bool {
        matches!(self, RdfSubject::BlankNode(_))
    }
}

impl fmt::Display for RdfSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdfSubject::NamedNode(n) => write!(f, "{}", n),
            RdfSubject::BlankNode(b) => write!(f, "{}", b),
        }
    }
}

impl From<NamedNode> for RdfSubject {
    fn from(node: NamedNode) -> Self {
        RdfSubject::NamedNode(node)
    }
}

impl From<BlankNode> for RdfSubject {
    fn from(node: BlankNode) -> Self {
        RdfSubject::BlankNode(node)
    }
}

impl TryFrom<OxSubject> for RdfSubject {
    type Error = RdfError;

    fn try_from(subject: OxSubject) -> RdfResult<Self> {
        match subject {
            OxSubject::NamedNode(n) => Ok(RdfSubject::NamedNode(n.into())),
            OxSubject::BlankNode(b) => Ok(RdfSubject::BlankNode(b.into())),
            #[allow(unreachable_patterns)]
            other => Err(RdfError::InvalidPosition {
                position: "subject",
                term: other.to_string(),
            }),
        }
    }
}

/// RDF predicate (always a NamedNode)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RdfPredicate(NamedNode);

impl RdfPredicate {
    /// Create a new predicate from an IRI
    pub fn new(iri: &str) -> RdfResult<Self> {
        Ok(Self(NamedNode::new(iri)?))
    }

    /// Get the underlying named node
    pub fn as_named_node(&self) -> &NamedNode {
        &self.0
    }
}

impl fmt::Display for RdfPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<NamedNode> for RdfPredicate {
    fn from(node: NamedNode) -> Self {
        RdfPredicate(node)
    }
}

impl From<RdfPredicate> for NamedNode {
    fn from(pred: RdfPredicate) -> Self {
        pred.0
    }
}

/// RDF object (NamedNode, BlankNode, or Literal)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RdfObject {
    /// Named node (IRI)
    NamedNode(NamedNode),
    /// Blank node
    BlankNode(BlankNode),
    /// Literal value
    Literal(Literal),
}

impl RdfObject {
    /// Check if this is a named node
    pub fn is_named_node(&self) -> bool {
        matches!(self, RdfObject::NamedNode(_))
    }

    /// Check if this is a blank node
    pub fn is_blank_node(&self) -> bool {
        matches!(self, RdfObject::BlankNode(_))
    }

    /// Check if this is a literal
    pub fn is_literal(&self) -> bool {
        matches!(self, RdfObject::Literal(_))
    }
}

impl fmt::Display for RdfObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdfObject::NamedNode(n) => write!(f, "{}", n),
            RdfObject::BlankNode(b) => write!(f, "{}", b),
            RdfObject::Literal(l) => write!(f, "{}", l),
        }
    }
}

impl From<NamedNode> for RdfObject {
    fn from(node: NamedNode) -> Self {
        RdfObject::NamedNode(node)
    }
}

impl From<BlankNode> for RdfObject {
    fn from(node: BlankNode) -> Self {
        RdfObject::BlankNode(node)
    }
}

impl From<Literal> for RdfObject {
    fn from(lit: Literal) -> Self {
        RdfObject::Literal(lit)
    }
}

impl TryFrom<OxTerm> for RdfObject {
    type Error = RdfError;

    fn try_from(term: OxTerm) -> RdfResult<Self> {
        match term {
            OxTerm::NamedNode(n) => Ok(RdfObject::NamedNode(n.into())),
            OxTerm::BlankNode(b) => Ok(RdfObject::BlankNode(b.into())),
            OxTerm::Literal(l) => Ok(RdfObject::Literal(l.into())),
            #[allow(unreachable_patterns)]
            other => Err(RdfError::InvalidPosition {
                position: "object",
                term: other.to_string(),
            }),
        }
    }
}

/// RDF term (any RDF value)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RdfTerm {
    /// Named node (IRI)
    NamedNode(NamedNode),
    /// Blank node
    BlankNode(BlankNode),
    /// Literal value
    Literal(Literal),
}

impl RdfTerm {
    /// Check if this is a blank node
    pub fn is_blank_node(&self) -> bool {
        matches!(self, RdfTerm::BlankNode(_))
    }
}

impl fmt::Display for RdfTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdfTerm::NamedNode(n) => write!(f, "{}", n),
            RdfTerm::BlankNode(b) => write!(f, "{}", b),
            RdfTerm::Literal(l) => write!(f, "{}", l),
        }
    }
}

impl From<RdfSubject> for RdfTerm {
    fn from(subject: RdfSubject) -> Self {
        match subject {
            RdfSubject::NamedNode(n) => RdfTerm::NamedNode(n),
            RdfSubject::BlankNode(b) => RdfTerm::BlankNode(b),
        }
    }
}

impl From<RdfObject> for RdfTerm {
    fn from(object: RdfObject) -> Self {
        match object {
            RdfObject::NamedNode(n) => RdfTerm::NamedNode(n),
            RdfObject::BlankNode(b) => RdfTerm::BlankNode(b),
            RdfObject::Literal(l) => RdfTerm::Literal(l),
        }
    }
}

impl From<RdfTerm> for Node {
    fn from(term: RdfTerm) -> Self {
        match term {
            RdfTerm::NamedNode(n) => Node::Uri(n),
            RdfTerm::BlankNode(b) => Node::Blank(b),
            RdfTerm::Literal(l) => Node::Literal(l),
        }
    }
}

/// RDF triple (subject-predicate-object)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    /// Subject
    pub subject: RdfSubject,
    /// Predicate
    pub predicate: RdfPredicate,
    /// Object
    pub object: RdfObject,
}

impl Triple {
    /// Create a new triple
    pub fn new(subject: RdfSubject, predicate: RdfPredicate, object: RdfObject) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Check whether a variable position of `pattern` would bind a blank node
    pub fn binds_blank_node(&self, pattern: &TriplePattern) -> bool {
        (pattern.subject.is_variable() && self.subject.is_blank_node())
            || (pattern.object.is_variable() && self.object.is_blank_node())
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

impl TryFrom<OxTriple> for Triple {
    type Error = RdfError;

    fn try_from(triple: OxTriple) -> RdfResult<Self> {
        Ok(Self {
            subject: triple.subject.try_into()?,
            predicate: RdfPredicate(triple.predicate.into()),
            object: triple.object.try_into()?,
        })
    }
}

/// A position of a triple pattern: a constant term, a variable, or the wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    /// Named node (IRI)
    Uri(NamedNode),
    /// Literal value
    Literal(Literal),
    /// Blank node
    Blank(BlankNode),
    /// Named variable; equal names join across patterns
    Variable(Variable),
    /// Wildcard; matches anything and never joins
    Any,
}

impl Node {
    /// Create a URI node
    pub fn uri(iri: &str) -> RdfResult<Self> {
        Ok(Node::Uri(NamedNode::new(iri)?))
    }

    /// Create a variable node
    pub fn var(name: &str) -> RdfResult<Self> {
        Ok(Node::Variable(Variable::new(name)?))
    }

    /// Create a simple literal node
    pub fn literal(value: impl Into<String>) -> Self {
        Node::Literal(Literal::new_simple_literal(value))
    }

    /// True for named variables and the wildcard
    pub fn is_variable(&self) -> bool {
        matches!(self, Node::Variable(_) | Node::Any)
    }

    /// True for URIs, literals and blank nodes
    pub fn is_concrete(&self) -> bool {
        !self.is_variable()
    }

    /// Get the variable if this node is a named variable
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Node::Variable(v) => Some(v),
            _ => None,
        }
    }

    /// Get the IRI if this node is a URI
    pub fn as_named_node(&self) -> Option<&NamedNode> {
        match self {
            Node::Uri(n) => Some(n),
            _ => None,
        }
    }

    fn matches_term(&self, term: &RdfTerm) -> bool {
        match (self, term) {
            (Node::Variable(_) | Node::Any, _) => true,
            (Node::Uri(a), RdfTerm::NamedNode(b)) => a == b,
            (Node::Blank(a), RdfTerm::BlankNode(b)) => a == b,
            (Node::Literal(a), RdfTerm::Literal(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Uri(n) => write!(f, "{}", n),
            Node::Literal(l) => write!(f, "{}", l),
            Node::Blank(b) => write!(f, "{}", b),
            Node::Variable(v) => write!(f, "{}", v),
            Node::Any => write!(f, "ANY"),
        }
    }
}

impl From<NamedNode> for Node {
    fn from(node: NamedNode) -> Self {
        Node::Uri(node)
    }
}

impl From<Literal> for Node {
    fn from(lit: Literal) -> Self {
        Node::Literal(lit)
    }
}

impl From<Variable> for Node {
    fn from(var: Variable) -> Self {
        Node::Variable(var)
    }
}

impl From<RdfSubject> for Node {
    fn from(subject: RdfSubject) -> Self {
        RdfTerm::from(subject).into()
    }
}

impl From<RdfObject> for Node {
    fn from(object: RdfObject) -> Self {
        RdfTerm::from(object).into()
    }
}

/// Triple pattern (subject, predicate, object), each position a [`Node`]
///
/// A [`Node::Blank`] position names one concrete blank node. SPARQL has no
/// syntax for that, so remote endpoints refuse such patterns; blank nodes in
/// query text are read as variables by [`parse_bgp`](crate::rdf::parse_bgp).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriplePattern {
    /// Subject
    pub subject: Node,
    /// Predicate
    pub predicate: Node,
    /// Object
    pub object: Node,
}

impl TriplePattern {
    /// Create a new triple pattern
    pub fn new(subject: impl Into<Node>, predicate: impl Into<Node>, object: impl Into<Node>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }

    /// Named variables of the pattern, in subject/predicate/object order
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(Node::as_variable)
    }

    /// The pattern with variable names erased
    ///
    /// A variable is renamed after the first position it occurs in, so
    /// `?x <p> ?x` keeps its self-join as `?s <p> ?s`.
    pub fn shape(&self) -> PatternShape {
        let positions = [(&self.subject, "s"), (&self.predicate, "p"), (&self.object, "o")];
        let standardize = |(node, name): (&Node, &'static str)| match node {
            Node::Variable(var) => {
                let first = positions
                    .iter()
                    .find(|(other, _)| other.as_variable() == Some(var))
                    .map_or(name, |(_, first)| *first);
                Node::Variable(Variable::canonical(first))
            }
            Node::Any => Node::Variable(Variable::canonical(name)),
            concrete => concrete.clone(),
        };
        PatternShape(TriplePattern {
            subject: standardize(positions[0]),
            predicate: standardize(positions[1]),
            object: standardize(positions[2]),
        })
    }

    /// Check if a triple matches this pattern
    pub fn matches(&self, triple: &Triple) -> bool {
        let subject = RdfTerm::from(triple.subject.clone());
        let predicate = RdfTerm::NamedNode(triple.predicate.as_named_node().clone());
        let object = RdfTerm::from(triple.object.clone());

        if !self.subject.matches_term(&subject)
            || !self.predicate.matches_term(&predicate)
            || !self.object.matches_term(&object)
        {
            return false;
        }

        // A repeated variable must bind the same term everywhere
        let bindings = [
            (&self.subject, &subject),
            (&self.predicate, &predicate),
            (&self.object, &object),
        ];
        for (i, (node, term)) in bindings.iter().enumerate() {
            if let Some(var) = node.as_variable() {
                let conflict = bindings[i + 1..]
                    .iter()
                    .any(|(other, other_term)| other.as_variable() == Some(var) && other_term != term);
                if conflict {
                    return false;
                }
            }
        }
        true
    }
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

impl From<Triple> for TriplePattern {
    fn from(triple: Triple) -> Self {
        Self {
            subject: triple.subject.into(),
            predicate: Node::Uri(triple.predicate.into()),
            object: triple.object.into(),
        }
    }
}

/// A triple pattern whose variables are renamed to `?s`, `?p`, `?o`
///
/// Two patterns that differ only in their choice of variable names have the
/// same shape. Patterns that differ in which positions share a variable do
/// not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatternShape(TriplePattern);

impl PatternShape {
    /// Get the standardized pattern
    pub fn as_pattern(&self) -> &TriplePattern {
        &self.0
    }
}

impl fmt::Display for PatternShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
