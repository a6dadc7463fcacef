//! N-Triples and Turtle parsing
//!
//! Used to read CONSTRUCT results from remote endpoints and to load the
//! in-memory endpoint from files.

use super::types::{BlankNode, Literal, NamedNode, RdfError, RdfObject, RdfPredicate, RdfResult, RdfSubject, Triple};
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesParser, TurtleParser};
use std::io::Cursor;

/// Parse an N-Triples document
pub fn parse_ntriples(input: &str) -> RdfResult<Vec<Triple>> {
    let mut triples = Vec::new();
    NTriplesParser::new(Cursor::new(input)).parse_all(&mut |t| -> RdfResult<()> {
        triples.push(convert_triple(t)?);
        Ok(())
    })?;
    Ok(triples)
}

/// Parse a Turtle document
pub fn parse_turtle(input: &str) -> RdfResult<Vec<Triple>> {
    let mut triples = Vec::new();
    TurtleParser::new(Cursor::new(input), None).parse_all(&mut |t| -> RdfResult<()> {
        triples.push(convert_triple(t)?);
        Ok(())
    })?;
    Ok(triples)
}

fn convert_triple(t: rio_api::model::Triple<'_>) -> RdfResult<Triple> {
    Ok(Triple::new(
        convert_subject(t.subject)?,
        RdfPredicate::new(t.predicate.iri)?,
        convert_object(t.object)?,
    ))
}

fn convert_subject(s: rio_api::model::Subject<'_>) -> RdfResult<RdfSubject> {
    match s {
        rio_api::model::Subject::NamedNode(n) => Ok(RdfSubject::NamedNode(NamedNode::new(n.iri)?)),
        rio_api::model::Subject::BlankNode(b) => Ok(RdfSubject::BlankNode(BlankNode::from_str(b.id)?)),
        #[allow(unreachable_patterns)]
        other => Err(RdfError::InvalidPosition {
            position: "subject",
            term: other.to_string(),
        }),
    }
}

fn convert_object(o: rio_api::model::Term<'_>) -> RdfResult<RdfObject> {
    match o {
        rio_api::model::Term::NamedNode(n) => Ok(RdfObject::NamedNode(NamedNode::new(n.iri)?)),
        rio_api::model::Term::BlankNode(b) => Ok(RdfObject::BlankNode(BlankNode::from_str(b.id)?)),
        rio_api::model::Term::Literal(l) => match l {
            rio_api::model::Literal::Simple { value } => Ok(RdfObject::Literal(Literal::new_simple_literal(value))),
            rio_api::model::Literal::LanguageTaggedString { value, language } => Ok(RdfObject::Literal(
                Literal::new_language_tagged_literal(value, language)?,
            )),
            rio_api::model::Literal::Typed { value, datatype } => Ok(RdfObject::Literal(
                Literal::new_typed_literal(value, NamedNode::new(datatype.iri)?),
            )),
        },
        #[allow(unreachable_patterns)]
        other => Err(RdfError::InvalidPosition {
            position: "object",
            term: other.to_string(),
        }),
    }
}
