//! SPARQL protocol client over HTTP

use super::{Bindings, EndpointError, EndpointResult, SparqlClient};
use crate::config::HttpSettings;
use crate::rdf::{self, RdfObject, RdfTerm, Triple};
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use sparesults::{QueryResultsFormat, QueryResultsParser, ReaderQueryResultsParserOutput};
use std::time::Duration;
use tracing::trace;

const SPARQL_QUERY: &str = "application/sparql-query";
const SPARQL_UPDATE: &str = "application/sparql-update";
const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";
const RDF_ACCEPT: &str = "application/n-triples, text/turtle;q=0.9";

/// Blocking SPARQL 1.1 protocol client
///
/// Queries and updates are sent as POST bodies, so no URL encoding is needed.
pub struct HttpSparqlClient {
    client: Client,
    uri: String,
    update_uri: String,
}

impl HttpSparqlClient {
    pub fn new(uri: impl Into<String>, settings: &HttpSettings) -> EndpointResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| EndpointError::Http(e.to_string()))?;
        let uri = uri.into();
        Ok(Self {
            client,
            update_uri: uri.clone(),
            uri,
        })
    }

    /// Send updates to a different URI than queries
    pub fn with_update_uri(mut self, update_uri: impl Into<String>) -> Self {
        self.update_uri = update_uri.into();
        self
    }

    fn post(&self, uri: &str, content_type: &str, accept: &str, body: &str) -> EndpointResult<Response> {
        trace!("POST {}: {}", uri, body);
        let resp = self
            .client
            .post(uri)
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, accept)
            .body(body.to_string())
            .send()
            .map_err(|e| EndpointError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().unwrap_or_default();
            return Err(EndpointError::Status {
                uri: uri.to_string(),
                status,
                body,
            });
        }
        Ok(resp)
    }
}

impl SparqlClient for HttpSparqlClient {
    fn endpoint_uri(&self) -> &str {
        &self.uri
    }

    fn select(&self, query: &str) -> EndpointResult<Vec<Bindings>> {
        let resp = self.post(&self.uri, SPARQL_QUERY, SPARQL_RESULTS_JSON, query)?;
        let body = resp.bytes().map_err(|e| EndpointError::Http(e.to_string()))?;
        parse_json_results(&body)
    }

    fn construct(&self, query: &str) -> EndpointResult<Vec<Triple>> {
        let resp = self.post(&self.uri, SPARQL_QUERY, RDF_ACCEPT, query)?;
        let is_turtle = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("turtle"));
        let text = resp.text().map_err(|e| EndpointError::Http(e.to_string()))?;
        let triples = if is_turtle {
            rdf::parse_turtle(&text)?
        } else {
            rdf::parse_ntriples(&text)?
        };
        Ok(triples)
    }

    fn update(&self, update: &str) -> EndpointResult<()> {
        self.post(&self.update_uri, SPARQL_UPDATE, "*/*", update)?;
        Ok(())
    }
}

/// Decode an `application/sparql-results+json` document into rows
pub(crate) fn parse_json_results(body: &[u8]) -> EndpointResult<Vec<Bindings>> {
    let parsed = QueryResultsParser::from_format(QueryResultsFormat::Json)
        .for_reader(body)
        .map_err(|e| EndpointError::Parse(e.to_string()))?;
    match parsed {
        ReaderQueryResultsParserOutput::Solutions(solutions) => solutions
            .map(|solution| {
                let solution = solution.map_err(|e| EndpointError::Parse(e.to_string()))?;
                solution
                    .iter()
                    .map(|(var, term)| {
                        let term = RdfTerm::from(RdfObject::try_from(term.clone())?);
                        Ok((var.as_str().to_string(), term))
                    })
                    .collect::<EndpointResult<Bindings>>()
            })
            .collect(),
        ReaderQueryResultsParserOutput::Boolean(_) => Err(EndpointError::UnexpectedResults(
            "response has no result set".to_string(),
        )),
    }
}
