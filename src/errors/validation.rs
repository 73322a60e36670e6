use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use std::fmt;

use super::AppError;

/// A single validation problem, located by path (e.g. `["body", "name"]`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub loc: Vec<String>,
    pub msg: String,
}

impl ValidationIssue {
    pub fn new<I, S>(loc: I, msg: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            loc: loc.into_iter().map(Into::into).collect(),
            msg: msg.into(),
        }
    }

    /// Field the issue refers to: the element after the location root
    pub fn field(&self) -> &str {
        self.loc
            .get(1)
            .or_else(|| self.loc.first())
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Collected validation issues for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    issues: Vec<ValidationIssue>,
}

impl ValidationErrors {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn single<I, S>(loc: I, msg: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(vec![ValidationIssue::new(loc, msg)])
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Flatten into `/'field'/: msg, /'field'/: msg`
    pub fn message(&self) -> String {
        self.issues
            .iter()
            .map(|issue| format!("/'{}'/: {}", issue.field(), issue.msg))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Map a body decoding error onto a located issue.
    ///
    /// Field names are recovered from serde_json's message text, which only
    /// names the field for missing and unknown fields. Type and value errors
    /// (`"count": "x"`) carry no field, so they are located at `body` with
    /// serde's message kept as the issue text.
    pub fn from_json_error(err: &serde_json::Error) -> Self {
        let text = err.to_string();
        // Drop serde_json's " at line X column Y" suffix
        let text = match text.rsplit_once(" at line ") {
            Some((head, _)) => head.to_string(),
            None => text,
        };

        if err.is_syntax() || err.is_eof() {
            return Self::single(["body"], format!("invalid JSON: {}", text));
        }

        if let Some(field) = backticked(&text, "missing field ") {
            return Self::single(["body", field], "field required");
        }
        if let Some(field) = backticked(&text, "unknown field ") {
            return Self::single(["body", field], "extra fields not permitted");
        }

        Self::single(["body"], text)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ValidationErrors {}

fn backticked<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(prefix)?.strip_prefix('`')?;
    rest.split_once('`').map(|(name, _)| name)
}

/// Semantic checks run after a body decodes
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// JSON body extractor rejecting with a 400 validation envelope
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ValidationErrors::single(["body"], e.body_text()))?;

        let value: T =
            serde_json::from_slice(&bytes).map_err(|e| ValidationErrors::from_json_error(&e))?;
        value.validate()?;

        Ok(Self(value))
    }
}
