//! Step descriptors and parameter values.
//!
//! A [`StepDescriptor`] is the immutable, validated form of one workflow
//! step. Parameter values are either literals or references to an upstream
//! step's output; the YAML form accepts both a mapping and a `${steps.x.y}`
//! shorthand, which is parsed here once so the resolver never has to sniff
//! strings.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;

/// Shorthand for an output reference: `${steps.<id>.<output>}`.
static REFERENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$\{\s*steps\.([A-Za-z0-9_-]+)\.([A-Za-z0-9_.-]+)\s*\}$")
        .expect("REFERENCE_REGEX must compile")
});

/// A reference to a named output of another step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputReference {
    /// Id of the producing step.
    pub step: String,
    /// Output name declared by the producing step.
    pub output: String,
}

impl OutputReference {
    pub fn new(step: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            output: output.into(),
        }
    }
}

impl fmt::Display for OutputReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{steps.{}.{}}}", self.step, self.output)
    }
}

/// A literal parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Plain text (numbers are kept in their textual form).
    Text(String),
    /// On/off switch rendered as a bare flag.
    Switch(bool),
    /// Several values following one flag.
    List(Vec<String>),
}

/// A step parameter: a literal or the output of an upstream step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawParameter")]
pub enum ParameterValue {
    Literal(Literal),
    Reference(OutputReference),
}

impl ParameterValue {
    /// Create a text literal.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Literal(Literal::Text(value.into()))
    }

    /// Create a switch literal.
    pub fn switch(on: bool) -> Self {
        Self::Literal(Literal::Switch(on))
    }

    /// Create a list literal.
    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Literal(Literal::List(values.into_iter().map(Into::into).collect()))
    }

    /// Create a reference to `step`'s `output`.
    pub fn reference(step: impl Into<String>, output: impl Into<String>) -> Self {
        Self::Reference(OutputReference::new(step, output))
    }

    /// The reference, if this value is one.
    pub fn as_reference(&self) -> Option<&OutputReference> {
        match self {
            Self::Reference(r) => Some(r),
            Self::Literal(_) => None,
        }
    }

    /// The text, if this value is a text literal.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Literal(Literal::Text(s)) => Some(s),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Switch(bool),
    Number(serde_yaml::Number),
    Text(String),
}

impl RawScalar {
    // Floats keep a fractional part (`1.0` stays `1.0`); quote a number to
    // pass its exact spelling.
    fn into_text(self) -> String {
        match self {
            RawScalar::Switch(b) => b.to_string(),
            RawScalar::Number(n) => n.to_string(),
            RawScalar::Text(s) => s,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawParameter {
    Empty(()),
    Scalar(RawScalar),
    Reference(OutputReference),
    List(Vec<RawScalar>),
}

impl TryFrom<RawParameter> for ParameterValue {
    type Error = String;

    fn try_from(raw: RawParameter) -> std::result::Result<Self, Self::Error> {
        match raw {
            // `flag:` with no value is a bare flag
            RawParameter::Empty(()) => Ok(ParameterValue::switch(true)),
            RawParameter::Scalar(RawScalar::Switch(b)) => Ok(ParameterValue::switch(b)),
            RawParameter::Scalar(RawScalar::Text(s)) => parse_text(s),
            RawParameter::Scalar(other) => Ok(ParameterValue::text(other.into_text())),
            RawParameter::Reference(r) => Ok(ParameterValue::Reference(r)),
            RawParameter::List(items) => Ok(ParameterValue::Literal(Literal::List(
                items.into_iter().map(RawScalar::into_text).collect(),
            ))),
        }
    }
}

/// Parse a text parameter, recognising the reference shorthand.
///
/// `$${...}` yields the literal `${...}`. A reference embedded inside a
/// longer string is rejected: references must be the whole value.
pub fn parse_text(s: String) -> std::result::Result<ParameterValue, String> {
    if let Some(escaped) = s.strip_prefix("$${") {
        return Ok(ParameterValue::text(format!("${{{}", escaped)));
    }

    if let Some(caps) = REFERENCE_REGEX.captures(&s) {
        return Ok(ParameterValue::reference(&caps[1], &caps[2]));
    }

    if s.contains("${steps.") {
        return Err(format!(
            "'{}' embeds a step reference; a reference must be the entire value",
            s
        ));
    }

    Ok(ParameterValue::text(s))
}

/// Immutable description of one step, as used by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDescriptor {
    /// Unique id within the workflow.
    pub id: String,
    /// Display title (defaults to the id).
    pub title: String,
    /// Opaque component reference (path or command).
    pub component: String,
    /// Interpreter to launch the component with, if any.
    pub interpreter: Option<String>,
    /// Ids of the steps this one depends on, in declaration order.
    pub depends_on: Vec<String>,
    /// Parameters in declaration order.
    pub parameters: IndexMap<String, ParameterValue>,
    /// Output names the component emits at runtime.
    pub outputs: Vec<String>,
    /// Additional attempts after a failure.
    pub retry: u32,
    /// Per-step timeout override.
    pub timeout: Option<Duration>,
    /// Extra environment for the component.
    pub env: HashMap<String, String>,
}

impl StepDescriptor {
    /// Create a descriptor with no dependencies or parameters.
    pub fn new(id: impl Into<String>, component: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            component: component.into(),
            interpreter: None,
            depends_on: Vec::new(),
            parameters: IndexMap::new(),
            outputs: Vec::new(),
            retry: 0,
            timeout: None,
            env: HashMap::new(),
        }
    }

    /// Add dependencies.
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Add a parameter.
    pub fn parameter(mut self, name: impl Into<String>, value: ParameterValue) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Declare a runtime output.
    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    /// Set the retry count.
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// References this step makes to other steps' outputs.
    pub fn references(&self) -> impl Iterator<Item = &OutputReference> {
        self.parameters.values().filter_map(ParameterValue::as_reference)
    }

    /// Whether `name` is an output this step exposes.
    ///
    /// Text parameters are outputs by name; runtime outputs must be declared.
    pub fn exposes_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o == name)
            || self
                .parameters
                .get(name)
                .is_some_and(|v| v.as_text().is_some())
    }
}
