//! Parameter description language
//!
//! Flow authors declare parameters in the free-text description of the
//! marker trigger, one per line:
//!
//! ```text
//! <name>: <type>[(<validation>)][?] - <human description>
//! ```
//!
//! `type` is `string`, `number` or `boolean` (any case). For numbers the
//! validation is an inclusive `min-max` range, for strings a `|`-separated
//! list of allowed values; booleans ignore it. A trailing `?` makes the
//! parameter optional. Any other line is prose and is skipped.

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use crate::protocol::InputSchema;

fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*(\w+)\s*:\s*(string|number|boolean)\s*(?:\(([^)]*)\))?\s*(\?)?\s*-\s*(.*?)\s*$")
            .unwrap()
    })
}

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(-?\d+(?:\.\d+)?)\s*-\s*(-?\d+(?:\.\d+)?)\s*$").unwrap()
    })
}

/// Type of a declared parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Number,
    Boolean,
}

impl ParamKind {
    fn parse(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

/// Type contract of one parameter, serialized as a JSON Schema property
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: ParamKind,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

/// Result of parsing a parameter description.
///
/// `order` lists every parameter line in source order and is the positional
/// order used when mapping named arguments to token slots. A name declared
/// twice keeps the last schema in `properties` but appears twice in `order`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSpec {
    pub properties: BTreeMap<String, PropertySchema>,
    pub required: Vec<String>,
    pub order: Vec<String>,
}

impl ParameterSpec {
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// JSON Schema object describing the parameters
    pub fn input_schema(&self) -> InputSchema {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .filter_map(|(name, schema)| {
                serde_json::to_value(schema).ok().map(|v| (name.clone(), v))
            })
            .collect();

        InputSchema {
            schema_type: "object".to_string(),
            properties,
            required: self.required.clone(),
        }
    }
}

/// Parse a free-text description into parameter specs
pub fn parse(description: Option<&str>) -> ParameterSpec {
    let mut spec = ParameterSpec::default();
    let Some(text) = description else {
        return spec;
    };

    for line in text.lines() {
        let Some(caps) = line_pattern().captures(line) else {
            continue;
        };

        let name = caps[1].to_string();
        let Some(kind) = ParamKind::parse(&caps[2]) else {
            continue;
        };
        let validation = caps.get(3).map(|m| m.as_str());
        let optional = caps.get(4).is_some();
        let human = caps[5].to_string();

        let mut schema = PropertySchema {
            kind,
            description: human,
            minimum: None,
            maximum: None,
            allowed: None,
        };

        match (kind, validation) {
            (ParamKind::Number, Some(v)) => {
                if let Some((min, max)) = parse_range(v) {
                    schema.minimum = Some(min);
                    schema.maximum = Some(max);
                }
            }
            (ParamKind::String, Some(v)) => {
                let values: Vec<String> = v
                    .split('|')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if !values.is_empty() {
                    schema.allowed = Some(values);
                }
            }
            _ => {}
        }

        if !optional {
            spec.required.push(name.clone());
        }
        spec.order.push(name.clone());
        spec.properties.insert(name, schema);
    }

    spec
}

/// Lines of the description that are not parameter declarations
pub fn prose(description: Option<&str>) -> String {
    description
        .unwrap_or_default()
        .lines()
        .filter(|line| !line_pattern().is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn parse_range(validation: &str) -> Option<(f64, f64)> {
    let caps = range_pattern().captures(validation)?;
    let min = caps[1].parse().ok()?;
    let max = caps[2].parse().ok()?;
    Some((min, max))
}
