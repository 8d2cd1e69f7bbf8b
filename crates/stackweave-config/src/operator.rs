//! The static operator table and macro key recognition.

use serde_json::{Map, Value};

use crate::{EvaluationError, EvaluationResult};

/// Prefix marking a map key as a macro invocation.
pub const MACRO_PREFIX: &str = "TVLK::";

/// A macro operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    FromFile,
    FromFolder,
    FileAsBase64,
    MakefileAsBase64,
    GetConfig,
    Merge,
    MergeList,
    Concat,
    Select,
    If,
    Equals,
    Not,
    And,
    Or,
    StackResource,
    PublicIp,
    PrivateIp,
}

/// Every accepted operator name. Historical names map to the same operator.
const OPERATORS: &[(&str, Operator)] = &[
    ("FromFile", Operator::FromFile),
    ("FromFolder", Operator::FromFolder),
    ("FileAsBase64", Operator::FileAsBase64),
    ("Base64OfFile", Operator::FileAsBase64),
    ("MakefileAsBase64", Operator::MakefileAsBase64),
    ("Base64OfMakefileTarget", Operator::MakefileAsBase64),
    ("GetConfig", Operator::GetConfig),
    ("Config", Operator::GetConfig),
    ("Merge", Operator::Merge),
    ("MergeList", Operator::MergeList),
    ("Concat", Operator::Concat),
    ("Select", Operator::Select),
    ("If", Operator::If),
    ("Equals", Operator::Equals),
    ("Not", Operator::Not),
    ("And", Operator::And),
    ("Or", Operator::Or),
    ("AWSCFGetStackResource", Operator::StackResource),
    ("CFStackResource", Operator::StackResource),
    ("EC2PublicIp", Operator::PublicIp),
    ("EC2PrivateIp", Operator::PrivateIp),
];

impl Operator {
    /// Look up an operator by the name following [`MACRO_PREFIX`].
    pub fn from_name(name: &str) -> Option<Self> {
        OPERATORS
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, operator)| *operator)
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::FromFile => "FromFile",
            Operator::FromFolder => "FromFolder",
            Operator::FileAsBase64 => "FileAsBase64",
            Operator::MakefileAsBase64 => "MakefileAsBase64",
            Operator::GetConfig => "GetConfig",
            Operator::Merge => "Merge",
            Operator::MergeList => "MergeList",
            Operator::Concat => "Concat",
            Operator::Select => "Select",
            Operator::If => "If",
            Operator::Equals => "Equals",
            Operator::Not => "Not",
            Operator::And => "And",
            Operator::Or => "Or",
            Operator::StackResource => "AWSCFGetStackResource",
            Operator::PublicIp => "EC2PublicIp",
            Operator::PrivateIp => "EC2PrivateIp",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether any map inside `value` still carries a macro key.
pub fn contains_macro(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.keys().any(|key| key.starts_with(MACRO_PREFIX)) || map.values().any(contains_macro)
        }
        Value::Array(items) => items.iter().any(contains_macro),
        _ => false,
    }
}

/// Recognize a macro invocation.
///
/// Returns `None` for plain data maps. A macro key with siblings or an unknown
/// operator name is an error.
pub fn find_macro(map: &Map<String, Value>) -> EvaluationResult<Option<(Operator, &Value)>> {
    let Some((key, argument)) = map.iter().find(|(key, _)| key.starts_with(MACRO_PREFIX)) else {
        return Ok(None);
    };

    if map.len() > 1 {
        return Err(EvaluationError::AmbiguousMacro(key.clone()));
    }

    let name = &key[MACRO_PREFIX.len()..];
    let operator =
        Operator::from_name(name).ok_or_else(|| EvaluationError::UnknownMacro(name.to_string()))?;
    Ok(Some((operator, argument)))
}
