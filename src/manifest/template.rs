//! Environment substitution for hand-written manifest files.
//!
//! `$VAR` and `${VAR}` are replaced with the variable's value, and `${VAR:func}` with the
//! result of applying `func` to it. The only function is `b64encode`, for filling in secret
//! data. Referring to a variable that isn't set is an error, as is an unknown function.
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::Value;

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::io;
use std::path::Path;

lazy_static! {
    static ref VARIABLE_REGEX: Regex =
        Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_:]+)\}|([A-Za-z_][A-Za-z0-9_:]+))").unwrap();
}

pub type Environment = BTreeMap<String, String>;

#[derive(Debug)]
pub enum TemplateError {
    UndefinedVariable(String),
    UnknownFunction(String),
    Io(io::Error),
    Yaml(serde_yaml::Error),
}

impl From<io::Error> for TemplateError {
    fn from(err: io::Error) -> TemplateError {
        TemplateError::Io(err)
    }
}
impl From<serde_yaml::Error> for TemplateError {
    fn from(err: serde_yaml::Error) -> TemplateError {
        TemplateError::Yaml(err)
    }
}

impl Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TemplateError::UndefinedVariable(name) => write!(f, "${} not in environment.", name),
            TemplateError::UnknownFunction(name) => write!(f, "function {} unknown.", name),
            TemplateError::Io(e) => write!(f, "cannot read manifest: {}", e),
            TemplateError::Yaml(e) => write!(f, "invalid manifest: {}", e),
        }
    }
}

impl std::error::Error for TemplateError {}

/// A `TemplateError` along with the file it happened in
#[derive(Debug)]
pub struct ManifestFileError {
    pub path: String,
    pub error: TemplateError,
}

impl Display for ManifestFileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.error)
    }
}

impl std::error::Error for ManifestFileError {}

fn apply_function(name: &str, value: &str) -> Result<String, TemplateError> {
    match name {
        "b64encode" => Ok(base64::encode(value.as_bytes())),
        other => Err(TemplateError::UnknownFunction(other.to_owned())),
    }
}

fn expand(reference: &str, env: &Environment) -> Result<String, TemplateError> {
    let mut parts = reference.split(':');
    let name = parts.next().unwrap_or_default();
    let mut value = env
        .get(name)
        .cloned()
        .ok_or_else(|| TemplateError::UndefinedVariable(name.to_owned()))?;
    for function in parts {
        value = apply_function(function, value.as_str())?;
    }
    Ok(value)
}

/// Replaces every variable reference in `text`, stopping at the first one that can't be expanded
pub fn substitute(text: &str, env: &Environment) -> Result<String, TemplateError> {
    let mut result = String::with_capacity(text.len());
    let mut last = 0;
    for captures in VARIABLE_REGEX.captures_iter(text) {
        let whole = captures.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
        result.push_str(&text[last..whole.0]);
        result.push_str(expand(reference(&captures), env)?.as_str());
        last = whole.1;
    }
    result.push_str(&text[last..]);
    Ok(result)
}

fn reference<'t>(captures: &Captures<'t>) -> &'t str {
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default()
}

/// Parses every document in a (possibly multi-document) yaml string. Empty documents are skipped.
pub fn parse_documents(text: &str) -> Result<Vec<Value>, TemplateError> {
    let mut items = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document)?;
        if !value.is_null() {
            items.push(value);
        }
    }
    Ok(items)
}

/// Reads a manifest file, substitutes the environment into it, and parses the result
pub fn load_manifest_file(path: &Path, env: &Environment) -> Result<Vec<Value>, ManifestFileError> {
    let wrap = |error: TemplateError| ManifestFileError {
        path: path.display().to_string(),
        error,
    };
    let text = std::fs::read_to_string(path).map_err(|e| wrap(e.into()))?;
    let expanded = substitute(text.as_str(), env).map_err(wrap)?;
    log::debug!("Loaded manifest {}", path.display());
    parse_documents(expanded.as_str()).map_err(wrap)
}

#[cfg(test)]
mod test {
    use super::*;

    fn env() -> Environment {
        let mut env = Environment::new();
        env.insert("NAME".to_owned(), "myapp".to_owned());
        env.insert("IMAGE".to_owned(), "registry.example.com/myapp:3".to_owned());
        env.insert("SECRET_KEY".to_owned(), "hunter2".to_owned());
        env
    }

    #[test]
    fn both_reference_forms_are_substituted() {
        let out = substitute("name: $NAME\nimage: ${IMAGE}\ncost: 5$\n", &env()).unwrap();
        assert_eq!("name: myapp\nimage: registry.example.com/myapp:3\ncost: 5$\n", out);
    }

    #[test]
    fn b64encode_function_is_applied() {
        let out = substitute("SECRET_KEY: ${SECRET_KEY:b64encode}", &env()).unwrap();
        assert_eq!("SECRET_KEY: aHVudGVyMg==", out);
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let err = substitute("value: ${MISSING}", &env()).unwrap_err();
        assert_eq!("$MISSING not in environment.", err.to_string());
    }

    #[test]
    fn unknown_function_is_an_error() {
        let err = substitute("value: ${NAME:rot13}", &env()).unwrap_err();
        assert_eq!("function rot13 unknown.", err.to_string());
    }

    #[test]
    fn unterminated_brace_is_left_alone() {
        let out = substitute("value: ${NAME", &env()).unwrap();
        assert_eq!("value: ${NAME", out);
    }

    #[test]
    fn multiple_documents_are_parsed() {
        let text = "---\napiVersion: v1\nkind: Service\nmetadata:\n  name: myapp\n---\napiVersion: v1\nkind: Secret\nmetadata:\n  name: myapp\n";
        let docs = parse_documents(text).unwrap();
        assert_eq!(2, docs.len());
        assert_eq!("Service", docs[0]["kind"]);
        assert_eq!("Secret", docs[1]["kind"]);
    }
}
