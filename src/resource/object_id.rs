//! Every namespaced resource kdtool deals with is identified by its `namespace` and `name`.
//!
//! `ObjectId` owns its fields, `ObjectIdRef` borrows them, typically from a loaded resource or
//! from the command line arguments. Functions that only need to build a request path accept
//! `&ObjectIdRef`, and `(&str, &str)` tuples convert into one directly.
use lazy_static::lazy_static;
use regex::Regex;

use std::fmt::{self, Display};

lazy_static! {
    static ref NAME_REGEX: Regex =
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap();
}

const MAX_NAME_LENGTH: usize = 253;

/// A namespace or resource name that the api server would never accept. Such names are rejected
/// before they get anywhere near a request path.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidName(pub String);

impl Display for InvalidName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "'{}' is not a valid name (lowercase letters, digits, '-' and '.', starting and ending with a letter or digit)",
            self.0
        )
    }
}

impl std::error::Error for InvalidName {}

/// Checks that `name` is a DNS-1123 subdomain, which every name kdtool handles must be
pub fn validate_name(name: &str) -> Result<(), InvalidName> {
    if name.len() <= MAX_NAME_LENGTH && NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(InvalidName(name.to_owned()))
    }
}

/// An owned Object Id
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct ObjectId {
    pub namespace: String,
    pub name: String,
}

impl ObjectId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> ObjectId {
        ObjectId {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// return an `ObjectIdRef` that borrows its fields from this id
    pub fn as_id_ref(&self) -> ObjectIdRef<'_> {
        ObjectIdRef {
            namespace: &self.namespace,
            name: &self.name,
        }
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_str()
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.as_id_ref().fmt(f)
    }
}

/// An id that borrows its fields
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct ObjectIdRef<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
}

impl<'a> ObjectIdRef<'a> {
    pub fn new(namespace: &'a str, name: &'a str) -> ObjectIdRef<'a> {
        ObjectIdRef { namespace, name }
    }

    /// Like `new`, but fails unless both the namespace and the name are valid
    pub fn checked(namespace: &'a str, name: &'a str) -> Result<ObjectIdRef<'a>, InvalidName> {
        validate_name(namespace)?;
        validate_name(name)?;
        Ok(ObjectIdRef { namespace, name })
    }

    /// Create an owned `ObjectId` by copying the borrowed fields
    pub fn to_owned(&self) -> ObjectId {
        ObjectId::new(self.namespace, self.name)
    }

    pub fn namespace(&self) -> &'a str {
        self.namespace
    }

    pub fn name(&self) -> &'a str {
        self.name
    }
}

impl<'a> Display for ObjectIdRef<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl<'a> PartialEq<ObjectIdRef<'a>> for ObjectId {
    fn eq(&self, other: &ObjectIdRef<'a>) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }
}

impl<'a> From<&'a ObjectId> for ObjectIdRef<'a> {
    fn from(id: &'a ObjectId) -> ObjectIdRef<'a> {
        id.as_id_ref()
    }
}

impl<'a> From<(&'a str, &'a str)> for ObjectIdRef<'a> {
    fn from((namespace, name): (&'a str, &'a str)) -> ObjectIdRef<'a> {
        ObjectIdRef { namespace, name }
    }
}
