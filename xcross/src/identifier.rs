//! Allow-list validation for values that end up inside image references
//! and container-side shell strings.

use crate::error::{Error, IdentifierKind};
use once_cell::sync::Lazy;
use regex::Regex;

static NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("name pattern must compile"));
static OPTIONAL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]*$").expect("optional name pattern must compile"));
static SERVER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.:-]*$").expect("server pattern must compile"));
static VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]*$").expect("version pattern must compile"));
static CPU: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.+-]+$").expect("cpu pattern must compile"));

impl IdentifierKind {
    fn pattern(self) -> &'static Regex {
        match self {
            IdentifierKind::Target | IdentifierKind::Repository => &*NAME,
            IdentifierKind::Username => &*OPTIONAL_NAME,
            IdentifierKind::Server => &*SERVER,
            IdentifierKind::ImageVersion => &*VERSION,
            IdentifierKind::Cpu => &*CPU,
        }
    }
}

/// Check `value` against the allow-list for `kind`.
pub fn validate(kind: IdentifierKind, value: &str) -> Result<(), Error> {
    if kind.pattern().is_match(value) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }
}

pub fn validate_target(target: &str) -> Result<(), Error> {
    validate(IdentifierKind::Target, target)
}

/// An empty username is valid and drops the namespace from the image reference.
pub fn validate_username(username: &str) -> Result<(), Error> {
    validate(IdentifierKind::Username, username)
}

pub fn validate_repository(repository: &str) -> Result<(), Error> {
    validate(IdentifierKind::Repository, repository)
}

pub fn validate_server(server: &str) -> Result<(), Error> {
    validate(IdentifierKind::Server, server)
}

pub fn validate_image_version(version: &str) -> Result<(), Error> {
    validate(IdentifierKind::ImageVersion, version)
}

pub fn validate_cpu(cpu: &str) -> Result<(), Error> {
    validate(IdentifierKind::Cpu, cpu)
}
