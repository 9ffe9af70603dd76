//! Target and scope parsing
//!
//! Positional arguments name things as `[ORG/]PROJECT[/TARGET]`. Parsing is
//! pure: a [`ScopeRef`] keeps the organization optional so it formats back
//! to the exact input, and [`ScopeRef::resolve`] fills in the default
//! organization afterwards.

use std::fmt;
use thiserror::Error;
use url::Url;

use crate::config::urls;

/// Scope parsing and resolution errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// Wrong number of segments, or an empty segment
    #[error("\"{0}\" is not a valid repository name")]
    InvalidName(String),

    /// Subject targets need an explicit organization
    #[error("\"{0}\" is not a valid subject target; expected ORG/SUBJECT or ORG/PROJECT/SUBJECT")]
    InvalidSubject(String),

    /// No organization given and none configured
    #[error("no default organization; pass --organization, set AZDO_ORGANIZATION or run 'azdo auth login'")]
    NoDefaultOrganization,

    /// The organization is not configured
    #[error("organization \"{0}\" is not configured; run 'azdo auth login --organization {0}'")]
    UnknownOrganization(String),

    /// Fork parent lives in another organization
    #[error("cannot fork across organizations: \"{0}\" and \"{1}\"")]
    CrossOrganizationFork(String, String),
}

/// A parsed `[ORG/]PROJECT[/TARGET]` argument
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeRef {
    /// Organization, when given explicitly
    pub organization: Option<String>,
    /// Project name
    pub project: String,
    /// Command-specific target (repository, endpoint, subject...)
    pub target: Option<String>,
}

fn segments(input: &str) -> Result<Vec<String>, ScopeError> {
    let parts: Vec<String> = input.split('/').map(|s| s.trim().to_string()).collect();
    if parts.iter().any(String::is_empty) {
        return Err(ScopeError::InvalidName(input.to_string()));
    }
    Ok(parts)
}

impl ScopeRef {
    /// Parse `PROJECT`, `ORG/PROJECT` or `ORG/PROJECT/TARGET`
    pub fn parse(input: &str) -> Result<Self, ScopeError> {
        let mut parts = segments(input)?.into_iter();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(project), None, None, None) => Ok(Self {
                organization: None,
                project,
                target: None,
            }),
            (Some(org), Some(project), None, None) => Ok(Self {
                organization: Some(org),
                project,
                target: None,
            }),
            (Some(org), Some(project), Some(target), None) => Ok(Self {
                organization: Some(org),
                project,
                target: Some(target),
            }),
            _ => Err(ScopeError::InvalidName(input.to_string())),
        }
    }

    /// Parse `PROJECT/TARGET` or `ORG/PROJECT/TARGET`; the target is required
    pub fn parse_with_target(input: &str) -> Result<Self, ScopeError> {
        let parts = segments(input)?;
        match parts.as_slice() {
            [project, target] => Ok(Self {
                organization: None,
                project: project.clone(),
                target: Some(target.clone()),
            }),
            [org, project, target] => Ok(Self {
                organization: Some(org.clone()),
                project: project.clone(),
                target: Some(target.clone()),
            }),
            _ => Err(ScopeError::InvalidName(input.to_string())),
        }
    }

    /// Resolve the organization, using `default` when none was given
    pub fn resolve<F>(self, default: F) -> Result<Scope, ScopeError>
    where
        F: FnOnce() -> Result<String, ScopeError>,
    {
        let organization = match self.organization {
            Some(org) => org,
            None => default()?,
        };
        Ok(Scope {
            organization,
            project: self.project,
            target: self.target,
        })
    }
}

impl fmt::Display for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(org) = &self.organization {
            write!(f, "{org}/")?;
        }
        write!(f, "{}", self.project)?;
        if let Some(target) = &self.target {
            write!(f, "/{target}")?;
        }
        Ok(())
    }
}

/// A scope with its organization resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    /// Organization name
    pub organization: String,
    /// Project name
    pub project: String,
    /// Command-specific target
    pub target: Option<String>,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization, self.project)?;
        if let Some(target) = &self.target {
            write!(f, "/{target}")?;
        }
        Ok(())
    }
}

/// A fully qualified repository
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    /// Organization name
    pub organization: String,
    /// Project name
    pub project: String,
    /// Repository name
    pub repository: String,
}

impl RepoRef {
    /// Build from a resolved scope whose target names the repository
    pub fn from_scope(scope: Scope, input: &str) -> Result<Self, ScopeError> {
        let repository = scope
            .target
            .ok_or_else(|| ScopeError::InvalidName(input.to_string()))?;
        Ok(Self {
            organization: scope.organization,
            project: scope.project,
            repository,
        })
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.organization, self.project, self.repository)
    }
}

/// `ORG/SUBJECT` or `ORG/PROJECT/SUBJECT`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRef {
    /// Organization name
    pub organization: String,
    /// Project scope, if any
    pub project: Option<String>,
    /// Subject: `@me`, an email-like unique name, or a descriptor
    pub subject: String,
}

impl SubjectRef {
    /// Parse a subject target
    pub fn parse(input: &str) -> Result<Self, ScopeError> {
        let parts = segments(input).map_err(|_| ScopeError::InvalidSubject(input.to_string()))?;
        match parts.as_slice() {
            [org, subject] => Ok(Self {
                organization: org.clone(),
                project: None,
                subject: subject.clone(),
            }),
            [org, project, subject] => Ok(Self {
                organization: org.clone(),
                project: Some(project.clone()),
                subject: subject.clone(),
            }),
            _ => Err(ScopeError::InvalidSubject(input.to_string())),
        }
    }

    /// Whether the subject is the authenticated user
    pub fn is_me(&self) -> bool {
        self.subject == "@me"
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/", self.organization)?;
        if let Some(project) = &self.project {
            write!(f, "{project}/")?;
        }
        write!(f, "{}", self.subject)
    }
}

/// Fork parent and target must share an organization
pub fn ensure_same_organization(target: &str, parent: &str) -> Result<(), ScopeError> {
    if target.eq_ignore_ascii_case(parent) {
        Ok(())
    } else {
        Err(ScopeError::CrossOrganizationFork(
            target.to_string(),
            parent.to_string(),
        ))
    }
}

/// Organization name from a name or an organization URL
///
/// `https://dev.azure.com/contoso` and `https://contoso.visualstudio.com`
/// both yield `contoso`; anything that is not a URL is returned trimmed.
pub fn organization_name(value: &str) -> String {
    let value = value.trim().trim_end_matches('/');
    let Ok(url) = Url::parse(value) else {
        return value.to_string();
    };
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    if let Some(org) = host.strip_suffix(".visualstudio.com") {
        return org.to_string();
    }
    if host == urls::SERVICE_HOST || host == urls::VSSPS_HOST {
        if let Some(first) = url.path_segments().and_then(|mut s| s.next()) {
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    value.to_string()
}

/// Default organization in precedence order: flag, environment, config
pub fn default_organization(
    flag: Option<&str>,
    env: Option<&str>,
    configured: Option<&str>,
) -> Result<String, ScopeError> {
    flag.map(organization_name)
        .or_else(|| env.map(organization_name))
        .or_else(|| configured.map(str::to_string))
        .filter(|org| !org.is_empty())
        .ok_or(ScopeError::NoDefaultOrganization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_segment_counts() {
        let one = ScopeRef::parse("proj").unwrap();
        assert_eq!(one.organization, None);
        assert_eq!(one.project, "proj");

        let two = ScopeRef::parse("org/proj").unwrap();
        assert_eq!(two.organization.as_deref(), Some("org"));
        assert_eq!(two.target, None);

        let three = ScopeRef::parse("org/proj/repo").unwrap();
        assert_eq!(three.target.as_deref(), Some("repo"));
    }

    #[test]
    fn test_too_many_segments_quote_input() {
        let err = ScopeRef::parse("a/b/c/d").unwrap_err();
        assert_eq!(err.to_string(), "\"a/b/c/d\" is not a valid repository name");
        assert!(ScopeRef::parse("org//repo").is_err());
        assert!(ScopeRef::parse("").is_err());
    }

    #[test]
    fn test_parse_with_target_requires_two_or_three() {
        let two = ScopeRef::parse_with_target("proj/repo").unwrap();
        assert_eq!(two.organization, None);
        assert_eq!(two.target.as_deref(), Some("repo"));
        assert!(ScopeRef::parse_with_target("proj").is_err());
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        let scope = ScopeRef::parse(" org / proj ").unwrap();
        assert_eq!(scope.to_string(), "org/proj");
    }

    #[test]
    fn test_resolve_uses_default_only_when_missing() {
        let explicit = ScopeRef::parse("org/proj").unwrap();
        let scope = explicit.resolve(|| Err(ScopeError::NoDefaultOrganization)).unwrap();
        assert_eq!(scope.organization, "org");

        let implicit = ScopeRef::parse("proj").unwrap();
        assert_eq!(
            implicit.resolve(|| Err(ScopeError::NoDefaultOrganization)),
            Err(ScopeError::NoDefaultOrganization)
        );
    }

    #[test]
    fn test_cross_org_fork_message() {
        let err = ensure_same_organization("org1", "org2").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot fork across organizations: \"org1\" and \"org2\""
        );
        assert!(ensure_same_organization("Org1", "org1").is_ok());
    }

    #[test]
    fn test_subject_targets() {
        let s = SubjectRef::parse("org/@me").unwrap();
        assert!(s.is_me());
        assert_eq!(s.project, None);
        let s = SubjectRef::parse("org/proj/jane@contoso.com").unwrap();
        assert_eq!(s.project.as_deref(), Some("proj"));
        assert_eq!(s.to_string(), "org/proj/jane@contoso.com");
        assert!(SubjectRef::parse("jane@contoso.com").is_err());
    }

    #[test]
    fn test_organization_name_from_urls() {
        assert_eq!(organization_name("https://dev.azure.com/contoso/"), "contoso");
        assert_eq!(organization_name("https://contoso.visualstudio.com"), "contoso");
        assert_eq!(organization_name("contoso"), "contoso");
    }

    #[test]
    fn test_default_organization_precedence() {
        assert_eq!(
            default_organization(Some("flag"), Some("env"), Some("cfg")).unwrap(),
            "flag"
        );
        assert_eq!(
            default_organization(None, Some("https://dev.azure.com/env"), Some("cfg")).unwrap(),
            "env"
        );
        assert_eq!(default_organization(None, None, Some("cfg")).unwrap(), "cfg");
        assert_eq!(
            default_organization(None, None, None),
            Err(ScopeError::NoDefaultOrganization)
        );
    }

    fn segment() -> impl Strategy<Value = String> {
        "[A-Za-z0-9][A-Za-z0-9 ._-]{0,12}[A-Za-z0-9]"
    }

    proptest! {
        #[test]
        fn prop_canonical_scopes_round_trip(
            parts in prop::collection::vec(segment(), 1..=3)
        ) {
            let input = parts.join("/");
            let parsed = ScopeRef::parse(&input).unwrap();
            prop_assert_eq!(parsed.to_string(), input.clone());
            prop_assert_eq!(ScopeRef::parse(&input).unwrap(), parsed);
        }

        #[test]
        fn prop_four_or_more_segments_rejected(
            parts in prop::collection::vec(segment(), 4..=6)
        ) {
            let input = parts.join("/");
            prop_assert_eq!(
                ScopeRef::parse(&input),
                Err(ScopeError::InvalidName(input.clone()))
            );
        }
    }
}
