//! Repository filters and first-match rule selection.
//!
//! A [`RepoFilter`] scopes a routing rule to a set of repositories. Filters
//! are consulted in declaration order by [`find_first`]; the first rule whose
//! filter applies wins, so specific rules must precede catch-alls. Rules are
//! not required to be mutually exclusive.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::identifiers::RepoCoordinates;

/// Repository scope of a routing rule.
///
/// - `repos` lists bare organisations (`org`, every repository in it) or
///   single repositories (`org/repo`). When empty the filter is a catch-all.
/// - `excluded_repos` lists `org/repo` entries carved out of the scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repos: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_repos: Vec<String>,
}

impl RepoFilter {
    /// Returns `true` if the filter lists no repositories and therefore
    /// applies to every repository not explicitly excluded.
    pub fn is_catch_all(&self) -> bool {
        self.repos.is_empty()
    }

    /// Returns `true` if the filter declares nothing at all.
    pub fn is_empty(&self) -> bool {
        self.repos.is_empty() && self.excluded_repos.is_empty()
    }

    /// Decides whether the filter applies to a repository.
    ///
    /// `full_name` is `owner/repo`; it is passed in so callers iterating over
    /// many filters format it once.
    pub fn can_apply(&self, owner: &str, full_name: &str) -> bool {
        if self.repos.iter().any(|r| r == full_name) {
            return true;
        }

        let in_scope = self.is_catch_all() || self.repos.iter().any(|r| r == owner);

        in_scope && !self.excluded_repos.iter().any(|r| r == full_name)
    }

    /// Convenience wrapper over [`RepoFilter::can_apply`].
    pub fn applies_to(&self, coordinates: &RepoCoordinates) -> bool {
        self.can_apply(&coordinates.owner, &coordinates.full_name())
    }

    /// Checks entry syntax and that every exclusion can take effect without
    /// contradicting an explicit listing.
    pub fn validate(&self, rule: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidRepoFilter {
            rule: rule.to_string(),
            reason,
        };

        for entry in &self.repos {
            if split_entry(entry).is_none() {
                return Err(invalid(format!(
                    "'{entry}' must be 'org' or 'org/repo'"
                )));
            }
        }

        for entry in &self.excluded_repos {
            let Some((org, Some(_))) = split_entry(entry) else {
                return Err(invalid(format!(
                    "excluded entry '{entry}' must be 'org/repo'"
                )));
            };

            if self.repos.iter().any(|r| r == entry) {
                return Err(invalid(format!(
                    "'{entry}' is both listed and excluded"
                )));
            }

            if !self.is_catch_all() && !self.repos.iter().any(|r| r == org) {
                return Err(invalid(format!(
                    "excluded entry '{entry}' has no matching org '{org}' in repos"
                )));
            }
        }

        Ok(())
    }
}

/// Splits `org` or `org/repo`, rejecting empty segments and deeper paths.
fn split_entry(entry: &str) -> Option<(&str, Option<&str>)> {
    match entry.split_once('/') {
        None if !entry.is_empty() => Some((entry, None)),
        Some((org, repo)) if !org.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Some((org, Some(repo)))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Rule matching
// ---------------------------------------------------------------------------

/// Anything carrying a [`RepoFilter`] that can take part in first-match
/// selection.
pub trait RepoScoped {
    /// The rule's repository scope.
    fn repo_filter(&self) -> &RepoFilter;
}

impl RepoScoped for RepoFilter {
    fn repo_filter(&self) -> &RepoFilter {
        self
    }
}

/// Returns the index of the first rule, in declaration order, whose filter
/// applies to `coordinates`, or `None` if no rule applies.
pub fn find_first<T: RepoScoped>(rules: &[T], coordinates: &RepoCoordinates) -> Option<usize> {
    let full_name = coordinates.full_name();

    rules
        .iter()
        .position(|rule| rule.repo_filter().can_apply(&coordinates.owner, &full_name))
}
