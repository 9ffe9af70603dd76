//! Client-side pull request filters
//!
//! The service filters by status, branches and creator; draft state, labels
//! and merge status are filtered locally. Every filter is conjunctive.

/// Properties of a pull request that local filters inspect
#[derive(Debug, Clone, Copy)]
pub struct PrFacts<'a> {
    /// Draft flag
    pub is_draft: bool,
    /// Label names
    pub labels: &'a [String],
    /// Merge status as reported by the service, if computed
    pub merge_status: Option<&'a str>,
}

/// Local filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrFilter {
    /// Keep only drafts
    pub draft_only: bool,
    /// Labels that must all be present
    pub labels: Vec<String>,
    /// Required merge status
    pub merge_status: Option<String>,
}

impl PrFilter {
    /// Whether any local filter is active
    pub fn is_active(&self) -> bool {
        self.draft_only || !self.labels.is_empty() || self.merge_status.is_some()
    }

    /// Whether a pull request passes every filter
    pub fn matches(&self, pr: PrFacts<'_>) -> bool {
        if self.draft_only && !pr.is_draft {
            return false;
        }
        if let Some(wanted) = &self.merge_status {
            if !pr.merge_status.is_some_and(|s| s.eq_ignore_ascii_case(wanted)) {
                return false;
            }
        }
        self.labels
            .iter()
            .all(|wanted| pr.labels.iter().any(|l| l.eq_ignore_ascii_case(wanted)))
    }
}

/// Merge status values accepted by `--mergestate`
pub const MERGE_STATUSES: &[&str] = &[
    "notSet",
    "queued",
    "conflicts",
    "succeeded",
    "rejectedByPolicy",
    "failure",
];

/// Merge status as shown in tables
pub fn display_merge_status(status: Option<&str>) -> &str {
    match status {
        Some(s) if !s.is_empty() => s,
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_filters_match_everything() {
        let filter = PrFilter::default();
        assert!(!filter.is_active());
        assert!(filter.matches(PrFacts {
            is_draft: false,
            labels: &[],
            merge_status: None
        }));
    }

    #[test]
    fn test_all_filters_are_conjunctive() {
        let filter = PrFilter {
            draft_only: true,
            labels: labels(&["bug", "p1"]),
            merge_status: Some("succeeded".into()),
        };
        let all = labels(&["Bug", "p1", "ui"]);
        let one = labels(&["bug"]);
        assert!(filter.matches(PrFacts {
            is_draft: true,
            labels: &all,
            merge_status: Some("succeeded")
        }));
        assert!(!filter.matches(PrFacts {
            is_draft: false,
            labels: &all,
            merge_status: Some("succeeded")
        }));
        assert!(!filter.matches(PrFacts {
            is_draft: true,
            labels: &one,
            merge_status: Some("succeeded")
        }));
        assert!(!filter.matches(PrFacts {
            is_draft: true,
            labels: &all,
            merge_status: None
        }));
    }

    #[test]
    fn test_missing_merge_status_displays_unknown() {
        assert_eq!(display_merge_status(None), "unknown");
        assert_eq!(display_merge_status(Some("")), "unknown");
        assert_eq!(display_merge_status(Some("conflicts")), "conflicts");
    }
}
