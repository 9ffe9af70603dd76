//! Permission bits
//!
//! A security namespace defines named action bits. Users pass bits as
//! action names, decimal numbers or `0x` hex; this module maps them onto a
//! mask and renders allow/deny masks back as per-action states.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Permission bit errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    /// A textual token names no action
    #[error("unrecognized permission token \"{token}\"; valid names: {}", valid.join(", "))]
    Unrecognized { token: String, valid: Vec<String> },

    /// A numeric token does not fit in 64 bits
    #[error("permission bits {0} do not fit in 64 bits")]
    OutOfRange(String),

    /// A numeric token sets bits the namespace does not define
    #[error("permission bits {mask:#x} are not defined by this namespace")]
    UndefinedBits { mask: i64 },
}

/// One action defined by a namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Bit value
    pub bit: i64,
    /// Short name, e.g. `Read`
    pub name: String,
    /// Human-readable name
    #[serde(default)]
    pub display_name: String,
}

fn parse_numeric(token: &str) -> Result<Option<i64>, PermissionError> {
    let parsed = if let Some(hex) = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
    {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(None);
        }
        u64::from_str_radix(hex, 16)
    } else if !token.is_empty() && token.chars().all(|c| c.is_ascii_digit()) {
        token.parse::<u64>()
    } else {
        return Ok(None);
    };
    // Masks are signed on the wire; the top bit is a valid action bit
    parsed
        .map(|bits| Some(i64::from_ne_bytes(bits.to_ne_bytes())))
        .map_err(|_| PermissionError::OutOfRange(token.to_string()))
}

/// Union of the bits named by `tokens`
///
/// Tokens may also be comma-separated lists.
pub fn resolve_mask(tokens: &[String], actions: &[Action]) -> Result<i64, PermissionError> {
    let defined = actions.iter().fold(0i64, |acc, a| acc | a.bit);
    let mut mask = 0i64;
    for token in tokens.iter().flat_map(|t| t.split(',')) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if let Some(bits) = parse_numeric(token)? {
            let undefined = bits & !defined;
            if undefined != 0 {
                return Err(PermissionError::UndefinedBits { mask: undefined });
            }
            mask |= bits;
            continue;
        }
        let action = actions
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(token) || a.display_name.eq_ignore_ascii_case(token))
            .ok_or_else(|| PermissionError::Unrecognized {
                token: token.to_string(),
                valid: actions.iter().map(|a| a.name.clone()).collect(),
            })?;
        mask |= action.bit;
    }
    Ok(mask)
}

/// Effective state of one action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// Explicitly allowed
    Allow,
    /// Explicitly denied
    Deny,
    /// Allowed through an ancestor token or group
    InheritedAllow,
    /// Denied through an ancestor token or group
    InheritedDeny,
    /// Neither
    NotSet,
}

impl fmt::Display for PermissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Allow => "Allow",
            Self::Deny => "Deny",
            Self::InheritedAllow => "Allow (inherited)",
            Self::InheritedDeny => "Deny (inherited)",
            Self::NotSet => "Not set",
        })
    }
}

/// Allow/deny masks for one descriptor on one token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Masks {
    /// Explicit allow
    pub allow: i64,
    /// Explicit deny
    pub deny: i64,
    /// Effective allow, including inheritance
    pub effective_allow: i64,
    /// Effective deny, including inheritance
    pub effective_deny: i64,
}

/// A rendered row of the permission table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRow {
    /// The action
    pub action: Action,
    /// Its state
    pub state: PermissionState,
}

/// State of every action under the given masks, in namespace order
pub fn effective(actions: &[Action], masks: Masks) -> Vec<PermissionRow> {
    actions
        .iter()
        .map(|action| {
            let bit = action.bit;
            let state = if masks.deny & bit != 0 {
                PermissionState::Deny
            } else if masks.allow & bit != 0 {
                PermissionState::Allow
            } else if masks.effective_deny & bit != 0 {
                PermissionState::InheritedDeny
            } else if masks.effective_allow & bit != 0 {
                PermissionState::InheritedAllow
            } else {
                PermissionState::NotSet
            };
            PermissionRow {
                action: action.clone(),
                state,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actions() -> Vec<Action> {
        [(1, "Read", "View"), (2, "Write", "Contribute"), (4, "Delete", "Delete"), (8, "Admin", "Manage")]
            .into_iter()
            .map(|(bit, name, display)| Action {
                bit,
                name: name.into(),
                display_name: display.into(),
            })
            .collect()
    }

    fn tokens(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_names_decimal_and_hex() {
        let mask = resolve_mask(&tokens(&["Read", "0x4"]), &actions()).unwrap();
        assert_eq!(mask, 5);
        let mask = resolve_mask(&tokens(&["2,contribute", "8"]), &actions()).unwrap();
        assert_eq!(mask, 10);
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let err = resolve_mask(&tokens(&["Frobnicate"]), &actions()).unwrap_err();
        assert!(err.to_string().starts_with("unrecognized permission token \"Frobnicate\""));
    }

    #[test]
    fn test_undefined_numeric_bits_are_rejected() {
        let err = resolve_mask(&tokens(&["0x30"]), &actions()).unwrap_err();
        assert_eq!(err, PermissionError::UndefinedBits { mask: 0x30 });
    }

    #[test]
    fn test_full_width_hex_is_numeric() {
        let err = resolve_mask(&tokens(&["0xFFFFFFFFFFFFFFFF"]), &actions()).unwrap_err();
        assert_eq!(err, PermissionError::UndefinedBits { mask: !0xF });

        let top = vec![Action {
            bit: i64::MIN,
            name: "Top".into(),
            display_name: "Top".into(),
        }];
        assert_eq!(resolve_mask(&tokens(&["0x8000000000000000"]), &top).unwrap(), i64::MIN);
    }

    #[test]
    fn test_oversized_numbers_are_range_errors() {
        let err = resolve_mask(&tokens(&["0x1FFFFFFFFFFFFFFFF"]), &actions()).unwrap_err();
        assert_eq!(err, PermissionError::OutOfRange("0x1FFFFFFFFFFFFFFFF".into()));
        let err = resolve_mask(&tokens(&["99999999999999999999"]), &actions()).unwrap_err();
        assert!(err.to_string().contains("do not fit in 64 bits"));
    }

    #[test]
    fn test_effective_states() {
        let rows = effective(
            &actions(),
            Masks {
                allow: 1,
                deny: 4,
                effective_allow: 1 | 2,
                effective_deny: 4 | 8,
            },
        );
        let states: Vec<PermissionState> = rows.iter().map(|r| r.state).collect();
        assert_eq!(
            states,
            vec![
                PermissionState::Allow,
                PermissionState::InheritedAllow,
                PermissionState::Deny,
                PermissionState::InheritedDeny,
            ]
        );
    }
}
