//! Request and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::permissions::Action;

/// Standard `{count, value}` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    /// Number of items in `value`.
    #[serde(default)]
    pub count: usize,
    /// Items.
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Reference to a user or group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub unique_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<String>,
}

/// Reviewer with a vote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
    #[serde(flatten)]
    pub identity: IdentityRef,
    #[serde(default)]
    pub vote: i32,
    #[serde(default)]
    pub is_required: bool,
}

/// `connectionData` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionData {
    pub authenticated_user: AuthenticatedUser,
}

/// The user a token belongs to.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    pub id: String,
    #[serde(default)]
    pub descriptor: String,
    #[serde(default)]
    pub subject_descriptor: Option<String>,
    #[serde(default)]
    pub provider_display_name: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl AuthenticatedUser {
    /// Account (email) from the properties bag, if present.
    pub fn account(&self) -> Option<&str> {
        self.properties
            .get("Account")
            .and_then(|a| a.get("$value"))
            .and_then(|v| v.as_str())
    }
}

/// Identity as returned by the identities API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: String,
    pub descriptor: String,
    #[serde(default)]
    pub subject_descriptor: Option<String>,
    #[serde(default)]
    pub provider_display_name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Projects and operations
// ─────────────────────────────────────────────────────────────────────────────

/// Team project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub visibility: String,
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub last_update_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub url: String,
}

/// Project creation body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub visibility: String,
    pub capabilities: serde_json::Value,
}

/// Process template.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Handle on a long-running server operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationReference {
    pub id: String,
    #[serde(default)]
    pub status: OperationStatus,
    #[serde(default)]
    pub url: String,
}

/// Long-running operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub id: String,
    #[serde(default)]
    pub status: OperationStatus,
    #[serde(default)]
    pub result_message: Option<String>,
}

/// Operation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationStatus {
    #[default]
    NotSet,
    Queued,
    InProgress,
    Cancelled,
    Succeeded,
    Failed,
}

impl OperationStatus {
    /// Whether the operation has finished, successfully or not.
    pub fn is_final(self) -> bool {
        matches!(self, Self::Cancelled | Self::Succeeded | Self::Failed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Git
// ─────────────────────────────────────────────────────────────────────────────

/// Minimal project reference embedded in other objects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRef {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// Git repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub project: ProjectRef,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub remote_url: String,
    #[serde(default)]
    pub ssh_url: String,
    #[serde(default)]
    pub web_url: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default)]
    pub is_fork: bool,
    #[serde(default)]
    pub parent_repository: Option<Box<ParentRepository>>,
}

/// Fork parent as reported by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentRepository {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project: ProjectRef,
}

/// Repository creation body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRepositoryRequest {
    pub name: String,
    pub project: ProjectRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_repository: Option<ParentRepository>,
}

/// Pull request label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub name: String,
    #[serde(default = "active_default")]
    pub active: bool,
}

fn active_default() -> bool {
    true
}

/// Commit reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRef {
    pub commit_id: String,
}

/// Git pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub pull_request_id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source_ref_name: String,
    #[serde(default)]
    pub target_ref_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_by: IdentityRef,
    #[serde(default)]
    pub creation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub merge_status: Option<String>,
    #[serde(default)]
    pub labels: Option<Vec<Label>>,
    #[serde(default)]
    pub reviewers: Vec<Reviewer>,
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub last_merge_source_commit: Option<CommitRef>,
    #[serde(default)]
    pub url: String,
}

impl PullRequest {
    /// Active label names.
    pub fn label_names(&self) -> Vec<String> {
        self.labels
            .iter()
            .flatten()
            .filter(|l| l.active)
            .map(|l| l.name.clone())
            .collect()
    }
}

/// Pull request search criteria.
#[derive(Debug, Clone, Default)]
pub struct PullRequestQuery {
    pub status: String,
    pub source_ref_name: Option<String>,
    pub target_ref_name: Option<String>,
    pub creator_id: Option<String>,
    pub reviewer_id: Option<String>,
    pub top: usize,
    pub skip: usize,
}

/// Pull request creation body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePullRequest {
    pub source_ref_name: String,
    pub target_ref_name: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_draft: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reviewers: Vec<IdentityId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<LabelName>,
}

/// `{ "id": ... }` body fragment.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityId {
    pub id: String,
}

/// `{ "name": ... }` body fragment.
#[derive(Debug, Clone, Serialize)]
pub struct LabelName {
    pub name: String,
}

/// Completion options for merging.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_strategy: Option<String>,
    pub delete_source_branch: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_commit_message: Option<String>,
}

/// Pull request update body; unset fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePullRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_draft: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_ref_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_merge_source_commit: Option<CommitRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_options: Option<CompletionOptions>,
}

/// Pull request iteration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iteration {
    pub id: u64,
}

/// Changes of one iteration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationChanges {
    #[serde(default)]
    pub change_entries: Vec<ChangeEntry>,
}

/// One changed item.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    #[serde(default)]
    pub change_type: String,
    #[serde(default)]
    pub item: ChangeItem,
    #[serde(default)]
    pub original_path: Option<String>,
}

/// Path of a changed item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeItem {
    #[serde(default)]
    pub path: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Graph
// ─────────────────────────────────────────────────────────────────────────────

/// User or group in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSubject {
    #[serde(default)]
    pub subject_kind: String,
    pub descriptor: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub principal_name: Option<String>,
    #[serde(default)]
    pub mail_address: Option<String>,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub origin_id: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Graph storage-key to descriptor response.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphDescriptor {
    pub value: String,
}

/// Subject query body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectQuery {
    pub query: String,
    pub subject_kind: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_descriptor: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Security
// ─────────────────────────────────────────────────────────────────────────────

/// Security namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityNamespace {
    pub namespace_id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub separator_value: Option<String>,
    #[serde(default)]
    pub is_remotable: bool,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Inherited and effective masks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AceExtendedInfo {
    #[serde(default)]
    pub effective_allow: i64,
    #[serde(default)]
    pub effective_deny: i64,
    #[serde(default)]
    pub inherited_allow: i64,
    #[serde(default)]
    pub inherited_deny: i64,
}

/// Access control entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlEntry {
    pub descriptor: String,
    #[serde(default)]
    pub allow: i64,
    #[serde(default)]
    pub deny: i64,
    #[serde(default)]
    pub extended_info: Option<AceExtendedInfo>,
}

/// Access control list for one token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlList {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub inherit_permissions: bool,
    #[serde(default)]
    pub aces_dictionary: HashMap<String, AccessControlEntry>,
}

/// Body for setting ACEs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAccessControlEntries {
    pub token: String,
    pub merge: bool,
    pub access_control_entries: Vec<AccessControlEntry>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Service endpoints
// ─────────────────────────────────────────────────────────────────────────────

/// Service endpoint authorization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointAuthorization {
    pub scheme: String,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

/// Project sharing of a service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointProjectReference {
    pub project_reference: ProjectRef,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub is_ready: bool,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default)]
    pub authorization: Option<EndpointAuthorization>,
    #[serde(default)]
    pub data: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<IdentityRef>,
    #[serde(default)]
    pub service_endpoint_project_references: Vec<EndpointProjectReference>,
}

/// Result of a service endpoint proxy request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointProxyResult {
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Work tracking
// ─────────────────────────────────────────────────────────────────────────────

/// Area or iteration node.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationNode {
    pub id: u64,
    #[serde(default)]
    pub identifier: Option<String>,
    pub name: String,
    #[serde(default)]
    pub structure_type: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub attributes: Option<NodeAttributes>,
    #[serde(default)]
    pub children: Vec<ClassificationNode>,
}

/// Iteration dates.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAttributes {
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finish_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_request_tolerates_missing_fields() {
        let pr: PullRequest = serde_json::from_str(
            r#"{"pullRequestId": 7, "title": "t", "isDraft": true,
                "labels": [{"name": "bug"}, {"name": "old", "active": false}]}"#,
        )
        .unwrap();
        assert_eq!(pr.pull_request_id, 7);
        assert_eq!(pr.merge_status, None);
        assert_eq!(pr.label_names(), vec!["bug"]);
    }

    #[test]
    fn test_operation_status_is_camel_case() {
        let op: Operation =
            serde_json::from_str(r#"{"id": "1", "status": "inProgress"}"#).unwrap();
        assert_eq!(op.status, OperationStatus::InProgress);
        assert!(!op.status.is_final());
    }

    #[test]
    fn test_authenticated_user_account() {
        let data: ConnectionData = serde_json::from_str(
            r#"{"authenticatedUser": {"id": "u1", "descriptor": "d",
                "properties": {"Account": {"$type": "System.String", "$value": "me@contoso.com"}}}}"#,
        )
        .unwrap();
        assert_eq!(data.authenticated_user.account(), Some("me@contoso.com"));
    }
}
