//! Graph API: users, groups and subjects.

use crate::client::error::Result;
use crate::client::types::{GraphDescriptor, GraphSubject, ListResponse, SubjectQuery};
use crate::client::{segment, AzdoClient, Host};
use crate::config::defaults::API_VERSION_PREVIEW;

/// Graph API client.
pub struct GraphApi {
    client: AzdoClient,
}

impl GraphApi {
    pub(crate) fn new(client: AzdoClient) -> Self {
        Self { client }
    }

    fn scope_query(scope: Option<&str>) -> Vec<(&'static str, String)> {
        scope
            .map(|s| vec![("scopeDescriptor", s.to_string())])
            .unwrap_or_default()
    }

    /// List users, optionally within a scope descriptor.
    pub async fn users(&self, scope: Option<&str>, limit: Option<usize>) -> Result<Vec<GraphSubject>> {
        let url = self.client.url(Host::Vssps, "_apis/graph/users")?;
        self.client
            .get_all(url, API_VERSION_PREVIEW, &Self::scope_query(scope), limit)
            .await
    }

    /// List groups, optionally within a scope descriptor.
    pub async fn groups(&self, scope: Option<&str>, limit: Option<usize>) -> Result<Vec<GraphSubject>> {
        let url = self.client.url(Host::Vssps, "_apis/graph/groups")?;
        self.client
            .get_all(url, API_VERSION_PREVIEW, &Self::scope_query(scope), limit)
            .await
    }

    /// Get a subject by descriptor.
    pub async fn subject(&self, descriptor: &str) -> Result<GraphSubject> {
        let url = self.client.url(
            Host::Vssps,
            &format!("_apis/graph/subjects/{}", segment(descriptor)),
        )?;
        self.client.get(url, API_VERSION_PREVIEW).await
    }

    /// Search users and groups by name or email.
    pub async fn query_subjects(&self, query: &str, scope: Option<&str>) -> Result<Vec<GraphSubject>> {
        let url = self.client.url(Host::Vssps, "_apis/graph/subjectquery")?;
        let body = SubjectQuery {
            query: query.to_string(),
            subject_kind: vec!["User".to_string(), "Group".to_string()],
            scope_descriptor: scope.map(str::to_string),
        };
        let list: ListResponse<GraphSubject> =
            self.client.post(url, API_VERSION_PREVIEW, &body).await?;
        Ok(list.value)
    }

    /// Graph descriptor of a storage key, such as a project ID.
    pub async fn descriptor(&self, storage_key: &str) -> Result<String> {
        let url = self.client.url(
            Host::Vssps,
            &format!("_apis/graph/descriptors/{}", segment(storage_key)),
        )?;
        let descriptor: GraphDescriptor = self.client.get(url, API_VERSION_PREVIEW).await?;
        Ok(descriptor.value)
    }
}
