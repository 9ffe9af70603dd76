//! Git API: repositories and pull requests.

use crate::client::error::Result;
use crate::client::types::{
    CreatePullRequest, CreateRepositoryRequest, Iteration, IterationChanges, ListResponse,
    PullRequest, PullRequestQuery, Repository, UpdatePullRequest,
};
use crate::client::{segment, AzdoClient, Host};
use crate::config::defaults::API_VERSION;

/// Git API client.
pub struct GitApi {
    client: AzdoClient,
}

impl GitApi {
    pub(crate) fn new(client: AzdoClient) -> Self {
        Self { client }
    }

    fn repo_path(project: &str, repository: &str) -> String {
        format!(
            "{}/_apis/git/repositories/{}",
            segment(project),
            segment(repository)
        )
    }

    /// List repositories of a project.
    pub async fn repositories(&self, project: &str) -> Result<Vec<Repository>> {
        let url = self.client.url(
            Host::Organization,
            &format!("{}/_apis/git/repositories", segment(project)),
        )?;
        let list: ListResponse<Repository> = self.client.get(url, API_VERSION).await?;
        Ok(list.value)
    }

    /// Get a repository by name or ID.
    pub async fn repository(&self, project: &str, repository: &str) -> Result<Repository> {
        let url = self
            .client
            .url(Host::Organization, &Self::repo_path(project, repository))?;
        self.client.get(url, API_VERSION).await
    }

    /// Create a repository (a fork when `parentRepository` is set).
    pub async fn create_repository(
        &self,
        project: &str,
        request: &CreateRepositoryRequest,
    ) -> Result<Repository> {
        let url = self.client.url(
            Host::Organization,
            &format!("{}/_apis/git/repositories", segment(project)),
        )?;
        self.client.post(url, API_VERSION, request).await
    }

    /// Delete a repository by ID.
    pub async fn delete_repository(&self, project: &str, id: &str) -> Result<()> {
        let url = self
            .client
            .url(Host::Organization, &Self::repo_path(project, id))?;
        self.client.delete(url, API_VERSION).await
    }

    /// Search pull requests of a repository.
    pub async fn pull_requests(
        &self,
        project: &str,
        repository: &str,
        query: &PullRequestQuery,
    ) -> Result<Vec<PullRequest>> {
        let url = self.client.url(
            Host::Organization,
            &format!("{}/pullrequests", Self::repo_path(project, repository)),
        )?;
        let mut params: Vec<(&str, String)> = vec![
            ("searchCriteria.status", query.status.clone()),
            ("$top", query.top.to_string()),
        ];
        if query.skip > 0 {
            params.push(("$skip", query.skip.to_string()));
        }
        if let Some(source) = &query.source_ref_name {
            params.push(("searchCriteria.sourceRefName", source.clone()));
        }
        if let Some(target) = &query.target_ref_name {
            params.push(("searchCriteria.targetRefName", target.clone()));
        }
        if let Some(creator) = &query.creator_id {
            params.push(("searchCriteria.creatorId", creator.clone()));
        }
        if let Some(reviewer) = &query.reviewer_id {
            params.push(("searchCriteria.reviewerId", reviewer.clone()));
        }
        let list: ListResponse<PullRequest> =
            self.client.get_with_query(url, API_VERSION, &params).await?;
        Ok(list.value)
    }

    /// Get a pull request by ID, in any repository of the organization.
    pub async fn pull_request(&self, id: u64) -> Result<PullRequest> {
        let url = self
            .client
            .url(Host::Organization, &format!("_apis/git/pullrequests/{id}"))?;
        self.client.get(url, API_VERSION).await
    }

    /// Open a pull request.
    pub async fn create_pull_request(
        &self,
        project: &str,
        repository: &str,
        request: &CreatePullRequest,
    ) -> Result<PullRequest> {
        let url = self.client.url(
            Host::Organization,
            &format!("{}/pullrequests", Self::repo_path(project, repository)),
        )?;
        self.client.post(url, API_VERSION, request).await
    }

    /// Update a pull request.
    pub async fn update_pull_request(
        &self,
        project: &str,
        repository: &str,
        id: u64,
        request: &UpdatePullRequest,
    ) -> Result<PullRequest> {
        let url = self.client.url(
            Host::Organization,
            &format!("{}/pullrequests/{id}", Self::repo_path(project, repository)),
        )?;
        self.client.patch(url, API_VERSION, request).await
    }

    /// Iterations of a pull request, oldest first.
    pub async fn iterations(&self, project: &str, repository: &str, id: u64) -> Result<Vec<Iteration>> {
        let url = self.client.url(
            Host::Organization,
            &format!(
                "{}/pullRequests/{id}/iterations",
                Self::repo_path(project, repository)
            ),
        )?;
        let list: ListResponse<Iteration> = self.client.get(url, API_VERSION).await?;
        Ok(list.value)
    }

    /// Files changed in an iteration.
    pub async fn iteration_changes(
        &self,
        project: &str,
        repository: &str,
        id: u64,
        iteration: u64,
    ) -> Result<IterationChanges> {
        let url = self.client.url(
            Host::Organization,
            &format!(
                "{}/pullRequests/{id}/iterations/{iteration}/changes",
                Self::repo_path(project, repository)
            ),
        )?;
        self.client.get(url, API_VERSION).await
    }
}
