//! Identities API.

use crate::client::error::Result;
use crate::client::types::{Identity, ListResponse};
use crate::client::{AzdoClient, Host};
use crate::config::defaults::API_VERSION;

/// Identities API client.
pub struct IdentitiesApi {
    client: AzdoClient,
}

impl IdentitiesApi {
    pub(crate) fn new(client: AzdoClient) -> Self {
        Self { client }
    }

    /// Identities for graph subject descriptors.
    pub async fn by_subject_descriptors(&self, descriptors: &[String]) -> Result<Vec<Identity>> {
        let url = self.client.url(Host::Vssps, "_apis/identities")?;
        let query = [
            ("subjectDescriptors", descriptors.join(",")),
            ("queryMembership", "None".to_string()),
        ];
        let list: ListResponse<Identity> =
            self.client.get_with_query(url, API_VERSION, &query).await?;
        Ok(list.value)
    }

    /// Identities for security descriptors.
    pub async fn by_descriptors(&self, descriptors: &[String]) -> Result<Vec<Identity>> {
        let url = self.client.url(Host::Vssps, "_apis/identities")?;
        let query = [
            ("descriptors", descriptors.join(",")),
            ("queryMembership", "None".to_string()),
        ];
        let list: ListResponse<Identity> =
            self.client.get_with_query(url, API_VERSION, &query).await?;
        Ok(list.value)
    }
}
