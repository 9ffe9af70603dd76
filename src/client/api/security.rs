//! Security API: namespaces, access control lists and entries.

use crate::client::error::Result;
use crate::client::types::{
    AccessControlEntry, AccessControlList, ListResponse, SecurityNamespace,
    SetAccessControlEntries,
};
use crate::client::{segment, AzdoClient, ClientError, Host};
use crate::config::defaults::API_VERSION;

/// Security API client.
pub struct SecurityApi {
    client: AzdoClient,
}

impl SecurityApi {
    pub(crate) fn new(client: AzdoClient) -> Self {
        Self { client }
    }

    /// All security namespaces.
    pub async fn namespaces(&self) -> Result<Vec<SecurityNamespace>> {
        let url = self
            .client
            .url(Host::Organization, "_apis/securitynamespaces")?;
        let list: ListResponse<SecurityNamespace> = self.client.get(url, API_VERSION).await?;
        Ok(list.value)
    }

    /// One namespace by ID.
    pub async fn namespace(&self, id: &str) -> Result<SecurityNamespace> {
        let url = self.client.url(
            Host::Organization,
            &format!("_apis/securitynamespaces/{}", segment(id)),
        )?;
        let list: ListResponse<SecurityNamespace> = self.client.get(url, API_VERSION).await?;
        list.value
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::NotFound(format!("security namespace {id} not found")))
    }

    /// Access control lists for a token and descriptor, with effective masks.
    pub async fn access_control_lists(
        &self,
        namespace: &str,
        token: &str,
        descriptor: &str,
    ) -> Result<Vec<AccessControlList>> {
        let url = self.client.url(
            Host::Organization,
            &format!("_apis/accesscontrollists/{}", segment(namespace)),
        )?;
        let query = [
            ("token", token),
            ("descriptors", descriptor),
            ("includeExtendedInfo", "true"),
        ];
        let list: ListResponse<AccessControlList> =
            self.client.get_with_query(url, API_VERSION, &query).await?;
        Ok(list.value)
    }

    /// Merge allow/deny bits into the entry for a descriptor.
    pub async fn set_entries(
        &self,
        namespace: &str,
        request: &SetAccessControlEntries,
    ) -> Result<Vec<AccessControlEntry>> {
        let url = self.client.url(
            Host::Organization,
            &format!("_apis/accesscontrolentries/{}", segment(namespace)),
        )?;
        let list: ListResponse<AccessControlEntry> =
            self.client.post(url, API_VERSION, request).await?;
        Ok(list.value)
    }

    /// Clear the given bits from both masks of a descriptor.
    pub async fn remove_permissions(
        &self,
        namespace: &str,
        bits: i64,
        token: &str,
        descriptor: &str,
    ) -> Result<AccessControlEntry> {
        let mut url = self.client.url(
            Host::Organization,
            &format!("_apis/permissions/{}/{bits}", segment(namespace)),
        )?;
        url.query_pairs_mut()
            .append_pair("token", token)
            .append_pair("descriptor", descriptor);
        self.client.delete_json(url, API_VERSION).await
    }
}
