//! Work tracking API: area and iteration trees.

use crate::client::error::Result;
use crate::client::types::ClassificationNode;
use crate::client::{segment, AzdoClient, Host};
use crate::config::defaults::API_VERSION;

/// Which classification tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureGroup {
    /// Area paths
    Areas,
    /// Iteration paths
    Iterations,
}

impl StructureGroup {
    fn as_str(self) -> &'static str {
        match self {
            Self::Areas => "Areas",
            Self::Iterations => "Iterations",
        }
    }
}

/// Work tracking API client.
pub struct WorkApi {
    client: AzdoClient,
}

impl WorkApi {
    pub(crate) fn new(client: AzdoClient) -> Self {
        Self { client }
    }

    /// Root node of a tree, with children to `depth` levels.
    pub async fn classification_nodes(
        &self,
        project: &str,
        group: StructureGroup,
        depth: u32,
    ) -> Result<ClassificationNode> {
        let url = self.client.url(
            Host::Organization,
            &format!(
                "{}/_apis/wit/classificationnodes/{}",
                segment(project),
                group.as_str()
            ),
        )?;
        self.client
            .get_with_query(url, API_VERSION, &[("$depth", depth.to_string())])
            .await
    }
}
