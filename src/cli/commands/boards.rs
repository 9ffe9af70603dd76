//! Boards command implementation
//!
//! Area and iteration trees are fetched to a fixed depth and printed as
//! flattened backslash-separated paths rooted at the project.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::exporter::{ExportArgs, Exporter};
use crate::cli::printer::FieldOpts;
use crate::client::api::StructureGroup;
use crate::client::types::ClassificationNode;

use super::project_scope;

const NODE_FIELDS: &[&str] = &["id", "identifier", "name", "path", "level", "startDate", "finishDate"];

/// Arguments for `azdo boards area list` and `azdo boards iteration list`
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Project, as [ORGANIZATION/]PROJECT; defaults to the current repository's project
    #[arg(value_name = "[ORGANIZATION/]PROJECT")]
    pub project: Option<String>,

    /// How many levels below the root to fetch
    #[arg(long, value_name = "N", default_value_t = 10)]
    pub depth: u32,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// A node with its full path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRow {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub name: String,
    pub path: String,
    pub level: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_date: Option<DateTime<Utc>>,
}

/// Depth-first rows for a tree, parents before children
pub fn flatten(root: &ClassificationNode) -> Vec<NodeRow> {
    let mut rows = Vec::new();
    visit(root, String::new(), 0, &mut rows);
    rows
}

fn visit(node: &ClassificationNode, parent: String, level: usize, rows: &mut Vec<NodeRow>) {
    let path = if parent.is_empty() {
        node.name.clone()
    } else {
        format!("{parent}\\{}", node.name)
    };
    let attributes = node.attributes.clone().unwrap_or_default();
    rows.push(NodeRow {
        id: node.id,
        identifier: node.identifier.clone(),
        name: node.name.clone(),
        path: path.clone(),
        level,
        start_date: attributes.start_date,
        finish_date: attributes.finish_date,
    });
    for child in &node.children {
        visit(child, path.clone(), level + 1, rows);
    }
}

fn date(value: Option<DateTime<Utc>>) -> String {
    value.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

async fn list(factory: Arc<Factory>, args: ListArgs, group: StructureGroup) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, NODE_FIELDS)?;
    let scope = project_scope(&factory, args.project.as_deref()).await?;
    let client = factory.client(&scope.organization)?;

    let root = client
        .work()
        .classification_nodes(&scope.project, group, args.depth)
        .await?;
    let rows = flatten(&root);

    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &rows);
    }

    let mut printer = factory.printer(Default::default());
    match group {
        StructureGroup::Areas => printer.add_columns(&["ID", "Path"]),
        StructureGroup::Iterations => printer.add_columns(&["ID", "Path", "Start", "Finish"]),
    }
    for row in &rows {
        printer.add_field(&row.id.to_string());
        printer.add_field_with(&row.path, FieldOpts::no_truncate());
        if group == StructureGroup::Iterations {
            printer.add_field(&date(row.start_date));
            printer.add_field(&date(row.finish_date));
        }
        printer.end_row();
    }
    printer.render()?;
    Ok(())
}

/// Execute `boards area list`
pub async fn area_list(factory: Arc<Factory>, args: ListArgs) -> Result<()> {
    list(factory, args, StructureGroup::Areas).await
}

/// Execute `boards iteration list`
pub async fn iteration_list(factory: Arc<Factory>, args: ListArgs) -> Result<()> {
    list(factory, args, StructureGroup::Iterations).await
}

/// `azdo boards`
pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::parent("boards", "Work with Azure Boards")
        .child(
            CommandNode::parent("area", "Manage area paths").child(
                CommandNode::leaf("list", "List the area paths of a project", factory, area_list)
                    .alias("ls")
                    .json_fields(NODE_FIELDS)
                    .example("azdo boards area list contoso/website --depth 2"),
            ),
        )
        .child(
            CommandNode::parent("iteration", "Manage iteration paths").child(
                CommandNode::leaf("list", "List the iteration paths of a project", factory, iteration_list)
                    .alias("ls")
                    .json_fields(NODE_FIELDS)
                    .example("azdo boards iteration list --json path,startDate"),
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::testing::Harness;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    fn tree() -> serde_json::Value {
        json!({
            "id": 1, "name": "myproj", "structureType": "iteration",
            "children": [
                {"id": 2, "name": "Sprint 1", "attributes": {
                    "startDate": "2024-01-01T00:00:00Z", "finishDate": "2024-01-14T00:00:00Z"}},
                {"id": 3, "name": "Release", "children": [{"id": 4, "name": "Sprint 2"}]}
            ]
        })
    }

    #[test]
    fn test_flatten_builds_paths() {
        let root: ClassificationNode = serde_json::from_value(tree()).unwrap();
        let paths: Vec<(String, usize)> = flatten(&root).into_iter().map(|r| (r.path, r.level)).collect();
        assert_eq!(
            paths,
            vec![
                ("myproj".to_string(), 0),
                ("myproj\\Sprint 1".to_string(), 1),
                ("myproj\\Release".to_string(), 1),
                ("myproj\\Release\\Sprint 2".to_string(), 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_iteration_list_table() {
        let h = Harness::start().await;
        Mock::given(method("GET"))
            .and(path("/contoso/myproj/_apis/wit/classificationnodes/Iterations"))
            .and(query_param("$depth", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(tree()))
            .mount(&h.server)
            .await;

        iteration_list(
            Arc::clone(&h.factory),
            ListArgs {
                project: Some("myproj".into()),
                depth: 10,
                export: ExportArgs::default(),
            },
        )
        .await
        .unwrap();
        let out = h.out();
        assert!(out.contains("2\tmyproj\\Sprint 1\t2024-01-01\t2024-01-14\n"));
        assert!(out.contains("4\tmyproj\\Release\\Sprint 2\t\t\n"));
    }
}
