//! Graph command implementation
//!
//! Users and groups come from the identity service of the organization.

use anyhow::Result;
use clap::Args;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::exporter::{ExportArgs, Exporter};
use crate::cli::printer::{FieldOpts, OutputFormat};
use crate::client::types::GraphSubject;
use crate::client::AzdoClient;
use crate::error::CliError;

use super::OrgArgs;

const SUBJECT_FIELDS: &[&str] = &[
    "subjectKind",
    "descriptor",
    "displayName",
    "principalName",
    "mailAddress",
    "origin",
    "originId",
    "domain",
    "description",
];

/// Descriptor prefixes of graph subjects
const DESCRIPTOR_PREFIXES: &[&str] = &[
    "aad", "aadgp", "ad", "bnd", "cuid", "imp", "msa", "s2s", "svc", "unauth", "vss", "vssgp",
];

/// Arguments for `azdo graph user list`
#[derive(Args, Debug)]
pub struct UserListArgs {
    #[command(flatten)]
    pub org: OrgArgs,

    /// Maximum number of users to fetch
    #[arg(short = 'L', long, value_name = "N")]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments for `azdo graph group list`
#[derive(Args, Debug)]
pub struct GroupListArgs {
    /// Only list groups of this project, as [ORGANIZATION/]PROJECT
    #[arg(value_name = "[ORGANIZATION/]PROJECT", conflicts_with = "organization")]
    pub project: Option<String>,

    #[command(flatten)]
    pub org: OrgArgs,

    /// Maximum number of groups to fetch
    #[arg(short = 'L', long, value_name = "N")]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments for `azdo graph subject show`
#[derive(Args, Debug)]
pub struct SubjectShowArgs {
    /// Descriptor, email or display name of a user or group
    #[arg(value_name = "SUBJECT")]
    pub subject: String,

    #[command(flatten)]
    pub org: OrgArgs,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Whether `value` looks like a subject descriptor such as `aad.ZmQ5...`
pub fn is_descriptor(value: &str) -> bool {
    match value.split_once('.') {
        Some((prefix, rest)) => {
            !rest.is_empty() && !value.contains('@') && DESCRIPTOR_PREFIXES.contains(&prefix)
        }
        None => false,
    }
}

/// A subject by descriptor, or the first match of a search
pub async fn find_subject(client: &AzdoClient, subject: &str) -> Result<GraphSubject> {
    if is_descriptor(subject) {
        return match client.graph().subject(subject).await {
            Ok(found) => Ok(found),
            Err(e) if e.is_not_found() => Err(CliError::NotFound(format!("subject {subject} not found")).into()),
            Err(e) => Err(e.into()),
        };
    }
    let matches = client.graph().query_subjects(subject, None).await?;
    let exact = matches.iter().position(|s| {
        s.mail_address.as_deref().is_some_and(|m| m.eq_ignore_ascii_case(subject))
            || s.principal_name.as_deref().is_some_and(|p| p.eq_ignore_ascii_case(subject))
            || s.display_name.eq_ignore_ascii_case(subject)
    });
    let index = exact.unwrap_or(0);
    matches
        .into_iter()
        .nth(index)
        .ok_or_else(|| CliError::NotFound(format!("no user or group matches {subject:?}")).into())
}

fn print_subjects(factory: &Factory, subjects: &[GraphSubject]) -> Result<()> {
    let mut printer = factory.printer(OutputFormat::Table);
    printer.add_columns(&["Name", "Principal", "Origin", "Descriptor"]);
    for subject in subjects {
        printer.add_field(&subject.display_name);
        let principal = subject
            .principal_name
            .as_deref()
            .or(subject.mail_address.as_deref())
            .unwrap_or("");
        printer.add_field(principal);
        printer.add_field(&subject.origin);
        printer.add_field_with(&subject.descriptor, FieldOpts::no_truncate());
        printer.end_row();
    }
    printer.render()?;
    Ok(())
}

/// Execute `graph user list`
pub async fn user_list(factory: Arc<Factory>, args: UserListArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, SUBJECT_FIELDS)?;
    let organization = factory.organization(args.org.organization.as_deref())?;
    let client = factory.client(&organization)?;
    let users = client.graph().users(None, args.limit).await?;
    if users.is_empty() {
        return Err(CliError::NoResults(format!("no users found in {organization}")).into());
    }
    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &users);
    }
    print_subjects(&factory, &users)
}

/// Execute `graph group list`
pub async fn group_list(factory: Arc<Factory>, args: GroupListArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, SUBJECT_FIELDS)?;
    let (organization, project) = match &args.project {
        Some(input) => {
            let scope = factory.resolve_scope(input)?;
            if scope.target.is_some() {
                return Err(CliError::flag(format!("{input:?} is not a valid project reference")).into());
            }
            (scope.organization, Some(scope.project))
        }
        None => (factory.organization(args.org.organization.as_deref())?, None),
    };
    let client = factory.client(&organization)?;

    let scope_descriptor = match &project {
        Some(project) => {
            let project = client.core().project(project).await?;
            Some(client.graph().descriptor(&project.id).await?)
        }
        None => None,
    };
    let groups = client
        .graph()
        .groups(scope_descriptor.as_deref(), args.limit)
        .await?;
    if groups.is_empty() {
        return Err(CliError::NoResults("no groups found".to_string()).into());
    }
    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &groups);
    }
    print_subjects(&factory, &groups)
}

/// Execute `graph subject show`
pub async fn subject_show(factory: Arc<Factory>, args: SubjectShowArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, SUBJECT_FIELDS)?;
    let organization = factory.organization(args.org.organization.as_deref())?;
    let client = factory.client(&organization)?;
    let subject = find_subject(&client, &args.subject).await?;

    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &subject);
    }
    let mut printer = factory.printer(OutputFormat::List);
    printer.add_columns(&["Name", "Kind", "Principal", "Mail", "Origin", "Domain", "Descriptor"]);
    printer.add_field(&subject.display_name);
    printer.add_field(&subject.subject_kind);
    printer.add_field(subject.principal_name.as_deref().unwrap_or(""));
    printer.add_field(subject.mail_address.as_deref().unwrap_or(""));
    printer.add_field(&subject.origin);
    printer.add_field(subject.domain.as_deref().unwrap_or(""));
    printer.add_field_with(&subject.descriptor, FieldOpts::no_truncate());
    printer.end_row();
    printer.render()?;
    Ok(())
}

/// `azdo graph`
pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::parent("graph", "Query users and groups")
        .child(
            CommandNode::parent("user", "Work with users").child(
                CommandNode::leaf("list", "List the users of an organization", factory, user_list)
                    .alias("ls")
                    .json_fields(SUBJECT_FIELDS),
            ),
        )
        .child(
            CommandNode::parent("group", "Work with groups").child(
                CommandNode::leaf("list", "List the groups of an organization or project", factory, group_list)
                    .alias("ls")
                    .json_fields(SUBJECT_FIELDS)
                    .example("azdo graph group list contoso/website"),
            ),
        )
        .child(
            CommandNode::parent("subject", "Look up users and groups").child(
                CommandNode::leaf("show", "Show a user or group", factory, subject_show)
                    .json_fields(SUBJECT_FIELDS)
                    .example("azdo graph subject show mona@contoso.com")
                    .example("azdo graph subject show aad.ZmQ5ZjY3YjAtMjIyMi03NzQ0LWEzNWItMjk3YTk5MmE5ZGQ3"),
            ),
        )
}
