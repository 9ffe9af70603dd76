//! Security command implementation
//!
//! Permissions are read and written per security namespace, token and
//! identity descriptor. Every mutation renders the effective permission
//! table of the subject afterwards.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::sync::Arc;

use crate::cli::command::CommandNode;
use crate::cli::context::Factory;
use crate::cli::exporter::{ExportArgs, Exporter};
use crate::cli::output::{self, ColorScheme};
use crate::cli::printer::{FieldOpts, OutputFormat};
use crate::client::types::{AccessControlEntry, SecurityNamespace, SetAccessControlEntries};
use crate::client::AzdoClient;
use crate::core::permissions::{self, Masks, PermissionRow};
use crate::core::scope::SubjectRef;
use crate::error::CliError;

use super::graph::{find_subject, is_descriptor};
use super::YesArgs;

const NAMESPACE_FIELDS: &[&str] = &[
    "namespaceId",
    "name",
    "displayName",
    "separatorValue",
    "isRemotable",
    "actions",
];

const PERMISSION_FIELDS: &[&str] = &["bit", "name", "displayName", "state"];

/// Arguments for `azdo security namespace list`
#[derive(Args, Debug)]
pub struct NamespaceListArgs {
    #[command(flatten)]
    pub org: super::OrgArgs,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments for `azdo security namespace show`
#[derive(Args, Debug)]
pub struct NamespaceShowArgs {
    /// Namespace ID
    #[arg(value_name = "ID")]
    pub id: String,

    #[command(flatten)]
    pub org: super::OrgArgs,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Target of a permission command
#[derive(Args, Debug, Clone)]
pub struct PermissionTarget {
    /// Subject, as ORGANIZATION/SUBJECT or ORGANIZATION/PROJECT/SUBJECT
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Security namespace ID
    #[arg(long, value_name = "UUID")]
    pub namespace_id: String,

    /// Security token of the resource
    #[arg(long, value_name = "TOKEN")]
    pub token: String,
}

/// Arguments for `azdo security permission show`
#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub target: PermissionTarget,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments for `azdo security permission update`
#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub target: PermissionTarget,

    /// Permission bit to allow: action name, decimal or 0x hex
    #[arg(long = "allow-bit", value_name = "BIT")]
    pub allow: Vec<String>,

    /// Permission bit to deny: action name, decimal or 0x hex
    #[arg(long = "deny-bit", value_name = "BIT")]
    pub deny: Vec<String>,

    #[command(flatten)]
    pub yes: YesArgs,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// Arguments for `azdo security permission reset`
#[derive(Args, Debug)]
pub struct ResetArgs {
    #[command(flatten)]
    pub target: PermissionTarget,

    /// Permission bit to reset; all bits when omitted
    #[arg(long = "bit", value_name = "BIT")]
    pub bits: Vec<String>,

    #[command(flatten)]
    pub yes: YesArgs,

    #[command(flatten)]
    pub export: ExportArgs,
}

/// One row of the permission table
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct PermissionView {
    bit: i64,
    name: String,
    display_name: String,
    state: String,
}

impl From<&PermissionRow> for PermissionView {
    fn from(row: &PermissionRow) -> Self {
        Self {
            bit: row.action.bit,
            name: row.action.name.clone(),
            display_name: row.action.display_name.clone(),
            state: row.state.to_string(),
        }
    }
}

/// A resolved subject and the identity descriptor ACLs are keyed by
struct Resolved {
    name: String,
    descriptor: String,
}

async fn identity_descriptor(client: &AzdoClient, subject_descriptor: &str) -> Result<String> {
    client
        .identities()
        .by_subject_descriptors(&[subject_descriptor.to_string()])
        .await?
        .into_iter()
        .next()
        .map(|identity| identity.descriptor)
        .ok_or_else(|| CliError::NotFound(format!("no identity found for {subject_descriptor}")).into())
}

async fn resolve_subject(client: &AzdoClient, target: &SubjectRef) -> Result<Resolved> {
    if target.is_me() {
        let user = client.core().connection_data().await?.authenticated_user;
        return Ok(Resolved {
            name: user.provider_display_name,
            descriptor: user.descriptor,
        });
    }
    let (name, subject_descriptor) = if is_descriptor(&target.subject) {
        (target.subject.clone(), target.subject.clone())
    } else if let Some(project) = &target.project {
        let project = client.core().project(project).await?;
        let scope = client.graph().descriptor(&project.id).await?;
        let subject = client
            .graph()
            .query_subjects(&target.subject, Some(&scope))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                CliError::NotFound(format!("no user or group matches {:?} in {}", target.subject, project.name))
            })?;
        (subject.display_name, subject.descriptor)
    } else {
        let subject = find_subject(client, &target.subject).await?;
        (subject.display_name, subject.descriptor)
    };
    Ok(Resolved {
        name,
        descriptor: identity_descriptor(client, &subject_descriptor).await?,
    })
}

struct Context {
    client: AzdoClient,
    namespace: SecurityNamespace,
    subject: Resolved,
    token: String,
}

async fn context(factory: &Factory, target: &PermissionTarget) -> Result<Context> {
    let subject_ref = SubjectRef::parse(&target.target)?;
    let client = factory.client(&subject_ref.organization)?;
    let subject = resolve_subject(&client, &subject_ref).await?;
    let namespace = match client.security().namespace(&target.namespace_id).await {
        Ok(namespace) => namespace,
        Err(e) if e.is_not_found() => {
            return Err(CliError::NotFound(format!(
                "security namespace {} not found",
                target.namespace_id
            ))
            .into())
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Context {
        client,
        namespace,
        subject,
        token: target.token.clone(),
    })
}

async fn current_masks(ctx: &Context) -> Result<Masks> {
    let acls = ctx
        .client
        .security()
        .access_control_lists(&ctx.namespace.namespace_id, &ctx.token, &ctx.subject.descriptor)
        .await?;
    let entry = acls
        .into_iter()
        .flat_map(|acl| acl.aces_dictionary.into_values())
        .find(|ace| ace.descriptor.eq_ignore_ascii_case(&ctx.subject.descriptor));
    Ok(entry
        .map(|ace| {
            let info = ace.extended_info.unwrap_or_default();
            Masks {
                allow: ace.allow,
                deny: ace.deny,
                effective_allow: info.effective_allow | info.inherited_allow,
                effective_deny: info.effective_deny | info.inherited_deny,
            }
        })
        .unwrap_or_default())
}

async fn render(factory: &Factory, ctx: &Context, exporter: Option<Exporter>) -> Result<()> {
    let masks = current_masks(ctx).await?;
    let rows = permissions::effective(&ctx.namespace.actions, masks);
    if let Some(exporter) = exporter {
        let views: Vec<PermissionView> = rows.iter().map(PermissionView::from).collect();
        return exporter.write(factory.io(), &views);
    }
    let cs = ColorScheme::new(factory.io());
    let mut printer = factory.printer(OutputFormat::Table);
    printer.add_columns(&["Bit", "Name", "Permission", "State"]);
    for row in &rows {
        printer.add_field(&format!("{:#x}", row.action.bit));
        printer.add_field(&row.action.name);
        printer.add_field(&row.action.display_name);
        let state = row.state.to_string();
        let state = match row.state {
            permissions::PermissionState::Allow => cs.green(&state),
            permissions::PermissionState::Deny => cs.red(&state),
            _ => state,
        };
        printer.add_field_with(&state, FieldOpts::no_truncate());
        printer.end_row();
    }
    printer.render()?;
    Ok(())
}

/// Execute `security namespace list`
pub async fn namespace_list(factory: Arc<Factory>, args: NamespaceListArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, NAMESPACE_FIELDS)?;
    let organization = factory.organization(args.org.organization.as_deref())?;
    let client = factory.client(&organization)?;
    let mut namespaces = client.security().namespaces().await?;
    namespaces.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &namespaces);
    }
    let mut printer = factory.printer(OutputFormat::Table);
    printer.add_columns(&["ID", "Name", "Actions"]);
    for namespace in &namespaces {
        printer.add_field_with(&namespace.namespace_id, FieldOpts::no_truncate());
        printer.add_field(&namespace.name);
        printer.add_field(&namespace.actions.len().to_string());
        printer.end_row();
    }
    printer.render()?;
    Ok(())
}

/// Execute `security namespace show`
pub async fn namespace_show(factory: Arc<Factory>, args: NamespaceShowArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, NAMESPACE_FIELDS)?;
    let organization = factory.organization(args.org.organization.as_deref())?;
    let client = factory.client(&organization)?;
    let namespace = client.security().namespace(&args.id).await.map_err(|e| {
        if e.is_not_found() {
            anyhow::Error::from(CliError::NotFound(format!("security namespace {} not found", args.id)))
        } else {
            e.into()
        }
    })?;

    if let Some(exporter) = exporter {
        return exporter.write(factory.io(), &namespace);
    }
    let cs = ColorScheme::new(factory.io());
    {
        let mut out = factory.io().out();
        writeln!(out, "{} ({})", cs.bold(&namespace.name), namespace.namespace_id)?;
        if !namespace.display_name.is_empty() && namespace.display_name != namespace.name {
            writeln!(out, "{}", namespace.display_name)?;
        }
        writeln!(out)?;
    }

    let mut printer = factory.printer(OutputFormat::Table);
    printer.add_columns(&["Bit", "Name", "Display Name"]);
    for action in &namespace.actions {
        printer.add_field(&format!("{:#x}", action.bit));
        printer.add_field(&action.name);
        printer.add_field(&action.display_name);
        printer.end_row();
    }
    printer.render()?;
    Ok(())
}

/// Execute `security permission show`
pub async fn show(factory: Arc<Factory>, args: ShowArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, PERMISSION_FIELDS)?;
    let ctx = context(&factory, &args.target).await?;
    render(&factory, &ctx, exporter).await
}

/// Execute `security permission update`
pub async fn update(factory: Arc<Factory>, args: UpdateArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, PERMISSION_FIELDS)?;
    if args.allow.is_empty() && args.deny.is_empty() {
        return Err(CliError::flag("specify at least one --allow-bit or --deny-bit").into());
    }
    let ctx = context(&factory, &args.target).await?;
    let allow = permissions::resolve_mask(&args.allow, &ctx.namespace.actions)?;
    let deny = permissions::resolve_mask(&args.deny, &ctx.namespace.actions)?;
    if allow & deny != 0 {
        return Err(CliError::flag(format!(
            "bits {:#x} cannot be both allowed and denied",
            allow & deny
        ))
        .into());
    }

    factory
        .confirm(
            args.yes.yes,
            &format!("Update permissions of {} on {}?", ctx.subject.name, ctx.token),
        )
        .await?;

    let request = SetAccessControlEntries {
        token: ctx.token.clone(),
        merge: true,
        access_control_entries: vec![AccessControlEntry {
            descriptor: ctx.subject.descriptor.clone(),
            allow,
            deny,
            extended_info: None,
        }],
    };
    ctx.client
        .security()
        .set_entries(&ctx.namespace.namespace_id, &request)
        .await?;
    output::success(
        factory.io(),
        &format!("Updated permissions of {} on {}", ctx.subject.name, ctx.token),
    );
    render(&factory, &ctx, exporter).await
}

/// Execute `security permission reset`
pub async fn reset(factory: Arc<Factory>, args: ResetArgs) -> Result<()> {
    let exporter = Exporter::from_args(&args.export, PERMISSION_FIELDS)?;
    let ctx = context(&factory, &args.target).await?;
    let bits = if args.bits.is_empty() {
        ctx.namespace.actions.iter().fold(0, |acc, a| acc | a.bit)
    } else {
        permissions::resolve_mask(&args.bits, &ctx.namespace.actions)?
    };
    if bits == 0 {
        return Err(CliError::flag("no permission bits to reset").into());
    }

    factory
        .confirm(
            args.yes.yes,
            &format!("Reset permissions of {} on {}?", ctx.subject.name, ctx.token),
        )
        .await?;

    ctx.client
        .security()
        .remove_permissions(&ctx.namespace.namespace_id, bits, &ctx.token, &ctx.subject.descriptor)
        .await?;
    output::success(
        factory.io(),
        &format!("Reset permissions of {} on {}", ctx.subject.name, ctx.token),
    );
    render(&factory, &ctx, exporter).await
}

/// `azdo security`
pub fn command(factory: &Arc<Factory>) -> CommandNode {
    CommandNode::parent("security", "Manage security namespaces and permissions")
        .child(
            CommandNode::parent("namespace", "Inspect security namespaces")
                .child(
                    CommandNode::leaf("list", "List security namespaces", factory, namespace_list)
                        .alias("ls")
                        .json_fields(NAMESPACE_FIELDS),
                )
                .child(
                    CommandNode::leaf("show", "Show the actions of a security namespace", factory, namespace_show)
                        .json_fields(NAMESPACE_FIELDS)
                        .example("azdo security namespace show 2e9eb7ed-3c0a-47d4-87c1-0ffdd275fd87"),
                ),
        )
        .child(
            CommandNode::parent("permission", "Show and change permissions")
                .long_about(
                    "Show and change the permissions of a user or group on a security token.\n\n\
                     TARGET is ORGANIZATION/SUBJECT or ORGANIZATION/PROJECT/SUBJECT, where SUBJECT \
                     is @me, an email, a display name or a descriptor. Bits are action names, \
                     decimal numbers or 0x hex values.",
                )
                .child(
                    CommandNode::leaf("show", "Show the permissions of a subject", factory, show)
                        .json_fields(PERMISSION_FIELDS)
                        .example("azdo security permission show contoso/@me --namespace-id <uuid> --token repoV2"),
                )
                .child(
                    CommandNode::leaf("update", "Allow or deny permission bits", factory, update)
                        .json_fields(PERMISSION_FIELDS)
                        .example(
                            "azdo security permission update contoso/mona@contoso.com \\\n  \
                             --namespace-id <uuid> --token repoV2 --allow-bit Read --deny-bit 0x4",
                        ),
                )
                .child(
                    CommandNode::leaf("reset", "Reset permission bits to not set", factory, reset)
                        .json_fields(PERMISSION_FIELDS)
                        .example("azdo security permission reset contoso/@me --namespace-id <uuid> --token repoV2 --bit Read"),
                ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::testing::Harness;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, path_regex, query_param};
    use wiremock::{Mock, ResponseTemplate};

    const NAMESPACE: &str = "2e9eb7ed-3c0a-47d4-87c1-0ffdd275fd87";

    fn target(subject: &str) -> PermissionTarget {
        PermissionTarget {
            target: format!("contoso/{subject}"),
            namespace_id: NAMESPACE.into(),
            token: "repoV2/p-1".into(),
        }
    }

    async fn mount_subject_and_namespace(h: &Harness) {
        Mock::given(method("POST"))
            .and(path("/contoso/_apis/graph/subjectquery"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"descriptor": "aad.bW9uYQ", "displayName": "Mona", "mailAddress": "mona@contoso.com"}]
            })))
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/contoso/_apis/identities"))
            .and(query_param("subjectDescriptors", "aad.bW9uYQ"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1,
                "value": [{"id": "u-1", "descriptor": "Microsoft.IdentityModel.Claims.ClaimsIdentity;mona"}]
            })))
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/contoso/_apis/securitynamespaces/{NAMESPACE}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1,
                "value": [{
                    "namespaceId": NAMESPACE, "name": "Git Repositories",
                    "actions": [
                        {"bit": 1, "name": "Administer", "displayName": "Administer"},
                        {"bit": 2, "name": "Read", "displayName": "Read"},
                        {"bit": 4, "name": "GenericContribute", "displayName": "Contribute"}
                    ]
                }]
            })))
            .mount(&h.server)
            .await;
    }

    #[tokio::test]
    async fn test_update_issues_one_mutation_and_renders_table() {
        let h = Harness::start().await;
        mount_subject_and_namespace(&h).await;
        Mock::given(method("POST"))
            .and(path(format!("/contoso/_apis/accesscontrolentries/{NAMESPACE}")))
            .and(body_partial_json(json!({
                "token": "repoV2/p-1",
                "merge": true,
                "accessControlEntries": [{
                    "descriptor": "Microsoft.IdentityModel.Claims.ClaimsIdentity;mona",
                    "allow": 6, "deny": 0
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 1, "value": []})))
            .expect(1)
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/contoso/_apis/accesscontrollists/{NAMESPACE}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1,
                "value": [{
                    "token": "repoV2/p-1",
                    "acesDictionary": {
                        "Microsoft.IdentityModel.Claims.ClaimsIdentity;mona": {
                            "descriptor": "Microsoft.IdentityModel.Claims.ClaimsIdentity;mona",
                            "allow": 6, "deny": 0,
                            "extendedInfo": {"effectiveAllow": 7}
                        }
                    }
                }]
            })))
            .mount(&h.server)
            .await;

        update(
            Arc::clone(&h.factory),
            UpdateArgs {
                target: target("mona@contoso.com"),
                allow: vec!["Read".into(), "0x4".into()],
                deny: vec![],
                yes: YesArgs { yes: true },
                export: ExportArgs::default(),
            },
        )
        .await
        .unwrap();
        assert_eq!(
            h.out(),
            "0x1\tAdminister\tAdminister\tAllow (inherited)\n\
             0x2\tRead\tRead\tAllow\n\
             0x4\tGenericContribute\tContribute\tAllow\n"
        );
    }

    #[tokio::test]
    async fn test_unknown_bit_is_rejected_before_mutation() {
        let h = Harness::start().await;
        mount_subject_and_namespace(&h).await;
        Mock::given(method("POST"))
            .and(path_regex("^/contoso/_apis/accesscontrolentries/.*"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&h.server)
            .await;

        let err = update(
            Arc::clone(&h.factory),
            UpdateArgs {
                target: target("mona@contoso.com"),
                allow: vec!["Frobnicate".into()],
                deny: vec![],
                yes: YesArgs { yes: true },
                export: ExportArgs::default(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("unrecognized permission token"));
    }

    #[tokio::test]
    async fn test_reset_without_bits_clears_all() {
        let h = Harness::start().await;
        mount_subject_and_namespace(&h).await;
        Mock::given(method("DELETE"))
            .and(path(format!("/contoso/_apis/permissions/{NAMESPACE}/7")))
            .and(query_param("token", "repoV2/p-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "descriptor": "Microsoft.IdentityModel.Claims.ClaimsIdentity;mona", "allow": 0, "deny": 0
            })))
            .expect(1)
            .mount(&h.server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/contoso/_apis/accesscontrollists/{NAMESPACE}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"count": 0, "value": []})))
            .mount(&h.server)
            .await;

        reset(
            Arc::clone(&h.factory),
            ResetArgs {
                target: target("mona@contoso.com"),
                bits: vec![],
                yes: YesArgs { yes: true },
                export: ExportArgs::default(),
            },
        )
        .await
        .unwrap();
        assert!(h.out().contains("0x2\tRead\tRead\tNot set\n"));
        assert!(h.err().contains("Reset permissions of Mona on repoV2/p-1"));
    }

    #[tokio::test]
    async fn test_subject_target_needs_organization() {
        let h = Harness::start().await;
        let err = show(
            Arc::clone(&h.factory),
            ShowArgs {
                target: PermissionTarget {
                    target: "mona@contoso.com".into(),
                    namespace_id: NAMESPACE.into(),
                    token: "repoV2".into(),
                },
                export: ExportArgs::default(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not a valid subject target"));
    }
}
