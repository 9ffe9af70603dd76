//! Help rendering
//!
//! Sections, in order: description, usage, aliases, grouped subcommands,
//! help topics (root only), flags, inherited flags, JSON fields,
//! arguments, examples, environment variables and the learn-more footer.

use clap::Arg;
use std::fmt::Write;

use crate::cli::command::{CommandNode, Group};
use crate::config::{defaults, urls};

const INDENT: &str = "  ";

/// `azdo pr list [flags]`, `azdo pr <command> [flags]`
pub fn usage(path: &[&str], node: &CommandNode) -> String {
    let mut line = path.join(" ");
    if node.is_topic() {
        return line;
    }
    if node.commands().next().is_some() && !node.is_runnable() {
        line.push_str(" <command>");
    }
    line.push_str(" [flags]");
    for arg in node.args().get_positionals() {
        let name = value_name(arg);
        let repeat = if arg.get_num_args().is_some_and(|n| n.max_values() > 1) {
            "..."
        } else {
            ""
        };
        if arg.is_required_set() {
            let _ = write!(line, " <{name}>{repeat}");
        } else {
            let _ = write!(line, " [<{name}>{repeat}]");
        }
    }
    line
}

fn value_name(arg: &Arg) -> String {
    arg.get_value_names()
        .and_then(|names| names.first())
        .map(|n| n.to_string())
        .unwrap_or_else(|| arg.get_id().as_str().to_uppercase())
}

fn flag_spec(arg: &Arg) -> String {
    let mut spec = match (arg.get_short(), arg.get_long()) {
        (Some(s), Some(l)) => format!("-{s}, --{l}"),
        (Some(s), None) => format!("-{s}"),
        (None, Some(l)) => format!("    --{l}"),
        (None, None) => String::new(),
    };
    if arg.get_action().takes_values() {
        let optional = arg.get_num_args().is_some_and(|n| n.min_values() == 0);
        let name = value_name(arg);
        if optional {
            let _ = write!(spec, " [{name}]");
        } else {
            let _ = write!(spec, " {name}");
        }
    }
    spec
}

fn flag_help(arg: &Arg) -> String {
    let mut help = arg.get_help().map(|h| h.to_string()).unwrap_or_default();
    let possible: Vec<String> = arg
        .get_possible_values()
        .iter()
        .filter(|v| !v.is_hide_set())
        .map(|v| v.get_name().to_string())
        .collect();
    if !possible.is_empty() && arg.get_action().takes_values() {
        let _ = write!(help, ": {{{}}}", possible.join("|"));
    }
    let defaults: Vec<String> = arg
        .get_default_values()
        .iter()
        .map(|v| v.to_string_lossy().into_owned())
        .filter(|v| !v.is_empty())
        .collect();
    if !defaults.is_empty() {
        let _ = write!(help, " (default {:?})", defaults.join(","));
    }
    help
}

fn two_columns(rows: &[(String, String)]) -> String {
    let width = rows.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);
    let mut text = String::new();
    for (left, right) in rows {
        let pad = width - left.chars().count();
        let _ = writeln!(text, "{INDENT}{left}{}   {right}", " ".repeat(pad));
    }
    text
}

fn section(out: &mut String, title: &str, body: &str) {
    if body.trim().is_empty() {
        return;
    }
    let _ = writeln!(out, "{title}");
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
}

fn command_rows<'a>(nodes: impl Iterator<Item = &'a CommandNode>) -> String {
    let rows: Vec<(String, String)> = nodes
        .filter(|c| !c.is_hidden())
        .map(|c| (format!("{}:", c.name()), c.about().to_string()))
        .collect();
    two_columns(&rows)
}

fn indent_block(text: &str) -> String {
    text.lines()
        .map(|l| {
            if l.is_empty() {
                "\n".to_string()
            } else {
                format!("{INDENT}{l}\n")
            }
        })
        .collect()
}

/// Full help for one node
///
/// `path` is the invocation path including the program name; the root is
/// the node whose path has a single element.
pub fn render(path: &[&str], node: &CommandNode) -> String {
    let is_root = path.len() == 1;
    let mut out = String::new();

    let _ = writeln!(out, "{}\n", node.description().trim_end());
    if node.is_topic() {
        return out;
    }

    section(&mut out, "Usage", &format!("{INDENT}{}\n", usage(path, node)));

    if !node.aliases().is_empty() {
        section(&mut out, "Aliases", &format!("{INDENT}{}\n", node.aliases().join(", ")));
    }

    let grouped = node.commands().any(|c| c.group_id().is_some());
    if grouped {
        for group in Group::ALL {
            let body = command_rows(node.commands().filter(|c| c.group_id() == Some(group)));
            section(&mut out, group.title(), &body);
        }
        section(
            &mut out,
            "Additional commands",
            &command_rows(node.commands().filter(|c| c.group_id().is_none())),
        );
    } else {
        section(&mut out, "Available commands", &command_rows(node.commands()));
    }

    if is_root {
        let topics = command_rows(node.children().iter().filter(|c| c.is_topic()));
        section(&mut out, "Help topics", &topics);
    }

    let flags: Vec<(String, String)> = node
        .args()
        .get_arguments()
        .filter(|a| !a.is_positional() && !a.is_hide_set())
        .map(|a| (flag_spec(a), flag_help(a)))
        .collect();
    section(&mut out, "Flags", &two_columns(&flags));
    section(
        &mut out,
        "Inherited flags",
        &two_columns(&[("    --help".to_string(), "Show help for command".to_string())]),
    );

    if !node.declared_json_fields().is_empty() {
        let mut fields = node.declared_json_fields().to_vec();
        fields.sort_unstable();
        section(&mut out, "JSON fields", &format!("{INDENT}{}\n", fields.join(", ")));
    }

    let positionals: Vec<(String, String)> = node
        .args()
        .get_positionals()
        .map(|a| {
            (
                value_name(a),
                a.get_long_help()
                    .or_else(|| a.get_help())
                    .map(|h| h.to_string())
                    .unwrap_or_default(),
            )
        })
        .collect();
    section(&mut out, "Arguments", &two_columns(&positionals));

    if !node.examples().is_empty() {
        let body: String = node
            .examples()
            .iter()
            .map(|e| format!("{INDENT}$ {e}\n"))
            .collect();
        section(&mut out, "Examples", &body);
    }

    if is_root {
        section(
            &mut out,
            "Environment variables",
            &indent_block(&format!(
                "See '{} help environment' for the list of supported environment variables.",
                defaults::PROGRAM_NAME
            )),
        );
    }

    section(
        &mut out,
        "Learn more",
        &indent_block(&format!(
            "Use '{} <command> <subcommand> --help' for more information about a command.\n\
             Read the manual at {}",
            defaults::PROGRAM_NAME,
            urls::DOCS
        )),
    );
    out
}

/// Help of every reachable command, concatenated
pub fn reference(root: &CommandNode) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} reference\n", defaults::PROGRAM_NAME);
    let mut path = Vec::new();
    root.walk(&mut path, &mut |path, node| {
        if node.is_hidden() || node.is_topic() {
            return;
        }
        let _ = writeln!(out, "## {}\n", path.join(" "));
        out.push_str(&render(path, node));
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::context::Factory;
    use crate::cli::exporter::ExportArgs;
    use clap::Args;
    use std::sync::Arc;

    #[derive(Args, Debug)]
    struct ListArgs {
        /// Maximum number of items
        #[arg(short = 'L', long, default_value_t = 30)]
        limit: usize,

        /// Repository
        #[arg(value_name = "REPO")]
        repo: Option<String>,

        #[command(flatten)]
        export: ExportArgs,
    }

    fn tree() -> CommandNode {
        let factory = Arc::new(Factory::for_tests());
        let list = CommandNode::leaf("list", "List things", &factory, |_, _: ListArgs| async {
            Ok(())
        })
        .alias("ls")
        .json_fields(&["title", "id"])
        .example("azdo pr list --limit 5");
        CommandNode::parent("azdo", "Work with Azure DevOps")
            .child(CommandNode::parent("pr", "Manage pull requests").group(Group::Core).child(list))
            .child(CommandNode::parent("graph", "Query the graph").group(Group::Security))
            .child(CommandNode::parent("misc", "Other things"))
            .child(CommandNode::topic("environment", "Environment variables", "AZDO_TOKEN"))
    }

    #[test]
    fn test_root_sections_in_order() {
        let root = tree();
        let text = render(&["azdo"], &root);
        let order = [
            "Work with Azure DevOps",
            "Usage",
            "Core commands",
            "Security commands",
            "Additional commands",
            "Help topics",
            "Inherited flags",
            "Environment variables",
            "Learn more",
        ];
        let positions: Vec<usize> = order
            .iter()
            .map(|s| text.find(s).unwrap_or_else(|| panic!("missing {s} in\n{text}")))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{text}");
        assert!(text.contains("  pr:"));
        assert!(text.contains("  environment:"));
    }

    #[test]
    fn test_leaf_help_lists_flags_fields_and_examples() {
        let root = tree();
        let pr = root.find_child("pr").unwrap();
        let list = pr.find_child("list").unwrap();
        let text = render(&["azdo", "pr", "list"], list);
        assert!(text.contains("azdo pr list [flags] [<REPO>]"), "{text}");
        assert!(text.contains("Aliases\n  ls\n"));
        assert!(text.contains("-L, --limit LIMIT"), "{text}");
        assert!(text.contains("(default \"30\")"));
        assert!(text.contains("--json [FIELDS]"), "{text}");
        assert!(text.contains("JSON fields\n  id, title\n"));
        assert!(text.contains("$ azdo pr list --limit 5"));
        assert!(!text.contains("Help topics"));
    }

    #[test]
    fn test_reference_covers_every_command() {
        let text = reference(&tree());
        assert!(text.contains("## azdo pr list"));
        assert!(text.contains("## azdo graph"));
        assert!(!text.contains("## azdo environment"));
    }
}
