//! Help topics

use crate::cli::command::CommandNode;
use crate::cli::dispatch::REFERENCE_TOPIC;

const MINTTY: &str = "\
MinTTY is the terminal emulator that comes by default with Git for Windows.
It has known issues with azdo's ability to prompt a user for input.

There are a few workarounds to make azdo work with MinTTY:

- Reinstall Git for Windows, checking \"Enable experimental support for pseudo consoles\".

- Use a different terminal emulator with Git for Windows like Windows Terminal.
  You can run \"C:\\Program Files\\Git\\bin\\bash.exe\" from any terminal emulator to continue
  using all of the tooling in Git For Windows without MinTTY.

- Prefix invocations of azdo with winpty, eg: \"winpty azdo auth login\".
  NOTE: this can lead to some UI bugs.";

const ENVIRONMENT: &str = "\
AZDO_TOKEN: an authentication token for API requests. Setting this avoids being
prompted to authenticate and takes precedence over previously stored credentials.

AZDO_ORGANIZATION: the default Azure DevOps organization, as a name or URL, when
not inside a repository cloned from Azure DevOps.

AZDO_CONFIG_DIR: the directory where azdo stores configuration files. If not set,
the default is $XDG_CONFIG_HOME/azdo, \"%AppData%\\AzDO CLI\" on Windows, or
$HOME/.config/azdo.

AZDO_EDITOR, GIT_EDITOR, VISUAL, EDITOR (in order of precedence): the editor
tool to use for authoring text.

AZDO_BROWSER, BROWSER (in order of precedence): the web browser to use for
opening links.

AZDO_PAGER, PAGER (in order of precedence): a terminal paging program to send
standard output to, e.g. \"less\".

AZDO_DEBUG: set to any value to enable verbose output to standard error. Include
values \"api\" to also log HTTP traffic.

AZDO_FORCE_TTY: set to any value to force terminal-style output even when the
output is redirected. When the value is a number, it is interpreted as the
number of columns available in the viewport.

NO_COLOR: set to any value to avoid printing ANSI escape sequences for color
output.

CLICOLOR: set to \"0\" to disable printing ANSI colors in output.

CLICOLOR_FORCE: set to a value other than \"0\" to keep ANSI colors in output
even when the output is piped.

GLAMOUR_STYLE: the style to use for rendering Markdown.

AZDO_PROMPT_DISABLED: set to any value to disable interactive prompting in the
terminal.";

const EXIT_CODES: &str = "\
azdo follows normal conventions regarding exit codes.

- If a command completes successfully, the exit code will be 0

- If a command fails for any reason, the exit code will be 1

- If a command is running but gets cancelled, the exit code will be 2

- If a command requires authentication, the exit code will be 4

NOTE: It is possible that a particular command may have more exit codes, so it
is a good practice to check documentation for the command if you are relying
on exit codes to control some behavior. Shell aliases pass through the exit
code of the script they run.";

const FORMATTING: &str = "\
By default, the result of azdo commands are output in line-based plain text
format. Some commands support passing the --json flag, which converts the
output to JSON format. Once in JSON, the output can be further formatted
according to a required formatting string by adding either the --jq or
--template flag.

The --json flag requires a comma separated list of fields to fetch. To view
the possible JSON field names for a command omit the string argument to the
--json flag when you run the command. Note that you must pass the --json flag
and field names to use the --jq or --template flags.

The --jq flag requires a string argument in jq query syntax, and will only
print those JSON values which match the query. jq queries can be used to
select elements from an array, fields from an object, create a new array, and
more.

The --template flag requires a string argument in Jinja template syntax, and
will only print those JSON values which match the query. The exported value is
available as `data`; when it is an object its keys are also available
directly. In addition to the built-in filters, the following functions are
available:

- autocolor(style, text): like color, but only emits color to terminals
- color(style, text): colorizes text using console style names such as
  \"green\" or \"red.bold\"
- join(sep, list): joins values in the list using a separator
- pluck(field, list): collects values of a field from all items in the input
- tablerow(fields...): aligns fields in output vertically as a table
- tablerender(): renders fields added by tablerow in place
- timeago(time): renders a timestamp as relative to now
- timefmt(format, time): formats a timestamp using strftime syntax
- truncate(length, text): ensures input fits within length
- hyperlink(url, text): renders a terminal hyperlink

Examples
  # default output format
  $ azdo pr list
  # adding the --json flag with a list of field names
  $ azdo pr list --json id,title,author
  # adding the --jq flag and selecting fields from the array
  $ azdo pr list --json author --jq '.[].author'
  # adding the --template flag
  $ azdo pr list --json id,title --template '{% for pr in data %}{{ tablerow(pr.id, pr.title) }}{% endfor %}{{ tablerender() }}'";

/// `azdo mintty`
pub fn mintty() -> CommandNode {
    CommandNode::topic("mintty", "Information about using azdo with MinTTY", MINTTY)
}

/// `azdo environment`
pub fn environment() -> CommandNode {
    CommandNode::topic("environment", "Environment variables that can be used with azdo", ENVIRONMENT)
}

/// `azdo exit-codes`
pub fn exit_codes() -> CommandNode {
    CommandNode::topic("exit-codes", "Exit codes used by azdo", EXIT_CODES)
}

/// `azdo formatting`
pub fn formatting() -> CommandNode {
    CommandNode::topic("formatting", "Formatting options for JSON data exported from azdo", FORMATTING)
}

/// `azdo reference`
pub fn reference() -> CommandNode {
    CommandNode::topic(REFERENCE_TOPIC, "A comprehensive reference of all azdo commands", "").hidden()
}
