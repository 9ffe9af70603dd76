//! Default configuration values

use std::time::Duration;

/// Program name used in usage lines and help output
pub const PROGRAM_NAME: &str = "azdo";

/// Default number of pull requests fetched by `pr list`
pub const PR_LIST_LIMIT: usize = 30;

/// Default number of items fetched by other list commands
pub const LIST_LIMIT: usize = 100;

/// Default page size requested from the service
pub const PAGE_SIZE: usize = 100;

/// First wait of the binary-exponential poll backoff
pub const POLL_BASE_DELAY: Duration = Duration::from_secs(2);

/// Default deadline for `--wait` operations
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Maximum nesting of alias expansions before dispatch gives up
pub const MAX_ALIAS_DEPTH: usize = 8;

/// Maximum edit distance for "did you mean" suggestions
pub const SUGGESTION_DISTANCE: usize = 2;

/// Width assumed when the terminal size cannot be determined
pub const TERMINAL_WIDTH: usize = 80;

/// Default git protocol for clone URLs
pub const GIT_PROTOCOL: &str = "https";

/// Default REST API version
pub const API_VERSION: &str = "7.1";

/// API version for preview endpoints (graph, identities)
pub const API_VERSION_PREVIEW: &str = "7.1-preview.1";

/// Request timeout for a single REST call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// File mode for config and credential files
pub const FILE_MODE: u32 = 0o600;
