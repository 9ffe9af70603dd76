//! Service URLs

/// Base URL for organizations hosted on the cloud service
pub const SERVICE: &str = "https://dev.azure.com";

/// Host name of the cloud service
pub const SERVICE_HOST: &str = "dev.azure.com";

/// Host serving graph and identity APIs for cloud organizations
pub const VSSPS_HOST: &str = "vssps.dev.azure.com";

/// Host for SSH clone URLs
pub const SSH_HOST: &str = "ssh.dev.azure.com";

/// Documentation landing page shown in help footers
pub const DOCS: &str = "https://github.com/azdo-cli/azdo#readme";

/// Release notes
pub const RELEASES: &str = "https://github.com/azdo-cli/azdo/releases";

/// Page for creating personal access tokens
pub fn token_page(organization: &str) -> String {
    format!("{SERVICE}/{organization}/_usersSettings/tokens")
}

/// Default URL of an organization
pub fn organization_url(organization: &str) -> String {
    format!("{SERVICE}/{organization}")
}
