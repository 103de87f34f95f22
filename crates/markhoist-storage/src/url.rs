//! Backend URL construction
//!
//! These formats are load-bearing: existing documents embed the URLs, so each
//! builder reproduces its backend's historical format exactly. Helpers are
//! shared by value between backends instead of through base-class layering.

/// Join an optional key prefix with a logical name, normalizing slashes.
pub fn join_key(prefix: &str, name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let name = name.trim_start_matches('/');
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

/// Object URL for bucket-style stores: `https://{bucket}.{endpoint}/{key}`,
/// or `https://{custom}/{key}` when a custom endpoint override is set.
pub fn bucket_object_url(bucket: &str, endpoint: &str, custom: Option<&str>, key: &str) -> String {
    match custom {
        Some(custom) => format!("https://{}/{key}", custom.trim_end_matches('/')),
        None => format!("https://{bucket}.{endpoint}/{key}"),
    }
}

/// Raw-content URL for GitHub-hosted files.
pub fn github_raw_url(repo: &str, branch: &str, key: &str) -> String {
    format!(
        "https://raw.githubusercontent.com/{repo}/{}/{key}",
        effective_branch(branch)
    )
}

/// Raw-content URL for Gitee-hosted files.
pub fn gitee_raw_url(repo: &str, branch: &str, key: &str) -> String {
    format!("https://gitee.com/{repo}/raw/{branch}/{key}")
}

/// GitHub renamed its default branch; a configured `master` is read as `main`.
/// Writing to `master` is rejected earlier, at configuration validation.
pub fn effective_branch(branch: &str) -> &str {
    if branch == "master" { "main" } else { branch }
}
