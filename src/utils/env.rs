/// Get environment variable with PROJECTHUB_ prefix, falling back to unprefixed version
///
/// This helper function checks for `PROJECTHUB_{key}` first, then falls back to `{key}`
/// so that platform-provided names (`PORT`, `NODE_ENV`, `FRONTEND_ORIGIN`) keep working.
///
/// # Examples
///
/// ```rust,ignore
/// use projecthub::utils::get_env_with_prefix;
///
/// // Checks PROJECTHUB_PORT first, then PORT
/// let port = get_env_with_prefix("PORT");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("PROJECTHUB_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse a comma separated environment value into trimmed, non-empty items
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
