use crate::error::{CoreError, Result};

fn invalid(field: &'static str, value: &str, reason: &'static str) -> CoreError {
    CoreError::InvalidField {
        field,
        value: value.to_string(),
        reason,
    }
}

/// Azure user-assigned identity names: 3-128 characters of letters, digits,
/// hyphens and underscores, starting with a letter or digit.
///
/// # Errors
///
/// Returns `CoreError::InvalidField` describing the first broken rule.
pub fn validate_managed_identity_name(name: &str) -> Result<()> {
    const FIELD: &str = "managed identity name";
    if name.is_empty() {
        return Err(CoreError::MissingField { field: FIELD });
    }
    if !(3..=128).contains(&name.len()) {
        return Err(invalid(FIELD, name, "must be 3 to 128 characters"));
    }
    if !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(invalid(FIELD, name, "must start with a letter or digit"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid(
            FIELD,
            name,
            "may only contain letters, digits, hyphens and underscores",
        ));
    }
    Ok(())
}

/// Kubernetes namespaces are DNS labels: at most 63 lowercase letters,
/// digits and hyphens, starting and ending with a letter or digit.
///
/// # Errors
///
/// Returns `CoreError::MissingField` for an empty name and
/// `CoreError::InvalidField` for a malformed one.
pub fn validate_kubernetes_namespace(namespace: &str) -> Result<()> {
    const FIELD: &str = "kubernetes namespace";
    if namespace.is_empty() {
        return Err(CoreError::MissingField { field: FIELD });
    }
    if namespace.len() > 63 {
        return Err(invalid(FIELD, namespace, "must be at most 63 characters"));
    }
    if !namespace
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            FIELD,
            namespace,
            "may only contain lowercase letters, digits and hyphens",
        ));
    }
    if namespace.starts_with('-') || namespace.ends_with('-') {
        return Err(invalid(
            FIELD,
            namespace,
            "must start and end with a letter or digit",
        ));
    }
    Ok(())
}

/// GCS bucket names: 3-63 lowercase letters, digits, hyphens, underscores
/// and dots, starting and ending with a letter or digit, never claiming to
/// be Google.
///
/// # Errors
///
/// Returns `CoreError::InvalidField` describing the first broken rule.
pub fn validate_bucket_name(name: &str) -> Result<()> {
    const FIELD: &str = "bucket name";
    if name.is_empty() {
        return Err(CoreError::MissingField { field: FIELD });
    }
    if !(3..=63).contains(&name.len()) {
        return Err(invalid(FIELD, name, "must be 3 to 63 characters"));
    }
    if !name.chars().all(|c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' || c == '.'
    }) {
        return Err(invalid(
            FIELD,
            name,
            "may only contain lowercase letters, digits, '-', '_' and '.'",
        ));
    }
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if !name.starts_with(alnum) || !name.ends_with(alnum) {
        return Err(invalid(FIELD, name, "must start and end with a letter or digit"));
    }
    if name.starts_with("goog") || name.contains("google") {
        return Err(invalid(FIELD, name, "may not start with 'goog' or contain 'google'"));
    }
    Ok(())
}

/// Dataproc cluster ids: start with a lowercase letter, at most 51 lowercase
/// letters, digits and hyphens, not ending with a hyphen.
///
/// # Errors
///
/// Returns `CoreError::InvalidField` describing the first broken rule.
pub fn validate_cluster_id(cluster_id: &str) -> Result<()> {
    const FIELD: &str = "cluster id";
    if cluster_id.is_empty() {
        return Err(CoreError::MissingField { field: FIELD });
    }
    if cluster_id.len() > 51 {
        return Err(invalid(FIELD, cluster_id, "must be at most 51 characters"));
    }
    if !cluster_id.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(invalid(FIELD, cluster_id, "must start with a lowercase letter"));
    }
    if !cluster_id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid(
            FIELD,
            cluster_id,
            "may only contain lowercase letters, digits and hyphens",
        ));
    }
    if cluster_id.ends_with('-') {
        return Err(invalid(FIELD, cluster_id, "must not end with a hyphen"));
    }
    Ok(())
}
