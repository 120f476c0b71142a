//! Hostname syntax and provider namespace checks for requested domains.

use resourcecore_types::ValidationError;

/// Longest hostname accepted, in characters.
pub const MAX_DOMAIN_LENGTH: usize = 253;

/// Longest single DNS label accepted, in characters.
pub const MAX_LABEL_LENGTH: usize = 63;

fn invalid(domain: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidDomain {
        domain: domain.to_string(),
        reason: reason.into(),
    }
}

/// Checks that `domain` is a syntactically valid DNS hostname.
///
/// Labels are 1 to 63 characters of ASCII letters, digits and hyphens and may
/// not start or end with a hyphen. A trailing dot is rejected, as is any other
/// empty label.
pub fn validate_hostname(domain: &str) -> Result<(), ValidationError> {
    if domain.is_empty() {
        return Err(invalid(domain, "domain is empty"));
    }
    if domain.len() > MAX_DOMAIN_LENGTH {
        return Err(invalid(
            domain,
            format!("longer than {MAX_DOMAIN_LENGTH} characters"),
        ));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(invalid(domain, "contains an empty label"));
        }
        if label.len() > MAX_LABEL_LENGTH {
            return Err(invalid(
                domain,
                format!("label '{label}' is longer than {MAX_LABEL_LENGTH} characters"),
            ));
        }
        if let Some(bad) = label
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-'))
        {
            return Err(invalid(domain, format!("label '{label}' contains '{bad}'")));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid(
                domain,
                format!("label '{label}' starts or ends with '-'"),
            ));
        }
    }

    Ok(())
}

fn is_namespace_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Checks that `domain` is `prefix`, one label, then `suffix`.
///
/// Matching ignores ASCII case. The label between prefix and suffix must be a
/// non-empty run of lowercase letters, digits and hyphens with no dots.
pub fn check_namespace(domain: &str, prefix: &str, suffix: &str) -> Result<(), ValidationError> {
    let lowered = domain.to_ascii_lowercase();
    let label = lowered
        .strip_prefix(&prefix.to_ascii_lowercase())
        .and_then(|rest| rest.strip_suffix(&suffix.to_ascii_lowercase()));

    match label {
        Some(label) if is_namespace_label(label) => Ok(()),
        _ => Err(ValidationError::DomainNotInNamespace {
            domain: domain.to_string(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }),
    }
}
