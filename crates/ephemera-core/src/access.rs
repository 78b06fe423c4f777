use ephemera_types::models::MessageRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    Denied,
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted)
    }
}

/// Trim and lower-case an untrusted email. Returns `None` unless the result
/// has exactly one `@` with something on both sides.
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(email)
}

/// Decide whether `viewer_email` may read `record`.
///
/// Both allow-lists empty means anyone may read. Otherwise the viewer must be
/// an exact recipient, or their `@domain` must equal a listed domain exactly.
/// Stored lists are already normalised at creation.
pub fn evaluate_access(record: &MessageRecord, viewer_email: Option<&str>) -> AccessDecision {
    if !record.has_access_policy() {
        return AccessDecision::Granted;
    }

    let Some(email) = viewer_email.and_then(normalize_email) else {
        return AccessDecision::Denied;
    };

    if record.allowed_recipients.contains(&email) {
        return AccessDecision::Granted;
    }

    // normalize_email guarantees exactly one '@'
    let domain = &email[email.find('@').unwrap_or(0)..];
    if record.allowed_domains.contains(domain) {
        return AccessDecision::Granted;
    }

    AccessDecision::Denied
}
