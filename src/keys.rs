//! Domain key codec and registration input checks.
//!
//! The remote store forbids `.` in top-level keys, so colleges are keyed by
//! their email domain with dots rewritten to underscores. The dotted form is
//! carried redundantly inside each `College` record, so no inverse mapping is
//! needed. Domains that already contain underscores can collide with rewritten
//! ones (`a.b` vs `a_b`); known limitation, accepted.

/// Store-safe key for a dotted email domain.
pub fn domain_to_key(domain: &str) -> String {
    domain.replace('.', "_")
}

/// Domain portion of an email address (everything after the last `@`).
pub fn extract_domain(email: &str) -> Option<&str> {
    email.rsplit_once('@').map(|(_, domain)| domain)
}

/// Shape check equivalent to `^[^\s@]+@[^\s@]+\.[^\s@]+$`: exactly one `@`,
/// no whitespace, and a dot somewhere in the host part.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, host)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || host.is_empty() {
        return false;
    }
    if email.chars().any(char::is_whitespace) || host.contains('@') {
        return false;
    }
    match host.rsplit_once('.') {
        Some((name, tld)) => !name.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// LinkedIn profile URLs must point at a public profile path.
pub fn is_valid_linkedin(url: &str) -> bool {
    url.contains("linkedin.com/in/")
}
