//! UUID helpers

use uuid::Uuid;

/// Generates a new random UUID v4.
#[must_use]
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Generates a deterministic UUID v5 from a namespace string and key.
#[must_use]
pub fn deterministic(namespace: &str, key: &str) -> Uuid {
    let ns = Uuid::new_v5(&Uuid::NAMESPACE_OID, namespace.as_bytes());
    Uuid::new_v5(&ns, key.as_bytes())
}

/// Parse a string as a UUID, accepting hyphenated and simple forms.
#[must_use]
pub fn parse(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_ids_are_stable() {
        let a = deterministic("table", "work_items");
        let b = deterministic("table", "work_items");
        assert_eq!(a, b);
        assert_ne!(a, deterministic("table", "executions"));
    }

    #[test]
    fn parse_rejects_non_uuids() {
        assert!(parse("Payment Integration").is_none());
        assert!(parse("123e4567-e89b-12d3-a456-426614174000").is_some());
    }
}
