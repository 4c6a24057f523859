use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = relay_common::id::prefixed_ulid("ses");
/// assert!(id.starts_with("ses_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Returns true if `id` looks like `<prefix>_<ulid>`.
pub fn has_prefix(id: &str, prefix: &str) -> bool {
    match id.split_once('_') {
        Some((p, rest)) => p == prefix && Ulid::from_string(rest).is_ok(),
        None => false,
    }
}

/// Marker trait for types that represent a prefixed ID.
pub trait PrefixedId {
    const PREFIX: &'static str;

    fn generate() -> String {
        prefixed_ulid(Self::PREFIX)
    }
}

/// Well-known ID prefixes.
pub mod prefix {
    pub const SESSION: &str = "ses";
}
