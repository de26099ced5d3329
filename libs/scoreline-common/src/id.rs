use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = scoreline_common::id::prefixed_ulid("mat");
/// assert!(id.starts_with("mat_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Returns true when `id` carries `prefix` followed by a well-formed ULID.
pub fn has_prefix(id: &str, prefix: &str) -> bool {
    id.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|ulid| Ulid::from_string(ulid).is_ok())
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
    pub const USER: &str = "usr";
    pub const TEAM: &str = "team";
    pub const PLAYER: &str = "ply";
    pub const TOURNAMENT: &str = "trn";
    pub const FIXTURE: &str = "mat";
    pub const INNINGS: &str = "inn";
    pub const CONVERSATION: &str = "cnv";
    pub const CLIENT: &str = "cli";
    pub const PROCESS: &str = "proc";
}
