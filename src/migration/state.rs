//! Migration completion state.

/// Whether the metadata tables have been verified to exist.
///
/// An explicit value rather than ambient global storage: the bootstrap
/// derives it from the injected flag store and returns the transition
/// result, keeping the state testable and replaceable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// Tables may be missing; the next bootstrap will issue DDL.
    Unverified,
    /// A prior pass confirmed every required table exists; DDL is skipped.
    Verified,
}

impl MigrationState {
    #[must_use]
    pub fn is_verified(self) -> bool {
        matches!(self, MigrationState::Verified)
    }
}
