//! Ledger row id generation.

/// Generate a prefixed row id, e.g. `act_3fa85f6457174562`.
///
/// Sixteen hex chars of a v4 uuid is plenty for a single-operator ledger
/// and keeps ids readable in CLI output.
pub fn new_id(prefix: &str) -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &uuid[..16])
}
