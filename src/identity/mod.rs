/// Client identity
///
/// Enrollment binds a client id to a public key, the resolver answers
/// "which key belongs to this id", and the invalidation listener keeps the
/// resolver honest when clients are deleted elsewhere.

pub mod enrollment;
pub mod invalidation;
pub mod negative_cache;
pub mod resolver;

pub use enrollment::EnrollmentHandler;
pub use invalidation::InvalidationListener;
pub use negative_cache::{
    NegativeCache, NegativeCacheTtl, DEFAULT_NEGATIVE_CAPACITY, DEFAULT_NEGATIVE_TTL,
    MAX_NEGATIVE_TTL,
};
pub use resolver::{PublicKeyResolver, ServerPublicKeyResolver};

use crate::{
    error::KeyringResult,
    journal::{client_delete_row, Journal, CLIENT_DELETE_QUEUE},
    store::{ClientPathManager, KeyStore},
};
use tracing::info;

/// Organization id that never qualifies client ids
pub const ROOT_ORG_ID: &str = "root";

/// Qualify a derived client id with the tenant it enrolled under.
///
/// The root org (no org, `""` or `"root"`) leaves the id unchanged; any
/// other org appends `-<org>`.
pub fn client_id_for_org(client_id: &str, org_id: Option<&str>) -> String {
    match org_id {
        Some(org) if !org.is_empty() && org != ROOT_ORG_ID => format!("{}-{}", client_id, org),
        _ => client_id.to_string(),
    }
}

/// Delete a client's key record and announce the deletion.
///
/// Watchers on the deletion queue (including this process's own
/// invalidation listener) drop whatever they cached for the client.
pub async fn remove_client(
    store: &dyn KeyStore,
    journal: &dyn Journal,
    client_id: &str,
) -> KeyringResult<()> {
    store.delete(&ClientPathManager::new(client_id).key()).await?;
    journal
        .push_rows(CLIENT_DELETE_QUEUE, vec![client_delete_row(client_id)])
        .await?;

    info!("Removed client {}", client_id);
    Ok(())
}
