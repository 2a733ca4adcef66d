use super::persistence::EntityStore;
use crate::error::{Result, TrackerError};
use crate::models::TrackedEntity;

/// Compare the caller's expected version with the stored one.
///
/// A stored version of `None` (never transitioned) compares equal to `0`.
pub fn check_version(entity: &TrackedEntity, expected_version: Option<i64>) -> Result<()> {
    match expected_version {
        Some(expected) if expected != entity.effective_version() => {
            Err(TrackerError::VersionConflict {
                entity_id: entity.id,
                expected: Some(expected),
                actual: entity.version,
            })
        }
        _ => Ok(()),
    }
}

/// Load an application inside `tx` and verify the expected version before any mutation.
///
/// No lock outlives the transaction; the store's conditional write settles races that slip
/// between this read and the update.
pub async fn guard<S: EntityStore + ?Sized>(
    store: &S,
    tx: &mut S::Tx,
    owner_id: i64,
    entity_id: i64,
    expected_version: Option<i64>,
) -> Result<TrackedEntity> {
    let entity = store
        .load_entity(tx, owner_id, entity_id)
        .await?
        .ok_or(TrackerError::NotFound { entity_id })?;

    check_version(&entity, expected_version)?;
    Ok(entity)
}
