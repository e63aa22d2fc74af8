//! Snapshot fingerprints.

use sha2::{Digest, Sha256};

use crate::model::Entity;
use crate::semantic::error::{SemanticError, SemanticResult};

/// Fingerprint of a registry's contents, as lowercase hex SHA-256.
///
/// Entities are fed in registration order, one JSON document each, so the
/// same entities registered in another order are another snapshot.
pub fn fingerprint(entities: &[Entity]) -> SemanticResult<String> {
    let mut hasher = Sha256::new();
    for entity in entities {
        let json = serde_json::to_vec(entity).map_err(|e| SemanticError::Fingerprint {
            entity: entity.name.clone(),
            message: e.to_string(),
        })?;
        hasher.update(&json);
        hasher.update(b"\n");
    }
    Ok(format!("{:x}", hasher.finalize()))
}
