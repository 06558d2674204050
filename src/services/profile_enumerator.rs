//! Selects the profiles a run acts on.

use std::path::Path;

use crate::domain::errors::RotationResult;
use crate::infrastructure::credentials::CredentialsStore;

/// Profiles to rotate, in order.
///
/// An explicit list is split on commas verbatim (order kept, duplicates
/// kept). Without one, every section with a non-empty access key id is
/// selected. A missing credentials file is `ConfigNotFound` either way.
pub fn enumerate_profiles(store_path: &Path, explicit: Option<&str>) -> RotationResult<Vec<String>> {
    let store = CredentialsStore::open(store_path)?;

    Ok(match explicit {
        Some(list) => list.split(',').map(str::to_string).collect(),
        None => store.configured_profiles(),
    })
}
