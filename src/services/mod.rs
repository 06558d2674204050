//! Service layer: profile selection, rotation workflow and retry policy.

pub mod key_rotation;
pub mod profile_enumerator;
pub mod retry;

pub use key_rotation::{enforce_single_key, KeyRotator, Precondition, RotationSettings};
pub use profile_enumerator::enumerate_profiles;
pub use retry::RetryPolicy;
