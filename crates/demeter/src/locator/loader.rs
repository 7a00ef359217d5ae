// ABOUTME: Loads the builtin table profiles embedded in the binary at compile time.
// ABOUTME: Parses data/builtin_profiles.json into a ProfileRegistry.

use super::profile::{ProfileRegistry, TableProfile};

/// Name of the builtin fallback profile used when nothing better is known.
pub const GENERIC_PROFILE: &str = "generic";

const BUILTIN_PROFILES_JSON: &str = include_str!("../../data/builtin_profiles.json");

/// Loads the builtin profiles shipped with the crate.
///
/// # Panics
///
/// Panics if the embedded JSON is malformed, which would be a build defect.
pub fn load_builtin_profiles() -> ProfileRegistry {
    let profiles: Vec<TableProfile> =
        serde_json::from_str(BUILTIN_PROFILES_JSON).expect("failed to parse builtin profiles");
    let mut registry = ProfileRegistry::new();
    for profile in profiles {
        registry.register(profile);
    }
    registry
}
