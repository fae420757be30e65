use helix_save::{load_or_fail, load_or_new, save, SaveOptions};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
struct Profile {
    name: String,
    level: u32,
    tags: Vec<String>,
}

fn profile_strategy() -> impl Strategy<Value = Profile> {
    (
        "[a-zA-Z0-9 ]{0,32}",
        any::<u32>(),
        proptest::collection::vec("[a-z]{1,8}", 0..5),
    )
        .prop_map(|(name, level, tags)| Profile { name, level, tags })
}

proptest! {
    #[test]
    fn round_trip_preserves_the_value(profile in profile_strategy()) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.bin");

        save(&profile, &path, SaveOptions { portable: true, ..Default::default() }).unwrap();
        let loaded: Profile = load_or_fail(&path, true).unwrap();

        prop_assert_eq!(loaded, profile);
    }

    #[test]
    fn round_trip_survives_uncompressed_mode(profile in profile_strategy()) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.bin");
        let opts = SaveOptions { portable: true, backup: true, compress: false };

        save(&profile, &path, opts).unwrap();
        let loaded: Profile = load_or_fail(&path, true).unwrap();

        prop_assert_eq!(loaded, profile);
    }

    #[test]
    fn idempotent_save_is_always_loadable(profile in profile_strategy()) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.bin");
        let opts = SaveOptions { portable: true, ..Default::default() };

        save(&profile, &path, opts.clone()).unwrap();
        save(&profile, &path, opts).unwrap();
        let loaded: Profile = load_or_fail(&path, true).unwrap();

        prop_assert_eq!(loaded, profile);
    }

    #[test]
    fn single_byte_tamper_is_rejected(profile in profile_strategy(), flip_seed in any::<u64>()) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.bin");
        save(&profile, &path, SaveOptions { portable: true, backup: false, ..Default::default() }).unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let idx = (flip_seed as usize) % bytes.len();
        bytes[idx] ^= 0x01;
        std::fs::write(&path, &bytes).unwrap();

        let result: Result<Profile, _> = load_or_fail(&path, true);
        prop_assert!(result.is_err());
    }
}

#[test]
fn type_binding_rejects_the_wrong_type() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.bin");

    #[derive(Debug, Serialize, Deserialize)]
    struct Other {
        x: i64,
    }

    save(&Other { x: 1 }, &path, SaveOptions { portable: true, ..Default::default() }).unwrap();
    let result: Result<Profile, _> = load_or_fail(&path, true);
    assert!(result.is_err(), "loading as an unrelated type must fail");
}

#[test]
fn missing_file_loads_the_default() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("does-not-exist.bin");
    let loaded: Profile = load_or_new(&path, true);
    assert_eq!(loaded, Profile::default());
}

#[test]
fn backup_fallback_recovers_the_prior_value() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.bin");
    let opts = SaveOptions { portable: true, backup: true, compress: true };

    let first = Profile { name: "first".into(), level: 1, tags: vec!["a".into()] };
    let second = Profile { name: "second".into(), level: 2, tags: vec!["b".into()] };

    save(&first, &path, opts.clone()).unwrap();
    save(&second, &path, opts).unwrap();

    // Corrupt the primary copy; the .bak sibling still holds `first`.
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[10] ^= 0xFF;
    std::fs::write(&path, &bytes).unwrap();

    let loaded: Profile = load_or_fail(&path, true).unwrap();
    assert_eq!(loaded, first);
}
