//! Property-based tests for quill core

use proptest::prelude::*;
use quill_core::auth::{TokenError, TokenService};
use quill_core::test_utils::*;
use quill_core::*;
use std::time::Duration;

const SECRET: [u8; 32] = [0x5a; 32];
const NOW: i64 = 1_700_000_000;

proptest! {
    #[test]
    fn props_versions_advance_by_one_per_accepted_update(
        // Each step submits the current version (true) or a stale guess (false)
        steps in prop::collection::vec((any::<bool>(), 0u64..3), 1..40)
    ) {
        let store = MemoryNoteStore::new();
        let owner = test_principal(1, "owner");
        let note = store.insert(owner.id, NewNote {
            title: "t".to_string(),
            content: "c".to_string(),
        });
        let controller = ConcurrencyController::new(&store);

        let mut expected = Version::INITIAL;
        for (fresh, lag) in steps {
            let submitted = if fresh {
                expected
            } else {
                Version::new(expected.get().saturating_sub(lag + 1))
            };
            let request = NoteUpdate {
                version: submitted,
                patch: NotePatch { title: Some(format!("v{}", submitted)), content: None },
            };

            match controller.update(&owner, note.id, &request) {
                Ok(updated) => {
                    prop_assert_eq!(submitted, expected);
                    prop_assert_eq!(updated.version.get(), expected.get() + 1);
                    expected = updated.version;
                }
                Err(QuillError::VersionConflict { current }) => {
                    prop_assert_ne!(submitted, expected);
                    prop_assert_eq!(current, expected);
                }
                Err(other) => prop_assert!(false, "unexpected error {:?}", other),
            }
        }

        let stored = store.load_owned(owner.id, note.id).unwrap().unwrap();
        prop_assert_eq!(stored.version, expected);
    }

    #[test]
    fn props_single_byte_mutation_never_verifies(
        subject in "[0-9]{1,8}",
        position in any::<prop::sample::Index>(),
        replacement in prop::sample::select(b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.".to_vec()),
    ) {
        let tokens = TokenService::hs256(SECRET).unwrap();
        let token = tokens.issue_at(&subject, Duration::from_secs(600), NOW).unwrap();

        let mut bytes = token.clone().into_bytes();
        let index = position.index(bytes.len());
        prop_assume!(bytes[index] != replacement);
        bytes[index] = replacement;
        let mutated = String::from_utf8(bytes).unwrap();

        // Base64 trailing bits can make a mutation decode to the same bytes.
        prop_assume!(!decodes_identically(&token, &mutated));

        prop_assert!(tokens.verify_at(&mutated, NOW).is_err());
    }

    #[test]
    fn props_token_valid_until_expiry(
        ttl in 1u64..100_000,
        elapsed in 0u64..200_000,
    ) {
        let tokens = TokenService::hs256(SECRET).unwrap();
        let token = tokens.issue_at("7", Duration::from_secs(ttl), NOW).unwrap();
        let at = NOW + elapsed as i64;

        let result = tokens.verify_at(&token, at);
        if elapsed < ttl {
            prop_assert_eq!(result.unwrap().sub, "7");
        } else {
            prop_assert_eq!(result, Err(TokenError::Expired));
        }
    }
}

fn decodes_identically(original: &str, mutated: &str) -> bool {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let original: Vec<&str> = original.split('.').collect();
    let mutated: Vec<&str> = mutated.split('.').collect();
    if original.len() != mutated.len() {
        return false;
    }

    original.iter().zip(&mutated).all(|(a, b)| {
        match (URL_SAFE_NO_PAD.decode(a), URL_SAFE_NO_PAD.decode(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    })
}
