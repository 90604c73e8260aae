//! Binary on-disk encoding of session records and index entries.
//!
//! Uses bincode 2.x's serde integration with the standard configuration
//! (variable-length integer encoding). Role and permission sets travel as
//! sequences on the wire and come back as set containers; timestamps travel
//! as epoch milliseconds.

use crate::error::app_error::AppError;
use crate::session::model::Session;

/// Encode a session record to its on-disk byte form.
pub fn encode(session: &Session) -> Result<Vec<u8>, AppError> {
    bincode::serde::encode_to_vec(session, bincode::config::standard())
        .map_err(|e| AppError::codec("Failed to encode session record", e))
}

/// Decode a session record from its on-disk byte form.
pub fn decode(bytes: &[u8]) -> Result<Session, AppError> {
    let (session, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| AppError::codec("Failed to decode session record", e))?;
    Ok(session)
}

/// Encode a user index entry (the token list owned by one user).
pub fn encode_index(tokens: &[String]) -> Result<Vec<u8>, AppError> {
    bincode::serde::encode_to_vec(tokens, bincode::config::standard())
        .map_err(|e| AppError::codec("Failed to encode user index entry", e))
}

/// Decode a user index entry.
pub fn decode_index(bytes: &[u8]) -> Result<Vec<String>, AppError> {
    let (tokens, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| AppError::codec("Failed to decode user index entry", e))?;
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use std::collections::{BTreeMap, BTreeSet};

    fn sample() -> Session {
        Session {
            token: "00112233445566778899aabbccddeeff".to_string(),
            user_id: Some("6721f0a2c9d4e8b1a3f5c7d9".to_string()),
            permissions: ["posts.read", "posts.write", "comments.moderate"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            roles: ["editor", "moderator"].iter().map(|s| s.to_string()).collect(),
            data: BTreeMap::from([
                ("email".to_string(), "editor@example.com".to_string()),
                ("name".to_string(), "Ada".to_string()),
            ]),
            ip: "203.0.113.7".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            referer: "https://example.com/login".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap(),
            expires_at: Utc.with_ymd_and_hms(2025, 3, 2, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn record_round_trips_every_field() {
        let session = sample();
        let bytes = encode(&session).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn sets_survive_regardless_of_insertion_order() {
        let mut a = sample();
        a.roles = ["b", "a", "c"].iter().map(|s| s.to_string()).collect();
        let mut b = sample();
        b.roles = ["c", "a", "b"].iter().map(|s| s.to_string()).collect();

        let decoded_a = decode(&encode(&a).unwrap()).unwrap();
        let decoded_b = decode(&encode(&b).unwrap()).unwrap();
        assert_eq!(decoded_a.roles, decoded_b.roles);
        assert_eq!(decoded_a.roles.len(), 3);
    }

    #[test]
    fn reencoding_a_snapshot_is_byte_identical() {
        let session = sample();
        let first = encode(&session).unwrap();
        let second = encode(&decode(&first).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(decode(&[0xff, 0x00, 0x13, 0x37]).is_err());
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn index_entry_round_trips() {
        let tokens = vec!["aaa".to_string(), "bbb".to_string()];
        let bytes = encode_index(&tokens).unwrap();
        assert_eq!(decode_index(&bytes).unwrap(), tokens);

        let empty: Vec<String> = Vec::new();
        let bytes = encode_index(&empty).unwrap();
        assert!(decode_index(&bytes).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn arbitrary_sets_and_data_round_trip(
            permissions in proptest::collection::btree_set("[a-z.]{1,16}", 0..8),
            roles in proptest::collection::btree_set("[a-z]{1,12}", 0..6),
            data in proptest::collection::btree_map("[a-z_]{1,10}", ".{0,24}", 0..6),
        ) {
            let mut session = sample();
            session.permissions = permissions;
            session.roles = roles;
            session.data = data;

            let decoded = decode(&encode(&session).unwrap()).unwrap();
            prop_assert_eq!(decoded, session);
        }
    }
}
