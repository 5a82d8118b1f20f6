//! Custom scalar functions registered on every handle.
//!
//! - `uuid4()`: random version 4 UUID.
//! - `crypto_hash(x)`: deterministic 32-digit hex content hash of `x`.
//! - `uuid_str(x)`: reshapes 32 hex digits into the dashed UUID layout.
//!
//! The formatter renders `ToGuid(x)` as `uuid_str(crypto_hash(x))`.

use rusqlite::Connection;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Lower-case hex encoding.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// First 16 bytes of the SHA-256 digest of `bytes`, hex encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    to_hex(&digest[..16])
}

/// Reshapes a hex digest or UUID string into `8-4-4-4-12` layout.
///
/// Returns `None` when `value` is neither 32 hex digits nor an already
/// dashed UUID.
///
/// # Examples
///
/// ```
/// use localsql_sqlite::functions::uuid_str;
///
/// assert_eq!(
///     uuid_str("0123456789abcdef0123456789abcdef").as_deref(),
///     Some("01234567-89ab-cdef-0123-456789abcdef")
/// );
/// assert_eq!(uuid_str("not a uuid"), None);
/// ```
pub fn uuid_str(value: &str) -> Option<String> {
    let digits: String = value.chars().filter(|c| *c != '-').collect();
    let dashed = value.len() == 36;
    if digits.len() != 32 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    if dashed && Uuid::parse_str(value).is_err() {
        return None;
    }
    if !dashed && digits.len() != value.len() {
        return None;
    }
    Some(format!(
        "{}-{}-{}-{}-{}",
        &digits[0..8],
        &digits[8..12],
        &digits[12..16],
        &digits[16..20],
        &digits[20..32]
    ))
}

fn argument_bytes(ctx: &Context<'_>) -> Option<Vec<u8>> {
    match ctx.get_raw(0) {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string().into_bytes()),
        ValueRef::Real(f) => Some(f.to_string().into_bytes()),
        ValueRef::Text(text) => Some(text.to_vec()),
        ValueRef::Blob(blob) => Some(blob.to_vec()),
    }
}

/// Registers `uuid4`, `crypto_hash` and `uuid_str` on `conn`.
pub(crate) fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function("uuid4", 0, FunctionFlags::SQLITE_UTF8, |_ctx| {
        Ok(Uuid::new_v4().to_string())
    })?;

    conn.create_scalar_function(
        "crypto_hash",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(argument_bytes(ctx).map(|bytes| content_hash(&bytes))),
    )?;

    conn.create_scalar_function(
        "uuid_str",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let Some(bytes) = argument_bytes(ctx) else {
                return Ok(None);
            };
            let text = String::from_utf8_lossy(&bytes);
            uuid_str(&text).map(Some).ok_or_else(|| {
                rusqlite::Error::UserFunctionError(format!("invalid UUID value: {text}").into())
            })
        },
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_deterministic() {
        let first = content_hash(b"Hello");
        assert_eq!(first.len(), 32);
        assert_eq!(first, content_hash(b"Hello"));
        assert_ne!(first, content_hash(b"hello"));
    }

    #[test]
    fn test_uuid_str_accepts_dashed_uuid() {
        let id = "01234567-89ab-cdef-0123-456789abcdef";
        assert_eq!(uuid_str(id).as_deref(), Some(id));
    }

    #[test]
    fn test_registered_functions() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();

        let random: String = conn.query_row("SELECT uuid4()", [], |r| r.get(0)).unwrap();
        assert!(Uuid::parse_str(&random).is_ok());

        let guid: String = conn
            .query_row("SELECT uuid_str(crypto_hash('Hello'))", [], |r| r.get(0))
            .unwrap();
        assert_eq!(guid, uuid_str(&content_hash(b"Hello")).unwrap());

        let null: Option<String> = conn
            .query_row("SELECT uuid_str(crypto_hash(NULL))", [], |r| r.get(0))
            .unwrap();
        assert_eq!(null, None);

        assert!(conn
            .query_row("SELECT uuid_str('xyz')", [], |r| r.get::<_, String>(0))
            .is_err());
    }
}
