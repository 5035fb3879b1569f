use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use parking_lot::Mutex;
use rand::random;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use serde::{Deserialize, Serialize};
use tourplan_db::{Slot, Store};

use crate::error::Error;

const ENCRYPTION_KEY_ACCOUNT: &str = "session_token_key_v1";
pub const DEFAULT_DISPLAY_NAME: &str = "User";

/// What a signed-in session remembers about its user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
    pub display_name: Option<String>,
}

impl Credentials {
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn display_name_or_default(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TokenEncryptionMethod {
    None,
    #[serde(rename = "keyring_aes_256_gcm_v1")]
    KeyringAes256GcmV1,
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenEnvelope {
    method: TokenEncryptionMethod,
    payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nonce: Option<String>,
}

/// Token and display-name persistence on top of the session slots.
///
/// Release builds seal the token with a key kept in the OS keyring; debug
/// builds store it in a plaintext envelope.
#[derive(Clone)]
pub struct CredentialStore {
    service: String,
    store: Arc<Mutex<Store>>,
}

impl CredentialStore {
    pub fn new(service: impl Into<String>, store: Arc<Mutex<Store>>) -> Self {
        Self {
            service: service.into(),
            store,
        }
    }

    /// Read both slots. A token that cannot be decoded is treated as absent.
    pub fn load(&self) -> Result<Credentials, Error> {
        let (raw_token, display_name) = {
            let mut store = self.store.lock();
            let slots = store.slots();
            (slots.get(Slot::Token)?, slots.get(Slot::DisplayName)?)
        };

        let token = match raw_token {
            Some(raw) => match self.decode_token(&raw) {
                Ok(token) => Some(token),
                Err(err) => {
                    tracing::warn!(error = %err, "stored token is unreadable; treating session as signed out");
                    None
                }
            },
            None => None,
        };

        Ok(Credentials {
            token,
            display_name,
        })
    }

    pub fn save_token(&self, token: &str) -> Result<(), Error> {
        let encoded = self.encode_token(token)?;
        let mut store = self.store.lock();
        store.slots().set(Slot::Token, &encoded)?;
        Ok(())
    }

    pub fn save_display_name(&self, name: &str) -> Result<(), Error> {
        let mut store = self.store.lock();
        store.slots().set(Slot::DisplayName, name)?;
        Ok(())
    }

    /// Forget the token and display name. History is left alone.
    pub fn clear(&self) -> Result<(), Error> {
        let mut store = self.store.lock();
        store
            .slots()
            .remove_all(&[Slot::Token, Slot::DisplayName])?;
        Ok(())
    }

    fn encode_token(&self, token: &str) -> Result<String, Error> {
        let envelope = match default_write_method() {
            TokenEncryptionMethod::None => TokenEnvelope {
                method: TokenEncryptionMethod::None,
                payload: token.to_string(),
                nonce: None,
            },
            TokenEncryptionMethod::KeyringAes256GcmV1 => {
                let cipher = TokenCipher::new(&self.load_or_create_encryption_key()?)?;
                let nonce: [u8; 12] = random();
                let sealed = cipher.seal(nonce, token.as_bytes())?;
                TokenEnvelope {
                    method: TokenEncryptionMethod::KeyringAes256GcmV1,
                    payload: STANDARD_NO_PAD.encode(sealed),
                    nonce: Some(STANDARD_NO_PAD.encode(nonce)),
                }
            }
        };

        Ok(serde_json::to_string(&envelope)?)
    }

    fn decode_token(&self, raw: &str) -> Result<String, Error> {
        let Ok(envelope) = serde_json::from_str::<TokenEnvelope>(raw) else {
            // Bare token written by an older client.
            return Ok(raw.to_string());
        };

        match envelope.method {
            TokenEncryptionMethod::None => Ok(envelope.payload),
            TokenEncryptionMethod::KeyringAes256GcmV1 => {
                let nonce_raw = envelope
                    .nonce
                    .ok_or_else(|| Error::Other("missing token nonce".to_string()))?;
                let nonce = decode_fixed::<12>(&nonce_raw, "token nonce")?;
                let sealed = STANDARD_NO_PAD
                    .decode(&envelope.payload)
                    .map_err(|err| Error::Other(format!("invalid token ciphertext encoding: {err}")))?;
                let cipher = TokenCipher::new(&self.load_encryption_key()?)?;
                let plaintext = cipher.open(nonce, sealed)?;
                String::from_utf8(plaintext)
                    .map_err(|err| Error::Other(format!("invalid token plaintext: {err}")))
            }
        }
    }

    fn load_or_create_encryption_key(&self) -> Result<[u8; 32], Error> {
        let entry = keyring::Entry::new(&self.service, ENCRYPTION_KEY_ACCOUNT)?;

        match entry.get_password() {
            Ok(encoded) => decode_fixed::<32>(&encoded, "encryption key"),
            Err(keyring::Error::NoEntry) => {
                let key: [u8; 32] = random();
                entry.set_password(&STANDARD_NO_PAD.encode(key))?;
                Ok(key)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn load_encryption_key(&self) -> Result<[u8; 32], Error> {
        let entry = keyring::Entry::new(&self.service, ENCRYPTION_KEY_ACCOUNT)?;
        decode_fixed::<32>(&entry.get_password()?, "encryption key")
    }
}

fn default_write_method() -> TokenEncryptionMethod {
    #[cfg(debug_assertions)]
    {
        TokenEncryptionMethod::None
    }

    #[cfg(not(debug_assertions))]
    {
        TokenEncryptionMethod::KeyringAes256GcmV1
    }
}

fn decode_fixed<const N: usize>(encoded: &str, what: &str) -> Result<[u8; N], Error> {
    let bytes = STANDARD_NO_PAD
        .decode(encoded)
        .map_err(|err| Error::Other(format!("invalid {what} encoding: {err}")))?;
    bytes
        .try_into()
        .map_err(|_| Error::Other(format!("invalid {what} length; expected {N} bytes")))
}

/// AES-256-GCM bound to the token slot as associated data.
struct TokenCipher {
    key: LessSafeKey,
}

impl TokenCipher {
    fn new(key: &[u8; 32]) -> Result<Self, Error> {
        let unbound = UnboundKey::new(&AES_256_GCM, key)
            .map_err(|_| Error::Other("invalid encryption key material".to_string()))?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
        })
    }

    fn aad() -> Aad<&'static [u8]> {
        Aad::from(Slot::Token.key().as_bytes())
    }

    fn seal(&self, nonce: [u8; 12], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let mut in_out = plaintext.to_vec();
        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Self::aad(), &mut in_out)
            .map_err(|_| Error::Other("failed to encrypt token".to_string()))?;
        Ok(in_out)
    }

    fn open(&self, nonce: [u8; 12], mut sealed: Vec<u8>) -> Result<Vec<u8>, Error> {
        let plaintext = self
            .key
            .open_in_place(Nonce::assume_unique_for_key(nonce), Self::aad(), &mut sealed)
            .map_err(|_| Error::Other("failed to decrypt token".to_string()))?;
        Ok(plaintext.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use tourplan_db::{Slot, Store};

    use super::{CredentialStore, Credentials, TokenCipher};

    fn credential_store() -> (CredentialStore, Arc<Mutex<Store>>) {
        let store = Arc::new(Mutex::new(Store::open_in_memory().expect("open store")));
        (
            CredentialStore::new("tourplan-test", Arc::clone(&store)),
            store,
        )
    }

    #[test]
    fn save_then_load_round_trips() {
        let (credentials, _) = credential_store();
        credentials.save_token("tok-123").expect("save token");
        credentials.save_display_name("Ada").expect("save name");

        let loaded = credentials.load().expect("load");
        assert_eq!(loaded.token.as_deref(), Some("tok-123"));
        assert_eq!(loaded.display_name_or_default(), "Ada");
        assert!(loaded.is_authenticated());
    }

    #[test]
    fn bare_legacy_token_is_readable() {
        let (credentials, store) = credential_store();
        store
            .lock()
            .slots()
            .set(Slot::Token, "legacy-token")
            .expect("set");

        let loaded = credentials.load().expect("load");
        assert_eq!(loaded.token.as_deref(), Some("legacy-token"));
    }

    #[test]
    fn undecodable_token_degrades_to_signed_out() {
        let (credentials, store) = credential_store();
        store
            .lock()
            .slots()
            .set(
                Slot::Token,
                r#"{"method":"keyring_aes_256_gcm_v1","payload":"AAAA"}"#,
            )
            .expect("set");

        let loaded = credentials.load().expect("load");
        assert_eq!(loaded.token, None);
        assert!(!loaded.is_authenticated());
    }

    #[test]
    fn clear_keeps_history_slot() {
        let (credentials, store) = credential_store();
        credentials.save_token("tok").expect("save");
        credentials.save_display_name("Ada").expect("save");
        store
            .lock()
            .slots()
            .set(Slot::History, "[]")
            .expect("set history");

        credentials.clear().expect("clear");

        assert_eq!(credentials.load().expect("load"), Credentials::default());
        assert_eq!(
            store.lock().slots().get(Slot::History).expect("get").as_deref(),
            Some("[]")
        );
    }

    #[test]
    fn display_name_defaults_when_blank() {
        let credentials = Credentials {
            token: None,
            display_name: Some("   ".to_string()),
        };
        assert_eq!(credentials.display_name_or_default(), "User");
    }

    #[test]
    fn cipher_rejects_tampered_payload() {
        let cipher = TokenCipher::new(&[7u8; 32]).expect("cipher");
        let nonce = [1u8; 12];
        let mut sealed = cipher.seal(nonce, b"secret").expect("seal");
        assert_eq!(cipher.open(nonce, sealed.clone()).expect("open"), b"secret");

        sealed[0] ^= 0xff;
        assert!(cipher.open(nonce, sealed).is_err());
    }
}
