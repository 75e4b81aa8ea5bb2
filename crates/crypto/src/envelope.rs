//! Passwort-basierte Envelope-Verschluesselung
//!
//! Schuetzt beliebige Byte-Payloads mit einem aus einem Passwort abgeleiteten
//! Schluessel.
//!
//! ## Format (Base64, Standard-Alphabet mit Padding)
//! ```text
//! [salt(16)] [iv(16)] [ciphertext (AES-256-CBC, PKCS#7)]
//! ```
//!
//! ## Schluesselableitung
//! ```text
//! key = PBKDF2-HMAC-SHA256(passwort, salt, runden, 32)
//! ```
//!
//! Salt und IV werden pro Aufruf frisch aus dem Betriebssystem-RNG gezogen.
//! Es gibt keinen Integritaetsschutz (siehe Crate-Dokumentation).

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{CryptoError, CryptoResult};
use crate::types::{DerivedKey, Envelope, KdfParameter, BLOCK_LEN, IV_LEN, KEY_LEN, SALT_LEN};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Leitet einen 32-Byte-Schluessel aus Passwort und Salt ab
///
/// Deterministisch fuer ein gegebenes (Passwort, Salt, Runden)-Tripel.
/// CPU-lastig – im Server nur ueber den [`crate::KdfPool`] aufrufen.
pub fn derive_key(password: &[u8], salt: &[u8], params: &KdfParameter) -> DerivedKey {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password, salt, params.runden, &mut key);
    DerivedKey::new(key)
}

/// Verschluesselt einen Payload und gibt den Base64-Envelope zurueck
///
/// Zwei Aufrufe mit identischen Argumenten liefern verschiedene Envelopes.
pub fn encrypt_envelope(
    plaintext: &[u8],
    password: &str,
    params: &KdfParameter,
) -> CryptoResult<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(password.as_bytes(), &salt, params);
    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
        .map_err(|e| CryptoError::Verschluesselung(e.to_string()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let envelope = Envelope {
        salt,
        iv,
        ciphertext,
    };
    Ok(STANDARD.encode(envelope.to_bytes()))
}

/// Entschluesselt einen Base64-Envelope
///
/// # Fehler
/// - `Eingabe` bei ungueltigem Base64 oder weniger als 32 dekodierten Bytes
/// - `Entschluesselung` bei falschem Passwort, Padding-Fehler oder einem
///   Ciphertext der kein positives Vielfaches der Blockgroesse ist
pub fn decrypt_envelope(
    envelope: &str,
    password: &str,
    params: &KdfParameter,
) -> CryptoResult<Vec<u8>> {
    let bytes = STANDARD
        .decode(envelope.trim())
        .map_err(|e| CryptoError::eingabe(format!("Kein gueltiges Base64: {e}")))?;
    let envelope = Envelope::from_bytes(&bytes)?;

    if envelope.ciphertext.is_empty() || envelope.ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CryptoError::Entschluesselung);
    }

    let key = derive_key(password.as_bytes(), &envelope.salt, params);
    let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), &envelope.iv)
        .map_err(|_| CryptoError::Entschluesselung)?;

    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&envelope.ciphertext)
        .map_err(|_| CryptoError::Entschluesselung)
}

/// Verschluesselt einen UTF-8-String
pub fn encrypt_string(plaintext: &str, password: &str, params: &KdfParameter) -> CryptoResult<String> {
    encrypt_envelope(plaintext.as_bytes(), password, params)
}

/// Entschluesselt einen Envelope zu einem UTF-8-String
///
/// Nicht-UTF-8-Klartext zaehlt als Entschluesselungsfehler.
pub fn decrypt_string(envelope: &str, password: &str, params: &KdfParameter) -> CryptoResult<String> {
    let bytes = decrypt_envelope(envelope, password, params)?;
    String::from_utf8(bytes).map_err(|_| CryptoError::Entschluesselung)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
