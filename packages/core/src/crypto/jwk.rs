//! JSON Web Key (RFC 7517) представления ключей
//!
//! Все ключи сохраняются и передаются как JWK, так же как их экспортирует
//! WebCrypto: EC-ключи P-256 (`kty: "EC"`) и симметричный ключ AES-GCM
//! (`kty: "oct"`). Координаты и скаляры - base64url без паддинга.

use crate::error::CryptoError;
use crate::utils::b64;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, Zeroizing};

pub const KTY_EC: &str = "EC";
pub const KTY_OCT: &str = "oct";
pub const CRV_P256: &str = "P-256";
pub const ALG_A256GCM: &str = "A256GCM";

/// Длина координаты/скаляра P-256 в байтах
pub const P256_FIELD_LENGTH: usize = 32;

/// Публичный EC ключ `{kty, crv, x, y}`
///
/// Лишние поля входящих JWK (`ext`, `key_ops`, `alg`) игнорируются.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicJwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
}

impl PublicJwk {
    /// Собрать JWK из SEC1 uncompressed точки (`0x04 || x || y`)
    pub fn from_uncompressed_point(point: &[u8]) -> Result<Self, CryptoError> {
        if point.len() != 1 + 2 * P256_FIELD_LENGTH || point[0] != 0x04 {
            return Err(CryptoError::InvalidInputError(
                "Expected an uncompressed P-256 point".to_string(),
            ));
        }
        let (x, y) = point[1..].split_at(P256_FIELD_LENGTH);
        Ok(Self {
            kty: KTY_EC.to_string(),
            crv: CRV_P256.to_string(),
            x: b64::encode_url(x),
            y: b64::encode_url(y),
        })
    }

    /// SEC1 uncompressed точка для импорта в примитивы
    pub fn to_uncompressed_point(&self) -> Result<Vec<u8>, CryptoError> {
        ensure_ec_p256(&self.kty, &self.crv)?;
        let x = decode_field(&self.x, "x")?;
        let y = decode_field(&self.y, "y")?;

        let mut point = Vec::with_capacity(1 + 2 * P256_FIELD_LENGTH);
        point.push(0x04);
        point.extend_from_slice(&x);
        point.extend_from_slice(&y);
        Ok(point)
    }

    /// Существенные поля совпадают (`kty`, `crv`, `x`, `y`)
    pub fn same_key(&self, other: &PublicJwk) -> bool {
        self.kty == other.kty && self.crv == other.crv && self.x == other.x && self.y == other.y
    }
}

/// Приватный EC ключ: публичные поля + скаляр `d`
#[derive(Clone, Serialize, Deserialize)]
pub struct PrivateJwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
    pub d: String,
}

impl PrivateJwk {
    pub fn new(public: PublicJwk, scalar: &[u8]) -> Self {
        Self {
            kty: public.kty,
            crv: public.crv,
            x: public.x,
            y: public.y,
            d: b64::encode_url(scalar),
        }
    }

    /// Публичная часть (приватный компонент `d` отброшен)
    pub fn public(&self) -> PublicJwk {
        PublicJwk {
            kty: self.kty.clone(),
            crv: self.crv.clone(),
            x: self.x.clone(),
            y: self.y.clone(),
        }
    }

    pub fn scalar(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        ensure_ec_p256(&self.kty, &self.crv)?;
        decode_field(&self.d, "d")
    }
}

impl Drop for PrivateJwk {
    fn drop(&mut self) {
        self.d.zeroize();
    }
}

impl fmt::Debug for PrivateJwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateJwk")
            .field("kty", &self.kty)
            .field("crv", &self.crv)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("d", &"<redacted>")
            .finish()
    }
}

/// Симметричный ключ AES-256-GCM `{kty: "oct", k, alg: "A256GCM"}`
#[derive(Clone, Serialize, Deserialize)]
pub struct SymmetricJwk {
    pub kty: String,
    pub k: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

impl SymmetricJwk {
    pub fn new(key: &[u8]) -> Self {
        Self {
            kty: KTY_OCT.to_string(),
            k: b64::encode_url(key),
            alg: Some(ALG_A256GCM.to_string()),
        }
    }

    pub fn key_bytes(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        if self.kty != KTY_OCT {
            return Err(CryptoError::KeyImportError(format!(
                "Expected kty \"oct\", got \"{}\"",
                self.kty
            )));
        }
        if let Some(alg) = &self.alg {
            if alg != ALG_A256GCM {
                return Err(CryptoError::KeyImportError(format!(
                    "Unsupported symmetric alg: {}",
                    alg
                )));
            }
        }
        b64::decode_url(&self.k)
            .map(Zeroizing::new)
            .map_err(CryptoError::KeyImportError)
    }
}

impl Drop for SymmetricJwk {
    fn drop(&mut self) {
        self.k.zeroize();
    }
}

impl fmt::Debug for SymmetricJwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricJwk")
            .field("kty", &self.kty)
            .field("k", &"<redacted>")
            .field("alg", &self.alg)
            .finish()
    }
}

fn ensure_ec_p256(kty: &str, crv: &str) -> Result<(), CryptoError> {
    if kty != KTY_EC {
        return Err(CryptoError::KeyImportError(format!(
            "Expected kty \"EC\", got \"{}\"",
            kty
        )));
    }
    if crv != CRV_P256 {
        return Err(CryptoError::KeyImportError(format!(
            "Expected crv \"P-256\", got \"{}\"",
            crv
        )));
    }
    Ok(())
}

fn decode_field(encoded: &str, name: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let bytes = Zeroizing::new(
        b64::decode_url(encoded)
            .map_err(|e| CryptoError::KeyImportError(format!("JWK field {}: {}", name, e)))?,
    );
    if bytes.len() != P256_FIELD_LENGTH {
        return Err(CryptoError::KeyImportError(format!(
            "JWK field {} must be {} bytes, got {}",
            name,
            P256_FIELD_LENGTH,
            bytes.len()
        )));
    }
    Ok(bytes)
}
