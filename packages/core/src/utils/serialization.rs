// Сериализация

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

pub fn to_json_bytes<T: Serialize>(data: &T) -> Result<Vec<u8>, String> {
    serde_json::to_vec(data).map_err(|e| format!("Serialization failed: {}", e))
}

pub fn from_json_bytes<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, String> {
    serde_json::from_slice(bytes).map_err(|e| format!("Deserialization failed: {}", e))
}

/// Байты из JSON-массива `[1,2,3]` или из объекта с числовыми ключами
/// `{"0":1,"1":2,"2":3}` (так некоторые JS-кодировщики сериализуют `Uint8Array`).
pub fn bytes_from_array_or_map<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    struct BytesVisitor;

    impl<'de> Visitor<'de> for BytesVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a byte array or an object with numeric keys")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(byte) = seq.next_element::<u8>()? {
                out.push(byte);
            }
            Ok(out)
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut indexed: Vec<(usize, u8)> = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, u8>()? {
                let index = key
                    .parse::<usize>()
                    .map_err(|_| de::Error::custom(format!("non-numeric byte index: {}", key)))?;
                indexed.push((index, value));
            }
            indexed.sort_by_key(|(index, _)| *index);
            for (expected, (index, _)) in indexed.iter().enumerate() {
                if *index != expected {
                    return Err(de::Error::custom("byte indices are not contiguous"));
                }
            }
            Ok(indexed.into_iter().map(|(_, byte)| byte).collect())
        }
    }

    deserializer.deserialize_any(BytesVisitor)
}

/// Строка из JSON-строки или числа (`"42"` или `42`).
///
/// Идентификаторы бесед у издателей бывают числовыми.
pub fn string_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or an integer")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(value.to_string())
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(value.to_string())
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(IdVisitor)
}
