//! Serde form for float variables
//!
//! JSON has no literal for infinities or NaN and serde_json writes them as
//! `null`. Finite values stay plain numbers; non-finite ones are written as
//! the hex string of their bit pattern (`"0x7f800000"`), which keeps the sign
//! and NaN payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub(crate) trait PortableFloat: Copy + Serialize + DeserializeOwned {
    fn finite(self) -> bool;
    fn to_hex(self) -> String;
    fn from_hex(digits: &str) -> Option<Self>;
}

impl PortableFloat for f32 {
    fn finite(self) -> bool {
        self.is_finite()
    }

    fn to_hex(self) -> String {
        format!("{:#010x}", self.to_bits())
    }

    fn from_hex(digits: &str) -> Option<Self> {
        u32::from_str_radix(digits, 16).ok().map(f32::from_bits)
    }
}

impl PortableFloat for f64 {
    fn finite(self) -> bool {
        self.is_finite()
    }

    fn to_hex(self) -> String {
        format!("{:#018x}", self.to_bits())
    }

    fn from_hex(digits: &str) -> Option<Self> {
        u64::from_str_radix(digits, 16).ok().map(f64::from_bits)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Repr<T> {
    Number(T),
    Bits(String),
}

impl<T: PortableFloat> Repr<T> {
    fn encode(value: T) -> Self {
        if value.finite() {
            Repr::Number(value)
        } else {
            Repr::Bits(value.to_hex())
        }
    }

    fn decode<E: serde::de::Error>(self) -> Result<T, E> {
        match self {
            Repr::Number(value) => Ok(value),
            Repr::Bits(text) => text
                .strip_prefix("0x")
                .and_then(T::from_hex)
                .ok_or_else(|| E::custom(format!("invalid float bit pattern '{}'", text))),
        }
    }
}

/// `#[serde(with = "...")]` for a single float
pub(crate) mod scalar {
    use super::*;

    pub(crate) fn serialize<T: PortableFloat, S: Serializer>(
        value: &T,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        Repr::encode(*value).serialize(serializer)
    }

    pub(crate) fn deserialize<'de, T: PortableFloat, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<T, D::Error> {
        Repr::<T>::deserialize(deserializer)?.decode()
    }
}

/// `#[serde(with = "...")]` for a float column
pub(crate) mod vec {
    use super::*;

    #[allow(clippy::ptr_arg)]
    pub(crate) fn serialize<T: PortableFloat, S: Serializer>(
        values: &Vec<T>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| Repr::encode(*v)))
    }

    pub(crate) fn deserialize<'de, T: PortableFloat, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<T>, D::Error> {
        Vec::<Repr<T>>::deserialize(deserializer)?
            .into_iter()
            .map(|repr| repr.decode::<D::Error>())
            .collect()
    }
}
