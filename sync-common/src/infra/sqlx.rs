// This file is part of cardano-wallet-sync.
// Copyright (C) 2025 Sundial Labs
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use derive_more::{From, Into};
use sqlx::{
    Decode, Encode, Postgres, Type,
    encode::IsNull,
    error::BoxDynError,
    postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef},
};

/// Token amounts exceed i64; stored as 16-byte big-endian BYTEA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, From, Into)]
pub struct U128BeBytes(pub u128);

impl Type<Postgres> for U128BeBytes {
    fn type_info() -> PgTypeInfo {
        <&[u8] as Type<Postgres>>::type_info()
    }
}

impl Encode<'_, Postgres> for U128BeBytes {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.extend_from_slice(&self.0.to_be_bytes());
        Ok(IsNull::No)
    }
}

impl Decode<'_, Postgres> for U128BeBytes {
    fn decode(value: PgValueRef<'_>) -> Result<Self, BoxDynError> {
        let bytes = <&[u8] as Decode<Postgres>>::decode(value)?;
        let bytes = <[u8; 16]>::try_from(bytes)
            .map_err(|_| format!("expected 16 bytes, got {}", bytes.len()))?;

        Ok(Self(u128::from_be_bytes(bytes)))
    }
}

/// Signed counterpart of [U128BeBytes], two's complement big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, From, Into)]
pub struct I128BeBytes(pub i128);

impl Type<Postgres> for I128BeBytes {
    fn type_info() -> PgTypeInfo {
        <&[u8] as Type<Postgres>>::type_info()
    }
}

impl Encode<'_, Postgres> for I128BeBytes {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        buf.extend_from_slice(&self.0.to_be_bytes());
        Ok(IsNull::No)
    }
}

impl Decode<'_, Postgres> for I128BeBytes {
    fn decode(value: PgValueRef<'_>) -> Result<Self, BoxDynError> {
        let bytes = <&[u8] as Decode<Postgres>>::decode(value)?;
        let bytes = <[u8; 16]>::try_from(bytes)
            .map_err(|_| format!("expected 16 bytes, got {}", bytes.len()))?;

        Ok(Self(i128::from_be_bytes(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u128_round_trip() {
        for n in [0, 1, u64::MAX as u128 + 1, u128::MAX] {
            let bytes = U128BeBytes(n).0.to_be_bytes();
            assert_eq!(u128::from_be_bytes(bytes), n);
        }
    }

    #[test]
    fn test_i128_round_trip() {
        for n in [0, -1, i128::MIN, i128::MAX, -28_170_000] {
            let bytes = I128BeBytes(n).0.to_be_bytes();
            assert_eq!(i128::from_be_bytes(bytes), n);
        }
    }
}
