// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Save states: CPU architectural state plus RAM, serialized with
//! serde/bincode. Restoring reproduces the exact instruction sequence a
//! run would have produced from the snapshot point; device state is not
//! captured and comes back reset.

use serde::{Deserialize, Serialize};

use crate::core::error::EmulatorError;

/// Serialized machine state.
#[derive(Serialize, Deserialize, Clone)]
pub struct CoreSnapshot {
    /// Wall-clock stamp, informational only.
    pub created: String,
    pub pc: u32,
    pub next_pc: u32,
    pub regs: [u32; 32],
    pub hi: u32,
    pub lo: u32,
    pub cop0: [u32; 32],
    pub ram: Vec<u8>,
}

impl CoreSnapshot {
    pub fn new(
        regs: [u32; 32],
        pc: u32,
        next_pc: u32,
        hi: u32,
        lo: u32,
        cop0: [u32; 32],
        ram: Vec<u8>,
    ) -> Self {
        Self {
            created: chrono::Local::now().to_rfc3339(),
            pc,
            next_pc,
            regs,
            hi,
            lo,
            cop0,
            ram,
        }
    }

    /// Serialize to bytes.
    pub fn encode(&self) -> Result<Vec<u8>, EmulatorError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| EmulatorError::Snapshot(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, EmulatorError> {
        let (snapshot, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| EmulatorError::Snapshot(e.to_string()))?;
        Ok(snapshot)
    }
}
