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

//! CPU interpreter throughput benchmarks.

use criterion::{criterion_group, criterion_main, Criterion};
use epsx::core::Core;
use std::hint::black_box;

const fn addiu(rs: u32, rt: u32, imm: u32) -> u32 {
    (0x09 << 26) | (rs << 21) | (rt << 16) | (imm & 0xFFFF)
}

const fn addu(rs: u32, rt: u32, rd: u32) -> u32 {
    (rs << 21) | (rt << 16) | (rd << 11) | 0x21
}

/// A tight arithmetic loop: add/accumulate then jump back.
fn arithmetic_core() -> Core {
    let mut core = Core::new(2 * 1024 * 1024).unwrap();
    let j_back = (0x02u32 << 26) | ((0x8000_0000u32 >> 2) & 0x03FF_FFFF);
    let program = [
        addiu(0, 1, 1),
        addu(1, 2, 2),
        addu(2, 3, 3),
        addiu(3, 4, 0x10),
        j_back,
        0, // delay slot
    ];
    for (i, word) in program.iter().enumerate() {
        core.bus_mut()
            .write32(0x8000_0000 + (i as u32) * 4, *word)
            .unwrap();
    }
    core.set_pc(0x8000_0000);
    core
}

/// Loads and stores hammering RAM.
fn memory_core() -> Core {
    let mut core = Core::new(2 * 1024 * 1024).unwrap();
    let lw = (0x23u32 << 26) | (2 << 16) | 0x1000;
    let sw = (0x2Bu32 << 26) | (2 << 16) | 0x1004;
    let j_back = (0x02u32 << 26) | ((0x8000_0000u32 >> 2) & 0x03FF_FFFF);
    let program = [lw, sw, j_back, 0];
    for (i, word) in program.iter().enumerate() {
        core.bus_mut()
            .write32(0x8000_0000 + (i as u32) * 4, *word)
            .unwrap();
    }
    core.set_pc(0x8000_0000);
    core
}

fn bench_step(c: &mut Criterion) {
    c.bench_function("step_arithmetic_loop", |b| {
        let mut core = arithmetic_core();
        b.iter(|| {
            for _ in 0..1000 {
                black_box(core.step());
            }
        });
    });

    c.bench_function("step_memory_loop", |b| {
        let mut core = memory_core();
        b.iter(|| {
            for _ in 0..1000 {
                black_box(core.step());
            }
        });
    });

    c.bench_function("step_with_batched_bus_tick", |b| {
        let mut core = arithmetic_core();
        core.set_bus_tick_batch(64);
        b.iter(|| {
            for _ in 0..1000 {
                black_box(core.step());
            }
        });
    });
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
