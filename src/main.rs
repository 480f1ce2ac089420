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

//! epsx CLI entry point.
//!
//! The binary is a thin shell: parse arguments, set up bootstrap logging
//! (the core's own logging goes through injected sinks), then hand off to
//! the harness run loop.

mod harness;

use clap::Parser;

fn main() {
    // Environment defaults (EPSX_* variables, RUST_LOG) before parsing.
    dotenvy::dotenv().ok();

    // Bootstrap logger for messages emitted before the core's sinks exist.
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = harness::Args::parse();
    std::process::exit(harness::run(args));
}
