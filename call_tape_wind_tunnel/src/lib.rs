// Copyright 2026 the Call Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for the call trace parser live in `benches/`.
