// Copyright 2026 the Call Tape Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conformance tests for the call trace format live in `tests/`.
