// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod extraction_test;
pub mod helpers;
pub mod network_bridge_test;
pub mod session_test;
