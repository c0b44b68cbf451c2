// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod cluster;    // worker ids, membership registry
pub mod context;    // explicit process-wide context
pub mod errors;     // error handling
pub mod observability;
pub mod processors; // processor hierarchy + variant registration
pub mod scope;      // the scope lattice: meet, taints, builder, wire form
