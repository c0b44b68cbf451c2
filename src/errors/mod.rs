// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod build;
mod registry;
mod wire;

pub use build::ScopeBuildError;
pub use registry::RegistryError;
pub use wire::WireError;
