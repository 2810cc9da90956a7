//! xcforge-lib: build orchestration for a static libgit2 xcframework.
//!
//! This crate provides the pieces used by the `xcforge` CLI:
//! - `platform` / `deps`: the fixed target and dependency records
//! - `layout`: where every artifact lives under the build root
//! - `graph`: the per-platform task graph
//! - `execute`: the incremental scheduler that runs stale tasks
//! - `link` / `fat` / `package`: merging and packaging the results

pub mod build_lock;
pub mod clean;
pub mod config;
pub mod consts;
pub mod deps;
pub mod execute;
pub mod fat;
pub mod graph;
pub mod layout;
pub mod link;
pub mod package;
pub mod pipeline;
pub mod platform;
pub mod util;
