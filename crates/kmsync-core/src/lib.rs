//! Mod-installation planner and executor for KOTOR/TSL mods.
//!
//! Stability tiers, in the spirit of a library meant to be embedded:
//!
//! - **Stable**: [`model`], [`path`], [`fs`], [`diagnostics`], [`config`].
//!   These are the data model and the VFS contract; they change rarely.
//! - **Unstable**: [`archive`], [`vfs`], [`real_fs`], [`exec`],
//!   [`autogen`], [`validator`], [`cache`], [`context`], [`pre_resolve`].
//!   Internal algorithms here (the repair cascade, similarity scoring,
//!   shape classification) are expected to keep evolving.

pub mod archive;
pub mod autogen;
pub mod cache;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod exec;
pub mod fs;
pub mod model;
pub mod path;
pub mod pre_resolve;
pub mod real_fs;
pub mod validator;
pub mod vfs;

pub use config::PlanDocument;
pub use context::PlannerContext;
pub use diagnostics::{ArchiveError, CacheError, ExecSignal, PlanError};
pub use exec::{ExecContext, Executor};
pub use fs::PlannerFs;
pub use model::{Component, InstallPlan, Instruction, Option_};
pub use validator::{ValidationOutcome, Validator};
pub use vfs::Vfs;
