//! Shared-library closure discovery and relocation.
//!
//! This crate provides functionality to:
//!
//! 1. Locate a root library and walk its linkage into a full [`DependencyGraph`].
//! 2. Copy the closure into a flat bundle directory and describe it ([`ClosureExporter`]).
//! 3. Rewrite install names and sonames so that the bundle loads from itself
//!    ([`VersionAliasMap`], [`LinkageRewriter`]).
//! 4. Re-sign and verify modified Mach-O files ([`SignatureManager`]).
//!
//! All platform tooling is invoked through a [`depbundle_process::ProcessRunner`].

pub use alias::{AliasConflict, LibraryName, VersionAliasMap};
pub use error::Error;
pub use export::{BundleMetadata, ClosureExporter, METADATA_FILE, Report, detect_version};
pub use graph::{DependencyGraph, GraphBuilder, LibraryNode};
pub use inspect::{Inspection, InspectionStatus, LinkageInspector, LinkageReference};
pub use locate::{LibraryRequest, homebrew_prefix, locate_library};
pub use relocate::{
    RelocateOptions, RelocationFailure, RelocationSummary, SignMode, bundle_libraries,
    relocate_directory,
};
pub use rewrite::{ChangeKind, LinkageRewriter, ReferenceChange, RewriteRecord};
pub use sign::{SignatureFailure, SignatureManager};

mod alias;
mod error;
mod export;
mod graph;
mod inspect;
mod locate;
mod relocate;
mod rewrite;
mod sign;
