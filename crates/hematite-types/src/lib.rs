//! # Hematite Shared Types
//!
//! Chain entities and proof-of-work arithmetic shared by every hematite
//! subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every cross-subsystem chain type is
//!   defined here.
//! - **Content Addressing**: transactions and blocks are immutable once
//!   constructed and identified by their double-SHA256 hash, which is
//!   computed lazily and cached.
//! - **No Embedded Validation State**: validation metadata never lives on
//!   the shared records; consumers keep it in side tables.

pub mod entities;
pub mod work;

pub use entities::*;
