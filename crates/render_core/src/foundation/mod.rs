//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types and operations
//! - Growable byte regions
//! - Logging utilities

pub mod math;
pub mod memory;
pub mod logging;
