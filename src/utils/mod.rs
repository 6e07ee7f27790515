//! # Utility Modules
//!
//! Small helpers shared across the Mowsy backend.
//!
//! ## Available Utilities
//!
//! - **Constants** (`constant`) - Application-wide configuration constants
//! - **Secrets** (`secret`) - Environment and `*_FILE` secret loading
//! - **Uploads** (`upload`) - Upload validation and object key generation
//! - **Validators** (`validator`) - Input validation utilities and regex patterns

pub mod constant;
pub mod secret;
pub mod upload;
pub mod validator;
