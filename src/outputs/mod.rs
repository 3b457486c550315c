//! Run report output.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── 2026-10-18/
//! │   ├── 09-00-00.json
//! │   └── 12-00-00.json
//! └── latest.json          # copy of the most recent run
//! ```

pub mod json;
