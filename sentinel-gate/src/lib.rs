//! Change gates.
//!
//! - [`allowlist`]: the hard gate. `modified ⊆ allowed`, by exact string
//!   after [`normalize_path`], with opt-in wildcards.
//! - [`patterns`]: the soft gate. Keyword search over added diff lines.
//!   Best-effort and bypassable; callers must report it apart from the
//!   allowlist result.

pub mod allowlist;
pub mod patterns;

pub use allowlist::{check, is_wildcard, normalize_path, Allowlist, GateError, GateResult};
pub use patterns::{added_lines, PatternGate, PatternHit};
