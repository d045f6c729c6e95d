//! Audited manual overrides for generated measure code
//!
//! Reviewers sometimes correct generated CQL or SQL by hand. Each correction is
//! an [`Override`] keyed by measure, component and [`TargetFormat`], carrying
//! an append-only trail of [`OverrideNote`]s. [`apply_overrides`] layers the
//! applicable records over freshly generated text as comment blocks; the
//! generated text itself is left intact.

mod error;
mod key;
mod patch;
mod record;
mod store;

pub use error::OverrideError;
pub use key::{OverrideKey, TargetFormat};
pub use patch::{PatchResult, apply_overrides};
pub use record::{Override, OverrideNote};
pub use store::{InMemoryOverrideStore, OverrideStore, load_overrides, parse_overrides};
