//! Evidence packs, the threshold gate, and optional HTTP traffic capture
//! (spec.md §4.11-§4.13). The evaluation engine itself lives in `aipo-core`;
//! this crate owns everything a run produces for an operator to inspect or
//! feed into a release decision.

pub mod gate;
pub mod har;
pub mod pack;
pub mod reason_codes;
pub mod sarif;

pub use gate::{GateEngine, GateResult};
pub use har::{HarEntry, TrafficCapture};
pub use pack::{EvidencePack, Manifest, ManifestEntry, PackError, VerifyError, VerifyReport};
pub use reason_codes::{ReasonCode, RunOutcome, EXIT_CONFIG_ERROR, EXIT_SUCCESS, EXIT_TEST_FAILURE};
pub use sarif::{write_sarif, write_sarif_with_limit, SarifWriteOutcome, DEFAULT_SARIF_MAX_RESULTS};
