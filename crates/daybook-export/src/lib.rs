//! Byte-stable export tree rendering and the export orchestrator.
//!
//! The renderer (`render_export`) is a pure function: `ExportInput ->
//! Map<relativePath, content>`. It never touches the database or the
//! filesystem. The orchestrator loads a run's rows out of `daybook-db`,
//! checks the export preconditions, and assembles an `ExportInput`. A
//! future filesystem layer (mirroring `xchecker_utils::atomic_write` in
//! spirit) is responsible for writing the rendered map to disk.

pub mod json;
pub mod orchestrator;
pub mod render;
pub mod text;
pub mod topics;
pub mod types;

pub use orchestrator::{build_export_input, export_run, ExportOptions};
pub use render::render_export;
pub use types::{
    ExportAtom, ExportBatchInput, ExportDayInput, ExportInput, FormatVersion, PreviousManifestInput,
    PreviousTopicSummary, PrivacyTier,
};
