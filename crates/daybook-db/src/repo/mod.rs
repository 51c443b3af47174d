pub mod atom;
pub mod classify_run;
pub mod filter_profile;
pub mod import_batch;
pub mod job;
pub mod output;
pub mod prompt;
pub mod raw_entry;
pub mod run;

pub use atom::AtomRepo;
pub use classify_run::{ClassifyRunRepo, LabelRepo};
pub use filter_profile::FilterProfileRepo;
pub use import_batch::ImportBatchRepo;
pub use job::JobRepo;
pub use output::OutputRepo;
pub use prompt::PromptRepo;
pub use raw_entry::RawEntryRepo;
pub use run::RunRepo;
