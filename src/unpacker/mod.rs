pub mod archive_name;
pub mod driver;
pub mod report;
pub mod tar_extractor;

pub use archive_name::{ArchiveName, SplitSelector};
pub use driver::{ArchiveUnpacker, EventCallback};
pub use report::{
    ArchiveOutcome, DiskUsage, EntryFailure, PlannedArchive, UnpackEvent, UnpackPlan, UnpackReport,
};
pub use tar_extractor::TarExtractor;
