pub mod checks;


pub use checks::{
    CheckDetails, CheckOptions, CheckOutcome, CheckStatus, DatabasesCheck, DatabasesReachable,
    FilesAbsent, FilesAbsentCheck, FilesExist, FilesExistCheck, HealthCheck, HealthChecker,
    HealthReport, ItemCheck, ListCheck, ReportEntry,
};
