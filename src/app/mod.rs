pub mod load_use_case;
pub mod report_use_case;

pub use load_use_case::{LoadSummary, LoadUseCase};
pub use report_use_case::{ReportSummary, ReportUseCase};
