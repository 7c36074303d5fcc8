pub mod config;
pub mod report;
pub mod scanner;
pub mod wordlist;

pub use config::ScanConfig;
pub use report::ReportFormat;
pub use scanner::{DEFAULT_METHODS, Scanner, Stats};
pub use wordlist::BuiltinWordlist;
