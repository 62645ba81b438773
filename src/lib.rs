pub mod config;
pub mod event_loop;
pub mod filter;
pub mod logging;
pub mod orchestrator;
pub mod process;

pub use logging::{
    init_logging, log_debug, log_file_path, report_error, report_os_error, report_warning,
    LogSettings,
};
