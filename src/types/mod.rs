pub mod raw_series;
pub mod retry;
pub mod site;
pub mod skip_report;
pub mod time_window;
