pub mod process_backend;
pub mod redlog_backend;
pub mod smtlib_printer;
