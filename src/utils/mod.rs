pub mod diagnostic_log;
pub mod path_utils;
