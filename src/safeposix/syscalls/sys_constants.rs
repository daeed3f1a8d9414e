// System related constants
#![allow(dead_code)]

// Environment variables read by ProcessConfig::from_env
pub const MAXFD_ENV: &str = "CAPPOSIX_MAXFD";
pub const VERBOSE_ENV: &str = "CAPPOSIX_VERBOSE";

pub const STDIN_FILENO: i32 = 0;
pub const STDOUT_FILENO: i32 = 1;
pub const STDERR_FILENO: i32 = 2;
