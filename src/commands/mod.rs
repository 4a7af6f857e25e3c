pub mod diff;
pub mod extract;
pub mod init;
pub mod merge;
