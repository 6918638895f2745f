pub mod files;
pub mod init;
pub mod sites;
