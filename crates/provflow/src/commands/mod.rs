pub mod blob;
pub mod cluster;
pub mod endpoint;
pub mod job;
pub mod network;
pub mod script;
pub mod storage;
pub mod vm;
