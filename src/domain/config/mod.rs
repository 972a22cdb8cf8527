pub mod policy;
pub mod storage;
