pub mod admission;
pub mod storage;
pub mod upload_service;
