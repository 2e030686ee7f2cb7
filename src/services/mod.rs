pub mod image_processor;
pub mod ingest;
pub mod media_service;
pub mod storage;
