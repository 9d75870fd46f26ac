pub mod background_model;
pub mod blob;
pub mod blob_detector;
pub mod breach_state;
pub mod frame_differencer;
pub mod image_helper;
pub mod region;
pub mod region_analyzer;
pub mod signal_fusion;
