// Audio module - spectrum front-end, frame port and live capture

pub mod engine;
pub mod frame_port;
pub mod spectrum;

// Re-export commonly used types for convenience
#[cfg(not(target_os = "android"))]
pub use engine::AudioEngine;
pub use engine::{build_pipeline, spawn_detection_thread, CaptureState};
pub use frame_port::{FramePort, FrameReceiver, FrameSender, DEFAULT_PORT_CAPACITY};
pub use spectrum::SpectrumFrontend;
