pub mod authorization;
pub mod cli;
pub mod controller;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod settings;

pub use controller::{AppError, run};
pub use pipeline::{
    FrameRecognition, RecognitionError, RecognitionEvent, RecognitionPipeline, RecognitionStream,
};
