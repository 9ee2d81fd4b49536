pub mod caption;
pub mod ffmpeg;
pub mod frame;
pub mod generator;

pub use generator::VideoGenerator;
