pub mod gemini;
pub mod http;
pub mod image_search;
pub mod pollinations;
pub mod speech;

pub use gemini::GeminiClient;
pub use image_search::ImageSearchClient;
pub use pollinations::ImageGenClient;
pub use speech::SpeechClient;
