//! Google Gemini GenerateContent 协议适配。

mod error;
mod provider;
mod request;
mod stream;

pub use provider::GoogleGeminiAdapter;
