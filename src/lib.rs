//! 多供应商流式聊天网关 统一三家上游协议并持久化会话

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod provider;
pub mod registry;
pub mod storage;
pub mod stream;
pub mod types;

pub use client::ChatClient;
pub use error::ChatError;
pub use provider::{DynAdapter, FragmentStream, ProviderAdapter};
pub use registry::AdapterRegistry;
pub use storage::ChatRepository;
