//! Mock provider servers for integration tests
//!
//! - `realtime_mock`: WebSocket server speaking the OpenAI Realtime event protocol

// Not every test binary uses every helper
#![allow(dead_code)]

pub mod realtime_mock;
