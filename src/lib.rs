// src/lib.rs

//! notice-push library
//!
//! Polls public announcement boards, stores each posting once, and sends a
//! push notification for every posting seen for the first time.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod push;
pub mod services;
pub mod storage;
pub mod utils;
