#![forbid(unsafe_code)]

//! Shared library for the OpenTube binaries.
//!
//! The backend serves catalog metadata (channels, videos, shorts, playlists)
//! out of SQLite and runs the keyword matching that powers search, category
//! filtering and recommendations. Media files themselves live on an external
//! host; only their URLs pass through here.

pub mod ai;
pub mod catalog;
pub mod config;
pub mod keywords;
pub mod matching;
pub mod otp;
pub mod recommend;
pub mod security;
pub mod taxonomy;
