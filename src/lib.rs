//! Today Reader - a daily newspaper mirror
//!
//! This crate fetches the day's paginated paper (preview images and PDFs) from the
//! publisher's file server, keeps it in memory for the rest of the day, and serves
//! it through a small web interface.

pub mod config;
pub mod fetcher;
pub mod paper;
pub mod routes;
pub mod server;
