//! Terminal client for the Lucky Money red packet contract.
//!
//! The owner funds a pool split into a number of packets, and participants grab
//! one packet each. Chain state is polled over JSON-RPC, grab history comes from
//! a subgraph, and the screen shown is derived from both on every redraw.

pub mod chain;
pub mod client;
pub mod config;
pub mod deployment;
pub mod grab;
pub mod indexer_client;
pub mod panels;
pub mod tracker;
pub mod ui;
pub mod units;
pub mod view_state;
pub mod wallets;
