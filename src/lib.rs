//! # Pain Point Harness
//!
//! Finds product opportunities in public discussion. Posts are collected
//! from Reddit, kept only when they read like a complaint or an unmet need,
//! classified by an LLM into a structured analysis, and served through a
//! CLI and a JSON HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌──────────┐   ┌────────────┐
//! │   Sources    │──▶│  Filter  │──▶│  SQLite  │──▶│ Classifier │
//! │ API / public │   │ markers  │   │  store   │◀──│  Gemini /  │
//! └──────────────┘   └──────────┘   └────┬─────┘   │  OpenAI    │
//!                                        │         └────────────┘
//!                      ┌─────────────────┤
//!                      ▼                 ▼
//!                 ┌──────────┐     ┌──────────┐
//!                 │   CLI    │     │   HTTP   │
//!                 │  (pph)   │     │   API    │
//!                 └──────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pph init                          # create database
//! pph demo                          # load sample data, no credentials needed
//! pph collect --public --sources SaaS,startups
//! pph classify --batch-size 20      # needs GOOGLE_API_KEY or OPENAI_API_KEY
//! pph serve                         # http://127.0.0.1:8000/api/pain-points
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed errors for store and upstream failures |
//! | [`filter`] | Pain-signal marker filter |
//! | [`sources`] | Content source trait and Reddit listing parsing |
//! | [`connector_reddit`] | Authenticated Reddit API source |
//! | [`connector_public`] | Public Reddit JSON source |
//! | [`collect`] | Collection pass |
//! | [`llm`] | Completion provider abstraction |
//! | [`classify`] | Prompting, reply decoding, and batch classification |
//! | [`pipeline`] | Orchestration and single-flight run state |
//! | [`store`] | SQLite store |
//! | [`server`] | HTTP API |
//! | [`export`] | JSON and CSV export |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod classify;
pub mod collect;
pub mod config;
pub mod connector_public;
pub mod connector_reddit;
pub mod db;
pub mod demo;
pub mod error;
pub mod export;
pub mod filter;
pub mod get;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod sources;
pub mod stats;
pub mod store;

#[cfg(test)]
mod testing;
