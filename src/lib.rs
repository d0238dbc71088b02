//! # Balladeer - game-state engine for a music-practice adventure
//!
//! Players travel between locations of a generated world by completing timed
//! practice exercises, collect the segments of a song along the way, perform
//! at taverns for gold and reputation, and finally perform the whole song to
//! charm the world's monster.
//!
//! ## Features
//!
//! - **Exercise timers**: in-memory per-player sessions whose completion is
//!   derived from an injectable clock on every read.
//! - **Durable state**: players, worlds, songs and progress in an embedded
//!   sled database with atomic per-player transactions.
//! - **Quest flow**: sequential location unlocking, segment collection,
//!   tavern performances and the final quest.
//! - **Collaborators**: world generation and the mentor sit behind traits so
//!   model-backed implementations can be plugged in.
//! - **Transport**: newline-delimited JSON over TCP with argon2 logins.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use balladeer::config::Config;
//! use balladeer::server::{serve, GameContext};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     balladeer::logutil::init_logging(&config.logging, 0);
//!     let ctx = GameContext::open(Arc::new(config))?;
//!     let listener = tokio::net::TcpListener::bind(&ctx.config.server.bind_address).await?;
//!     serve(ctx, listener).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`game`] - records, rewards, the exercise timer and the game services
//! - [`storage`] - sled-backed repositories and transactions
//! - [`server`] - sessions, message routing, the mentor tool surface and the TCP listener
//! - [`config`] - TOML configuration
//! - [`validation`] - login name, chat and frame checks
//! - [`logutil`] - logger setup and log-safe escaping

pub mod config;
pub mod game;
pub mod logutil;
pub mod server;
pub mod storage;
pub mod validation;
