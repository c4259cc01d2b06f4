//! # syncplay-core
//!
//! Playback side of the syncplay client: turns PLAY/STOP commands into
//! calls on a media engine, with a fixed calibration delay before each start.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use syncplay_core::config::Config;
//! use syncplay_core::resolver::FsResolver;
//! use syncplay_core::scheduler::PlaybackScheduler;
//!
//! let config = Config::load();
//! let scheduler = PlaybackScheduler::spawn(
//!     config.scheduler_config(),
//!     Box::new(my_engine),
//!     Box::new(FsResolver::new()),
//!     Arc::new(my_listener),
//! )?;
//!
//! // Typically called from the connection's listener.
//! scheduler.handle_command(command);
//! ```

pub mod config;
pub mod engine;
pub mod listener;
pub mod resolver;
pub mod scheduler;

pub use config::Config;
pub use engine::{EngineError, EngineEvent, EngineEventSender, EngineResult, MediaEngine};
pub use listener::PlayerListener;
pub use resolver::{FsResolver, MediaResource, ResolveError, ResourceResolver};
pub use scheduler::{PlaybackScheduler, SchedulerConfig, SchedulerHandle, SchedulerStatus};
