//! # Bridge
//!
//! Synchronization core between the lane engine and the world engine.
//!
//! Responsibilities:
//! - Parse junction programs into a link/landmark topology
//! - Track program and phase of every junction, translate lane signal
//!   states to world light states
//! - Detect actors entering and leaving the lane engine each step
//! - Drive the per-step session and vehicle lifecycle commands
//!
//! ```ignore
//! use bridge::{CosimSession, LightBoard};
//!
//! let mut session = CosimSession::open(TraciClient::new(), &config).await?;
//! let mut board = LightBoard::new();
//! loop {
//!     session.tick().await?;
//!     for id in session.spawned_this_step() { /* mirror into the world */ }
//!     session.translate_lights(&mut board).await?;
//! }
//! session.close().await?;
//! ```

pub mod error;
pub mod light_board;
pub mod registry;
pub mod session;
pub mod topology;
pub mod traffic_lights;
pub mod translate;

pub use error::{BridgeError, Result};
pub use light_board::LightBoard;
pub use registry::ActorRegistry;
pub use session::CosimSession;
pub use topology::ProgramLogic;
pub use traffic_lights::{LandmarkTranslation, TrafficLightManager};
pub use translate::{merge_directions, to_light_state};
