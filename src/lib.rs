// Copyright 2025 Dustin McAfee
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! # rfb-client-bridge
//!
//! An RFB (Remote Framebuffer / VNC) client that bridges an upstream VNC
//! server to a host remote-desktop session manager. The host hands this
//! module framebuffer paint calls, cursor updates, keyboard/mouse events in
//! its own dialect, clipboard channel bytes, and multi-monitor layout
//! information; this module speaks RFB on the wire and translates between
//! the two.
//!
//! ## Scope
//!
//! - RFB protocol version 3.3 only.
//! - Encodings: Raw, CopyRect, Cursor, DesktopSize, ExtendedDesktopSize.
//!   No compressed encodings.
//! - Client role only — this is not a VNC server.
//! - Transport (TCP connect, reads/writes, readiness polling), crypto
//!   primitives, and actual pixel blitting are external collaborators
//!   reached through [`transport::Transport`] and [`callbacks::HostCallbacks`].
//!
//! ## Quick start
//!
//! ```no_run
//! use rfb_client_bridge::{Session, NullCallbacks};
//!
//! let mut session = Session::init(Box::new(NullCallbacks));
//! session.set_param("ip", "127.0.0.1");
//! session.set_param("port", "5900");
//! session.set_param("password", "secret");
//! session.start(1280, 720, 32).unwrap();
//! session.connect().unwrap();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Host session manager             │
//! │                                          │
//! │  • drives connect/start/event/handle_key │
//! │  • polls get_wait_objs/check_wait_objs   │
//! │  • implements HostCallbacks              │
//! └──────────────────┬───────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │              Session (Public)            │
//! │                                          │
//! │  • handshake + steady-state message loop │
//! │  • resize negotiation, keymap, clipboard │
//! └──────────────────┬───────────────────────┘
//!                    │
//!        ┌───────────┼────────────┐
//!        ▼            ▼            ▼
//!   ┌─────────┐ ┌───────────┐ ┌───────────┐
//!   │ decoder │ │  resize   │ │ clipboard │
//!   └─────────┘ └───────────┘ └───────────┘
//!        │            │            │
//!        └────────────┴────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │        transport::Transport (TCP)        │
//! └─────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod auth;
pub mod callbacks;
pub mod clipboard;
pub mod config;
pub mod decoder;
pub mod error;
pub mod keymap;
pub mod pixelformat;
pub mod protocol;
pub mod resize;
pub mod screen;
pub mod session;
pub mod transport;
pub mod wire;

// Re-exports
pub use callbacks::{HostCallbacks, MsgLevel, NullCallbacks};
pub use config::SessionParams;
pub use error::{Result, RfbError};
pub use keymap::Keymap;
pub use pixelformat::PixelFormat;
pub use screen::{Screen, ScreenLayout};
pub use session::Session;
pub use transport::{TcpTransport, Transport};
