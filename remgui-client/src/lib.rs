//! # remgui-client
//!
//! Client-side library: the application renders its UI into
//! [`DrawData`], submits it through a [`ClientContext`], and a session
//! task ships it to the server while feeding remote input back.
//!
//! ```no_run
//! use std::sync::Arc;
//! use remgui_client::{ClientContext, connect};
//!
//! # async fn run() -> Result<(), remgui_core::RemError> {
//! let ctx = Arc::new(ClientContext::new("my-app"));
//! let session = tokio::spawn(connect("127.0.0.1:8888", Arc::clone(&ctx)));
//! // render thread: ctx.submit_frame(..), ctx.take_input(), ...
//! # session.await.unwrap()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`DrawData`]: remgui_core::DrawData

pub mod context;
pub mod session;

pub use context::{CHAR_RING_CAPACITY, ClientContext, TEXTURE_QUEUE_DEPTH};
pub use session::{accept_from, connect, listen};
