//! Boundary to the game host.
//!
//! The monitor never touches game objects directly. It reads through an
//! [`Inspector`] and acts through [`Actions`]; a production build wires these to
//! the game's object model, tests and the simulator use [`memory::InMemoryHost`].

pub mod memory;
pub mod traits;

pub use memory::{HostAction, InMemoryHost, PLAYER_FORM_ID};
pub use traits::{Actions, FormId, Inspector};
