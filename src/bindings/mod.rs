//! Controller edges bound to start/stop actions
//!
//! A [`Binding`] ties one [`Control`](crate::controller::Control) and a set
//! of edges to a [`CommandAction`]. Bindings are collected in a
//! [`BindingTable`] at startup, sealed, then evaluated once per tick.

pub mod action;
pub mod edge;
pub mod error;
pub mod table;

pub use action::{ActionMode, ActionTarget, CommandAction, Phase};
pub use edge::{EdgeSet, FiredEdge, InputEdgeBinding};
pub use error::BindingError;
pub use table::{Binding, BindingTable, Building, Sealed, TickReport};
