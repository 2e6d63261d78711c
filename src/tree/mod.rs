//! A dynamic, structurally-shared state value.
//!
//! Use [`Node`] as the state type when the shape of the state is only known
//! at runtime. Every container holds its children behind an `Arc`, so a write
//! through [`Node::pointer_mut`] or [`Node::set`] copies the containers on the
//! path it walks and nothing else.

mod node;

pub use node::Node;
