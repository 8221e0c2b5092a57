//! Equipment hierarchies
//!
//! Instances form a forest over the `equipment.parent` edge, as do their
//! types over `metadata.equipment.parent`. This module compiles anchored
//! traversals over both:
//!
//! - fixed topologies declared as tables of type names
//! - generic bounded-depth ancestor/descendant walks
//! - single-hop parent and child listings

mod resolver;
mod topology;

pub use resolver::{
    AnchoredQuery, HierarchyResolver, TopologyLevel, TopologyPath, TopologyQuery, EXISTS_BLOCK,
    IDENTIFIER_ALIAS, TYPE_ALIAS,
};
pub use topology::{Direction, Topology};
