mod arena;
mod branching;
mod handle;
mod node;
mod raw_vbtree_map;

pub(crate) use branching::Branching;
pub(crate) use handle::Handle;
pub(crate) use node::{Node, SearchResult};
pub(crate) use raw_vbtree_map::RawVBTreeMap;
