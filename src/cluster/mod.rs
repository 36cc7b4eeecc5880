//! Cluster state and the building blocks used to run commands against more than one node.

pub mod executor;
pub mod router;
pub mod topology;

pub use executor::{ClusterCommandExecutor, NodeConnection, NodeResourceProvider, ProviderNodeResources};
pub use router::{ClusterRouter, SlotRouter, StandaloneRouter};
pub use topology::{CachingTopologyProvider, Topology, TopologyProvider};
