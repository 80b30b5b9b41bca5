pub mod bootstrap;
pub mod registry;
pub mod router;

pub use registry::{PoolHandle, PoolRegistry, RegistryError};
pub use router::{current_pool, with_tenant_connection, RoutingError};
