pub mod tenant;

pub use tenant::{TenantDb, TenantId};
