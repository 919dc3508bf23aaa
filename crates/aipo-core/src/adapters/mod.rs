//! Concrete [`Adapter`](aipo_adapter_api::Adapter) implementations (spec.md
//! §4.1) plus a name-keyed construction registry (spec.md §9 design note:
//! adapters are registered at program init rather than discovered
//! dynamically at runtime).

pub mod generic_http;
pub mod mock;
pub mod registry;
pub mod retry;
pub mod stdio;

pub use generic_http::HttpAdapter;
pub use mock::MockAdapter;
pub use registry::AdapterRegistry;
pub use stdio::StdioAdapter;
