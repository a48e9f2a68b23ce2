//! Record store client implementations.

mod http;
mod mock;

pub use http::HttpRecordStore;
pub use mock::{MockRecordStore, StoreCall, StoreCallKind};
