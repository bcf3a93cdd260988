//! Source resolution, engine adapter, dispatch, safety and error classification (C6-C8, C10-C11).

pub mod classifier;
pub mod dispatcher;
pub mod engine;
pub mod resolver;
pub mod safety;

pub use classifier::{classify, ErrorKind, QueryError};
pub use dispatcher::{DataSource, Dispatcher, QueryMetadata, QueryRequest};
pub use engine::{DataFusionAdapter, EngineAdapter, Feature};
pub use resolver::{resolve, Backing, Source};
