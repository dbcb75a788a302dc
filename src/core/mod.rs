//! Core module containing the query translation layer and its collaborators

pub mod error;
pub mod extractors;
pub mod filter;
pub mod params;
pub mod query;
pub mod store;
pub mod tags;
pub mod translator;

pub use error::{ObserversError, ObserversResult, StoreError};
pub use filter::{CmpOp, Comparison, Condition, FilterExpression, TextMatch};
pub use params::{ParamValue, RawParameters};
pub use query::{
    Document, ListResponse, Pagination, Populate, Projection, QueryDescriptor, SortDirection,
    SortKey, SortSpecification,
};
pub use store::DocumentStore;
pub use tags::{TagFilter, Tagged};
pub use translator::{QueryDefaults, QueryTranslator};
