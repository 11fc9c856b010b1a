pub mod local;
pub mod qdrant;
pub mod vertex;

pub use local::LocalIndex;
pub use qdrant::QdrantStore;
pub use vertex::{VertexSettings, VertexVectorSearch};
