pub mod schema;
pub mod store;

mod column;

pub use schema::{
    ColumnSpec, OutputShape, Schema, FRAMES, LAST_HIDDEN_STATES, POOLED_EMBEDDING, TIMESTAMP,
};
pub use store::{Dataset, Record, Records};
