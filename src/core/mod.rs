mod engine;
mod types;

pub use engine::project;
pub use types::{ChartPoint, Params, Projection, TaxType};
