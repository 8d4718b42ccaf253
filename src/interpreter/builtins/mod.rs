//! Built-in calls and pipes.
//!
//! - **Aggregate**: `count`, `sum`, `avg`, `min`, `max` over a collection
//! - **Pipes**: `currency`, `date`, `number`, `upper`, `lower`

mod aggregate;
mod pipes;

pub use aggregate::*;
pub use pipes::*;
