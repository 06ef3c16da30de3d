pub mod enums;
pub mod error;
pub mod schema;
pub mod state;
#[cfg(test)]
pub mod test_utils;
pub mod utils;

pub use enums::*;
pub use error::StoreError;
pub use utils::{create_conn, DbPool};
