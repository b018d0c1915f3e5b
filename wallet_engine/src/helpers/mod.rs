mod dest_number;
pub mod retry;

pub use dest_number::{clean_dest_number, dest_number_variants};
pub use retry::{with_retry, RetryPolicy};
