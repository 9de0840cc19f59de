pub mod admission;
pub mod batches;
pub mod health;
pub mod internal;
pub mod plans;
pub mod quota;
pub mod storage;
