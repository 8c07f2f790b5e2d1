pub mod parquet_out;
pub mod publish;
pub mod source;
pub mod stages;
pub mod transform;
