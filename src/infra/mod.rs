pub mod glue_catalog;
pub mod http_client;
pub mod local_store;
pub mod s3_store;
