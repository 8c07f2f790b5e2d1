//! Single-invocation entry point for serverless or scheduled-container hosts.
//!
//! Reads `S3_BUCKET_NAME` and `GLUE_CRAWLER_NAME`, processes the current
//! quarter, prints the `{"statusCode", "body"}` response as JSON on stdout
//! and exits non-zero unless the status is 2xx.

use fsds_pipeline::app::invoke_use_case::invoke_from_env;
use fsds_pipeline::observability::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_console_logging();

    let response = invoke_from_env().await;
    println!("{}", serde_json::to_string(&response)?);

    if response.is_success() {
        Ok(())
    } else {
        anyhow::bail!("invocation failed with status {}", response.status_code)
    }
}
