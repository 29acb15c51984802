use rlog::error::IngestError;

#[tokio::main]
async fn main() -> Result<(), IngestError> {
    rlog::app::run().await
}
