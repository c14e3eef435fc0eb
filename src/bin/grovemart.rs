use anyhow::Result;
use grovemart::cli::{
    actions::{server, Action},
    start,
};

#[tokio::main]
async fn main() -> Result<()> {
    match start()? {
        action @ Action::Server { .. } => server::handle(action).await,
    }
}
