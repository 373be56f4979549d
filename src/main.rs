//! Site CMS - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    site_cms::run().await;
}
