pub mod http_client;

pub use http_client::{build_client, fetch_html, fetch_html_with_retry};
