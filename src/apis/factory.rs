use super::{FestivalFansAdapter, TicketSwapAdapter};
use crate::constants::{source_key, FESTIVAL_FANS_SOURCE, TICKETSWAP_SOURCE};
use crate::types::SourceAdapter;
use std::sync::Arc;

/// Look up an adapter by source name. `url` overrides the adapter's default
/// listing page. Unknown names return `None`.
pub fn create_adapter(
    source_name: &str,
    client: reqwest::Client,
    url: Option<&str>,
) -> Option<Arc<dyn SourceAdapter>> {
    let key = source_key(source_name);
    match key.as_str() {
        FESTIVAL_FANS_SOURCE => Some(Arc::new(match url {
            Some(url) => FestivalFansAdapter::with_url(client, url),
            None => FestivalFansAdapter::new(client),
        })),
        TICKETSWAP_SOURCE => Some(Arc::new(match url {
            Some(url) => TicketSwapAdapter::with_url(client, url),
            None => TicketSwapAdapter::new(client),
        })),
        _ => None,
    }
}
