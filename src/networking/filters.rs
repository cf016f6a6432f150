use std::convert::Infallible;

use warp::{Filter, Reply};

use crate::networking::network::Relay;
use crate::networking::peer::handle_inbound_session;

/// The single route a relay serves: a websocket upgrade at the root path.
/// Every upgraded socket becomes an unauthenticated session driven by
/// [`handle_inbound_session`].
pub fn ws_upgrade_route_filter(
    relay: &Relay,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    warp::path::end()
        .and(warp::ws())
        .and(with_relay(relay.clone()))
        .map(|ws: warp::ws::Ws, relay: Relay| {
            ws.on_upgrade(move |socket| handle_inbound_session(socket, relay))
        })
}

fn with_relay(relay: Relay) -> impl Filter<Extract = (Relay,), Error = Infallible> + Clone {
    warp::any().map(move || relay.clone())
}
