// SPDX-License-Identifier: MIT

//! `GET /api/sse/events` — the live-event stream. Only GET is
//! accepted; the response is `text/event-stream` with `Cache-Control:
//! no-cache` and `Connection: keep-alive`. Subscriptions are set from the
//! query string on (re)connect: there is no separate subscribe/unsubscribe
//! endpoint, a client that wants different coverage just reconnects.

use std::convert::Infallible;
use std::time::Duration;

use ao_core::{Clock, LiveEvent, Permission};
use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;

use crate::auth::AuthedUser;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SubscribeQuery {
    /// Comma-separated analysis ids to subscribe to on connect.
    #[serde(default)]
    pub subscribe: Option<String>,
}

pub async fn events<C: Clock>(
    State(state): State<AppState<C>>,
    user: AuthedUser,
    Query(query): Query<SubscribeQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (session, rx) = state.fanout.add_client(user.user_id.as_str(), user.is_admin);

    if let Some(subscribe) = query.subscribe {
        let ids = subscribe.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        state.fanout.subscribe(&session.id, ids);
    }

    let init_analyses = state.store.with_state(|s| {
        s.analyses
            .values()
            .filter(|a| user.is_admin || state.permissions.is_allowed(&user.user_id, a.effective_team_id(), Permission::View))
            .cloned()
            .collect::<Vec<_>>()
    });
    let init_event = LiveEvent::Init { analyses: serde_json::to_value(init_analyses).unwrap_or_default() };

    let stream = futures_util::stream::once(async move { init_event }).chain(ReceiverStream::new(rx)).map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_default();
        Ok(Event::default().data(data))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"))
}
