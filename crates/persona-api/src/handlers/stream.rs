use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use persona_agent::StreamEvent;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Turn a run's event channel into a Server-Sent Events response.
///
/// Each event is sent under its own name with the event itself as JSON data.
/// Closing the connection drops the receiver, which cancels the run.
pub fn sse_from_events(
    events: mpsc::Receiver<StreamEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = ReceiverStream::new(events).map(|event| Ok(to_sse_event(&event)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse_event(event: &StreamEvent) -> Event {
    Event::default()
        .event(event.event_name())
        .json_data(event)
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize stream event");
            Event::default()
                .event("error")
                .data(format!("{{\"type\":\"error\",\"message\":\"{}\"}}", e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_uses_its_name() {
        let event = to_sse_event(&StreamEvent::Message {
            content: "hi".to_string(),
        });
        let rendered = format!("{:?}", event);
        assert!(rendered.contains("message"));
    }
}
