//! Event plumbing around the placement engine: timers, the auto-visibility
//! state machine and notifications to the renderer.

pub mod auto_visibility;
pub mod broadcast;
pub mod timer;

use tokio::sync::mpsc;
use tracing::Span;

/// Unbounded sender that carries the caller's span along with each event, so
/// the receiving side can log inside the context that produced it.
#[derive(Debug)]
pub struct Sender<Event>(mpsc::UnboundedSender<(Span, Event)>);

pub type Receiver<Event> = mpsc::UnboundedReceiver<(Span, Event)>;

pub fn channel<Event>() -> (Sender<Event>, Receiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Sender(tx), rx)
}

impl<Event> Clone for Sender<Event> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<Event> Sender<Event> {
    /// Sends an event, dropping it if the receiver is gone.
    pub fn send(&self, event: Event) { _ = self.try_send(event) }

    pub fn try_send(&self, event: Event) -> Result<(), mpsc::error::SendError<(Span, Event)>> {
        self.0.send((Span::current(), event))
    }
}
