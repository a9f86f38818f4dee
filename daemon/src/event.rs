use crate::protocol::TriggerMessage;

pub enum DaemonEvent {
    /// One-second scheduler tick.
    Tick,
    /// A trigger decoded from a client signal by the listener thread.
    Trigger(TriggerMessage),
    /// A termination signal was received; release runtime files and exit.
    Shutdown,
}
