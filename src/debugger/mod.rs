use serde_json::Value;

/// A component whose state can be inspected and restored by a front end.
///
/// Implementors serialize their registers, not scheduler handles. Devices
/// that own timers pair this with a scheduler-aware restore (`rearm`,
/// `resume`) that [`crate::Machine`] calls after `write_state`.
pub trait Debuggable {
    /// Reads the component's state and returns it as a JSON value.
    fn read_state(&self) -> Value;

    /// Writes the component's state from a JSON value. Malformed input is
    /// logged and ignored.
    fn write_state(&mut self, state: &Value);
}
