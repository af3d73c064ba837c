//! Signal source driven by the test through a channel.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::process::{ControlSignal, SignalError, SignalSource};

/// Delivers whatever the paired [`Sender`] sends; a dropped sender terminates.
pub struct ScriptedSignals {
    receiver: Receiver<ControlSignal>,
}

impl ScriptedSignals {
    #[must_use]
    pub fn new() -> (Sender<ControlSignal>, Self) {
        let (sender, receiver) = mpsc::channel();
        (sender, Self { receiver })
    }
}

impl SignalSource for ScriptedSignals {
    fn next_signal(&mut self) -> Result<ControlSignal, SignalError> {
        Ok(self.receiver.recv().unwrap_or(ControlSignal::Terminate))
    }
}
