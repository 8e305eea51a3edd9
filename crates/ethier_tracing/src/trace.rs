use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};

use crate::Tracer;

/// A recorded [`Tracer`] event.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TraceMessage {
    /// See [`Tracer::call_start`].
    CallStart {
        /// Whether the call creates a contract.
        is_create: bool,
        /// Callee, or the created address.
        to: Address,
        /// Call data, or the creation bytecode.
        input: Bytes,
    },
    /// See [`Tracer::step`].
    Step {
        /// Program counter
        pc: usize,
        /// Opcode
        opcode: u8,
    },
    /// See [`Tracer::call_enter`].
    CallEnter {
        /// Whether the call creates a contract.
        is_create: bool,
        /// Callee, or the created address.
        to: Address,
        /// Call data, or the creation bytecode.
        input: Bytes,
    },
    /// See [`Tracer::call_exit`].
    CallExit,
    /// See [`Tracer::call_end`].
    CallEnd,
    /// See [`Tracer::tx_end`].
    TxEnd,
    /// See [`Tracer::fault`].
    Fault {
        /// Program counter
        pc: usize,
        /// Opcode
        opcode: u8,
    },
}

impl TraceMessage {
    /// Invokes the callback of the tracer that corresponds to the message.
    pub fn dispatch(&self, tracer: &mut impl Tracer) {
        match self {
            TraceMessage::CallStart {
                is_create,
                to,
                input,
            } => tracer.call_start(*is_create, *to, input),
            TraceMessage::Step { pc, opcode } => tracer.step(*pc, *opcode),
            TraceMessage::CallEnter {
                is_create,
                to,
                input,
            } => tracer.call_enter(*is_create, *to, input),
            TraceMessage::CallExit => tracer.call_exit(),
            TraceMessage::CallEnd => tracer.call_end(),
            TraceMessage::TxEnd => tracer.tx_end(),
            TraceMessage::Fault { pc, opcode } => tracer.fault(*pc, *opcode),
        }
    }
}

/// A recorded sequence of tracer events, possibly spanning multiple
/// transactions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Trace {
    /// Messages
    pub messages: Vec<TraceMessage>,
}

impl Trace {
    /// Replays the recorded events into the tracer, in order.
    pub fn replay(&self, tracer: &mut impl Tracer) {
        for message in &self.messages {
            message.dispatch(tracer);
        }
    }
}

/// A [`Tracer`] that records every event into a [`Trace`].
#[derive(Clone, Debug, Default)]
pub struct TraceRecorder {
    trace: Trace,
}

impl TraceRecorder {
    /// Returns the recorded trace.
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    /// Consumes the recorder, returning the recorded trace.
    pub fn into_trace(self) -> Trace {
        self.trace
    }

    fn push(&mut self, message: TraceMessage) {
        self.trace.messages.push(message);
    }
}

impl Tracer for TraceRecorder {
    fn call_start(&mut self, is_create: bool, to: Address, input: &[u8]) {
        self.push(TraceMessage::CallStart {
            is_create,
            to,
            input: Bytes::copy_from_slice(input),
        });
    }

    fn step(&mut self, pc: usize, opcode: u8) {
        self.push(TraceMessage::Step { pc, opcode });
    }

    fn call_enter(&mut self, is_create: bool, to: Address, input: &[u8]) {
        self.push(TraceMessage::CallEnter {
            is_create,
            to,
            input: Bytes::copy_from_slice(input),
        });
    }

    fn call_exit(&mut self) {
        self.push(TraceMessage::CallExit);
    }

    fn call_end(&mut self) {
        self.push(TraceMessage::CallEnd);
    }

    fn tx_end(&mut self) {
        self.push(TraceMessage::TxEnd);
    }

    fn fault(&mut self, pc: usize, opcode: u8) {
        self.push(TraceMessage::Fault { pc, opcode });
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, bytes};

    use super::*;

    const CALLEE: Address = address!("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512");

    fn record(tracer: &mut impl Tracer) {
        tracer.call_start(false, CALLEE, &[0xd0, 0x9d, 0xe0, 0x8a]);
        tracer.step(0, 0x60);
        tracer.call_enter(false, Address::ZERO, &[]);
        tracer.step(0, 0x00);
        tracer.call_exit();
        tracer.fault(2, 0xfe);
        tracer.call_end();
        tracer.tx_end();
    }

    #[test]
    fn replay_reproduces_recording() {
        let mut recorder = TraceRecorder::default();
        record(&mut recorder);
        let trace = recorder.into_trace();
        assert_eq!(trace.messages.len(), 8);

        let mut replayed = TraceRecorder::default();
        trace.replay(&mut replayed);
        assert_eq!(replayed.trace(), &trace);
    }

    #[test]
    fn boxed_tracers_forward_events() {
        let mut recorder = TraceRecorder::default();
        {
            let mut boxed: Box<dyn Tracer + '_> = Box::new(&mut recorder);
            boxed.step(1, 0x01);
            boxed.tx_end();
        }

        assert_eq!(
            recorder.trace().messages,
            [
                TraceMessage::Step { pc: 1, opcode: 1 },
                TraceMessage::TxEnd
            ]
        );
    }

    #[test]
    fn deserializes_messages() -> anyhow::Result<()> {
        let trace: Trace = serde_json::from_str(
            r#"{
                "messages": [
                    {
                        "type": "callStart",
                        "isCreate": true,
                        "to": "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512",
                        "input": "0x6080"
                    },
                    { "type": "step", "pc": 0, "opcode": 96 },
                    { "type": "callExit" },
                    { "type": "fault", "pc": 2, "opcode": 254 }
                ]
            }"#,
        )?;

        assert_eq!(
            trace.messages,
            [
                TraceMessage::CallStart {
                    is_create: true,
                    to: CALLEE,
                    input: bytes!("6080"),
                },
                TraceMessage::Step { pc: 0, opcode: 96 },
                TraceMessage::CallExit,
                TraceMessage::Fault {
                    pc: 2,
                    opcode: 254
                },
            ]
        );

        Ok(())
    }
}
