use alloy_primitives::Address;
use auto_impl::auto_impl;

/// Callbacks invoked by an EVM simulator while it executes transactions.
///
/// The events of one transaction form a sequence of
/// `call_start ( step | call_enter .. call_exit | fault )* call_end`,
/// followed by `tx_end`.
#[auto_impl(&mut, Box)]
pub trait Tracer {
    /// The outermost call of a transaction starts. For contract creations,
    /// `to` is the created address and `input` the creation bytecode.
    fn call_start(&mut self, is_create: bool, to: Address, input: &[u8]);

    /// An instruction at the program counter is about to be executed in the
    /// innermost call.
    fn step(&mut self, pc: usize, opcode: u8);

    /// A nested call or creation starts.
    fn call_enter(&mut self, is_create: bool, to: Address, input: &[u8]);

    /// The innermost nested call returns.
    fn call_exit(&mut self);

    /// The outermost call of a transaction returns.
    fn call_end(&mut self) {}

    /// The transaction is complete.
    fn tx_end(&mut self) {}

    /// Execution faulted at the program counter.
    fn fault(&mut self, _pc: usize, _opcode: u8) {}
}
