//! Unit tests for bytecode_system

mod test_builder;
mod test_descriptor;
mod test_opcode;
