//! Tests for the opcode table

use bytecode_system::Opcode;

#[test]
fn test_every_assigned_byte_round_trips() {
    let mut assigned = 0;
    for byte in 0..=255u8 {
        if let Some(opcode) = Opcode::from_byte(byte) {
            assert_eq!(opcode as u8, byte, "{}", opcode.mnemonic());
            assigned += 1;
        }
    }
    // 0x00..=0xc9 minus invokedynamic, plus nineteen quickened forms
    assert_eq!(assigned, 201 + 19);
}

#[test]
fn test_variable_length_forms() {
    assert_eq!(Opcode::Tableswitch.length(), None);
    assert_eq!(Opcode::Lookupswitch.length(), None);
    assert_eq!(Opcode::Wide.length(), None);
    assert_eq!(Opcode::Lock.length(), None);
}

#[test]
fn test_invoke_classification() {
    assert!(Opcode::Invokeinterface.is_invoke());
    assert!(Opcode::InvokesuperQuick.is_invoke());
    assert!(!Opcode::Getfield.is_invoke());
    assert!(Opcode::Ifnull.is_branch());
    assert!(!Opcode::Tableswitch.is_branch());
}

#[test]
fn test_mnemonics() {
    assert_eq!(Opcode::IfAcmpne.mnemonic(), "if_acmpne");
    assert_eq!(Opcode::Getstatic2Quick.mnemonic(), "getstatic2_quick");
}
