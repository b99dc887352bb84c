//! Instruction set
//!
//! The standard instruction set plus the quickened forms the interpreter
//! rewrites resolved instructions into. Quickened opcodes never appear in
//! class files; they only exist in live code streams.

macro_rules! opcodes {
    ($($(#[$meta:meta])* $name:ident = $value:literal, $mnemonic:literal, $len:expr;)*) => {
        /// A single-byte opcode.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($(#[$meta])* $name = $value,)*
        }

        impl Opcode {
            /// Decodes an opcode byte. Unassigned bytes yield `None`.
            pub fn from_byte(byte: u8) -> Option<Opcode> {
                match byte {
                    $($value => Some(Opcode::$name),)*
                    _ => None,
                }
            }

            /// Lower-case assembler mnemonic.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => $mnemonic,)*
                }
            }

            /// Encoded length including operands, or `None` for the
            /// variable-length forms (`tableswitch`, `lookupswitch`, `wide`)
            /// and the rewrite marker.
            pub fn length(self) -> Option<usize> {
                match self {
                    $(Opcode::$name => $len,)*
                }
            }
        }
    };
}

opcodes! {
    /// Do nothing
    Nop = 0x00, "nop", Some(1);
    /// Push null
    AconstNull = 0x01, "aconst_null", Some(1);
    /// Push int -1
    IconstM1 = 0x02, "iconst_m1", Some(1);
    /// Push int 0
    Iconst0 = 0x03, "iconst_0", Some(1);
    /// Push int 1
    Iconst1 = 0x04, "iconst_1", Some(1);
    /// Push int 2
    Iconst2 = 0x05, "iconst_2", Some(1);
    /// Push int 3
    Iconst3 = 0x06, "iconst_3", Some(1);
    /// Push int 4
    Iconst4 = 0x07, "iconst_4", Some(1);
    /// Push int 5
    Iconst5 = 0x08, "iconst_5", Some(1);
    /// Push long 0
    Lconst0 = 0x09, "lconst_0", Some(1);
    /// Push long 1
    Lconst1 = 0x0a, "lconst_1", Some(1);
    /// Push float 0
    Fconst0 = 0x0b, "fconst_0", Some(1);
    /// Push float 1
    Fconst1 = 0x0c, "fconst_1", Some(1);
    /// Push float 2
    Fconst2 = 0x0d, "fconst_2", Some(1);
    /// Push double 0
    Dconst0 = 0x0e, "dconst_0", Some(1);
    /// Push double 1
    Dconst1 = 0x0f, "dconst_1", Some(1);
    /// Push sign-extended byte
    Bipush = 0x10, "bipush", Some(2);
    /// Push sign-extended short
    Sipush = 0x11, "sipush", Some(3);
    /// Push constant (8-bit index)
    Ldc = 0x12, "ldc", Some(2);
    /// Push constant (16-bit index)
    LdcW = 0x13, "ldc_w", Some(3);
    /// Push long or double constant
    Ldc2W = 0x14, "ldc2_w", Some(3);
    /// Load int local
    Iload = 0x15, "iload", Some(2);
    /// Load long local
    Lload = 0x16, "lload", Some(2);
    /// Load float local
    Fload = 0x17, "fload", Some(2);
    /// Load double local
    Dload = 0x18, "dload", Some(2);
    /// Load reference local
    Aload = 0x19, "aload", Some(2);
    /// Load int local 0
    Iload0 = 0x1a, "iload_0", Some(1);
    /// Load int local 1
    Iload1 = 0x1b, "iload_1", Some(1);
    /// Load int local 2
    Iload2 = 0x1c, "iload_2", Some(1);
    /// Load int local 3
    Iload3 = 0x1d, "iload_3", Some(1);
    /// Load long local 0
    Lload0 = 0x1e, "lload_0", Some(1);
    /// Load long local 1
    Lload1 = 0x1f, "lload_1", Some(1);
    /// Load long local 2
    Lload2 = 0x20, "lload_2", Some(1);
    /// Load long local 3
    Lload3 = 0x21, "lload_3", Some(1);
    /// Load float local 0
    Fload0 = 0x22, "fload_0", Some(1);
    /// Load float local 1
    Fload1 = 0x23, "fload_1", Some(1);
    /// Load float local 2
    Fload2 = 0x24, "fload_2", Some(1);
    /// Load float local 3
    Fload3 = 0x25, "fload_3", Some(1);
    /// Load double local 0
    Dload0 = 0x26, "dload_0", Some(1);
    /// Load double local 1
    Dload1 = 0x27, "dload_1", Some(1);
    /// Load double local 2
    Dload2 = 0x28, "dload_2", Some(1);
    /// Load double local 3
    Dload3 = 0x29, "dload_3", Some(1);
    /// Load reference local 0
    Aload0 = 0x2a, "aload_0", Some(1);
    /// Load reference local 1
    Aload1 = 0x2b, "aload_1", Some(1);
    /// Load reference local 2
    Aload2 = 0x2c, "aload_2", Some(1);
    /// Load reference local 3
    Aload3 = 0x2d, "aload_3", Some(1);
    /// Load int array element
    Iaload = 0x2e, "iaload", Some(1);
    /// Load long array element
    Laload = 0x2f, "laload", Some(1);
    /// Load float array element
    Faload = 0x30, "faload", Some(1);
    /// Load double array element
    Daload = 0x31, "daload", Some(1);
    /// Load reference array element
    Aaload = 0x32, "aaload", Some(1);
    /// Load byte or boolean array element
    Baload = 0x33, "baload", Some(1);
    /// Load char array element
    Caload = 0x34, "caload", Some(1);
    /// Load short array element
    Saload = 0x35, "saload", Some(1);
    /// Store int local
    Istore = 0x36, "istore", Some(2);
    /// Store long local
    Lstore = 0x37, "lstore", Some(2);
    /// Store float local
    Fstore = 0x38, "fstore", Some(2);
    /// Store double local
    Dstore = 0x39, "dstore", Some(2);
    /// Store reference or return address local
    Astore = 0x3a, "astore", Some(2);
    /// Store int local 0
    Istore0 = 0x3b, "istore_0", Some(1);
    /// Store int local 1
    Istore1 = 0x3c, "istore_1", Some(1);
    /// Store int local 2
    Istore2 = 0x3d, "istore_2", Some(1);
    /// Store int local 3
    Istore3 = 0x3e, "istore_3", Some(1);
    /// Store long local 0
    Lstore0 = 0x3f, "lstore_0", Some(1);
    /// Store long local 1
    Lstore1 = 0x40, "lstore_1", Some(1);
    /// Store long local 2
    Lstore2 = 0x41, "lstore_2", Some(1);
    /// Store long local 3
    Lstore3 = 0x42, "lstore_3", Some(1);
    /// Store float local 0
    Fstore0 = 0x43, "fstore_0", Some(1);
    /// Store float local 1
    Fstore1 = 0x44, "fstore_1", Some(1);
    /// Store float local 2
    Fstore2 = 0x45, "fstore_2", Some(1);
    /// Store float local 3
    Fstore3 = 0x46, "fstore_3", Some(1);
    /// Store double local 0
    Dstore0 = 0x47, "dstore_0", Some(1);
    /// Store double local 1
    Dstore1 = 0x48, "dstore_1", Some(1);
    /// Store double local 2
    Dstore2 = 0x49, "dstore_2", Some(1);
    /// Store double local 3
    Dstore3 = 0x4a, "dstore_3", Some(1);
    /// Store reference local 0
    Astore0 = 0x4b, "astore_0", Some(1);
    /// Store reference local 1
    Astore1 = 0x4c, "astore_1", Some(1);
    /// Store reference local 2
    Astore2 = 0x4d, "astore_2", Some(1);
    /// Store reference local 3
    Astore3 = 0x4e, "astore_3", Some(1);
    /// Store int array element
    Iastore = 0x4f, "iastore", Some(1);
    /// Store long array element
    Lastore = 0x50, "lastore", Some(1);
    /// Store float array element
    Fastore = 0x51, "fastore", Some(1);
    /// Store double array element
    Dastore = 0x52, "dastore", Some(1);
    /// Store reference array element
    Aastore = 0x53, "aastore", Some(1);
    /// Store byte or boolean array element
    Bastore = 0x54, "bastore", Some(1);
    /// Store char array element
    Castore = 0x55, "castore", Some(1);
    /// Store short array element
    Sastore = 0x56, "sastore", Some(1);
    /// Pop one slot
    Pop = 0x57, "pop", Some(1);
    /// Pop two slots
    Pop2 = 0x58, "pop2", Some(1);
    /// Duplicate top slot
    Dup = 0x59, "dup", Some(1);
    /// Duplicate top slot beneath the second
    DupX1 = 0x5a, "dup_x1", Some(1);
    /// Duplicate top slot beneath the third
    DupX2 = 0x5b, "dup_x2", Some(1);
    /// Duplicate top two slots
    Dup2 = 0x5c, "dup2", Some(1);
    /// Duplicate top two slots beneath the third
    Dup2X1 = 0x5d, "dup2_x1", Some(1);
    /// Duplicate top two slots beneath the fourth
    Dup2X2 = 0x5e, "dup2_x2", Some(1);
    /// Swap top two slots
    Swap = 0x5f, "swap", Some(1);
    /// Add ints
    Iadd = 0x60, "iadd", Some(1);
    /// Add longs
    Ladd = 0x61, "ladd", Some(1);
    /// Add floats
    Fadd = 0x62, "fadd", Some(1);
    /// Add doubles
    Dadd = 0x63, "dadd", Some(1);
    /// Subtract ints
    Isub = 0x64, "isub", Some(1);
    /// Subtract longs
    Lsub = 0x65, "lsub", Some(1);
    /// Subtract floats
    Fsub = 0x66, "fsub", Some(1);
    /// Subtract doubles
    Dsub = 0x67, "dsub", Some(1);
    /// Multiply ints
    Imul = 0x68, "imul", Some(1);
    /// Multiply longs
    Lmul = 0x69, "lmul", Some(1);
    /// Multiply floats
    Fmul = 0x6a, "fmul", Some(1);
    /// Multiply doubles
    Dmul = 0x6b, "dmul", Some(1);
    /// Divide ints
    Idiv = 0x6c, "idiv", Some(1);
    /// Divide longs
    Ldiv = 0x6d, "ldiv", Some(1);
    /// Divide floats
    Fdiv = 0x6e, "fdiv", Some(1);
    /// Divide doubles
    Ddiv = 0x6f, "ddiv", Some(1);
    /// Int remainder
    Irem = 0x70, "irem", Some(1);
    /// Long remainder
    Lrem = 0x71, "lrem", Some(1);
    /// Float remainder
    Frem = 0x72, "frem", Some(1);
    /// Double remainder
    Drem = 0x73, "drem", Some(1);
    /// Negate int
    Ineg = 0x74, "ineg", Some(1);
    /// Negate long
    Lneg = 0x75, "lneg", Some(1);
    /// Negate float
    Fneg = 0x76, "fneg", Some(1);
    /// Negate double
    Dneg = 0x77, "dneg", Some(1);
    /// Int shift left
    Ishl = 0x78, "ishl", Some(1);
    /// Long shift left
    Lshl = 0x79, "lshl", Some(1);
    /// Int arithmetic shift right
    Ishr = 0x7a, "ishr", Some(1);
    /// Long arithmetic shift right
    Lshr = 0x7b, "lshr", Some(1);
    /// Int logical shift right
    Iushr = 0x7c, "iushr", Some(1);
    /// Long logical shift right
    Lushr = 0x7d, "lushr", Some(1);
    /// Int and
    Iand = 0x7e, "iand", Some(1);
    /// Long and
    Land = 0x7f, "land", Some(1);
    /// Int or
    Ior = 0x80, "ior", Some(1);
    /// Long or
    Lor = 0x81, "lor", Some(1);
    /// Int xor
    Ixor = 0x82, "ixor", Some(1);
    /// Long xor
    Lxor = 0x83, "lxor", Some(1);
    /// Increment local by constant
    Iinc = 0x84, "iinc", Some(3);
    /// Int to long
    I2l = 0x85, "i2l", Some(1);
    /// Int to float
    I2f = 0x86, "i2f", Some(1);
    /// Int to double
    I2d = 0x87, "i2d", Some(1);
    /// Long to int
    L2i = 0x88, "l2i", Some(1);
    /// Long to float
    L2f = 0x89, "l2f", Some(1);
    /// Long to double
    L2d = 0x8a, "l2d", Some(1);
    /// Float to int
    F2i = 0x8b, "f2i", Some(1);
    /// Float to long
    F2l = 0x8c, "f2l", Some(1);
    /// Float to double
    F2d = 0x8d, "f2d", Some(1);
    /// Double to int
    D2i = 0x8e, "d2i", Some(1);
    /// Double to long
    D2l = 0x8f, "d2l", Some(1);
    /// Double to float
    D2f = 0x90, "d2f", Some(1);
    /// Int to byte
    I2b = 0x91, "i2b", Some(1);
    /// Int to char
    I2c = 0x92, "i2c", Some(1);
    /// Int to short
    I2s = 0x93, "i2s", Some(1);
    /// Compare longs
    Lcmp = 0x94, "lcmp", Some(1);
    /// Compare floats, NaN yields -1
    Fcmpl = 0x95, "fcmpl", Some(1);
    /// Compare floats, NaN yields 1
    Fcmpg = 0x96, "fcmpg", Some(1);
    /// Compare doubles, NaN yields -1
    Dcmpl = 0x97, "dcmpl", Some(1);
    /// Compare doubles, NaN yields 1
    Dcmpg = 0x98, "dcmpg", Some(1);
    /// Branch if zero
    Ifeq = 0x99, "ifeq", Some(3);
    /// Branch if non-zero
    Ifne = 0x9a, "ifne", Some(3);
    /// Branch if negative
    Iflt = 0x9b, "iflt", Some(3);
    /// Branch if non-negative
    Ifge = 0x9c, "ifge", Some(3);
    /// Branch if positive
    Ifgt = 0x9d, "ifgt", Some(3);
    /// Branch if non-positive
    Ifle = 0x9e, "ifle", Some(3);
    /// Branch if ints equal
    IfIcmpeq = 0x9f, "if_icmpeq", Some(3);
    /// Branch if ints differ
    IfIcmpne = 0xa0, "if_icmpne", Some(3);
    /// Branch if int less
    IfIcmplt = 0xa1, "if_icmplt", Some(3);
    /// Branch if int greater or equal
    IfIcmpge = 0xa2, "if_icmpge", Some(3);
    /// Branch if int greater
    IfIcmpgt = 0xa3, "if_icmpgt", Some(3);
    /// Branch if int less or equal
    IfIcmple = 0xa4, "if_icmple", Some(3);
    /// Branch if references equal
    IfAcmpeq = 0xa5, "if_acmpeq", Some(3);
    /// Branch if references differ
    IfAcmpne = 0xa6, "if_acmpne", Some(3);
    /// Unconditional branch
    Goto = 0xa7, "goto", Some(3);
    /// Jump to subroutine
    Jsr = 0xa8, "jsr", Some(3);
    /// Return from subroutine
    Ret = 0xa9, "ret", Some(2);
    /// Jump table
    Tableswitch = 0xaa, "tableswitch", None;
    /// Sorted key/offset table
    Lookupswitch = 0xab, "lookupswitch", None;
    /// Return int
    Ireturn = 0xac, "ireturn", Some(1);
    /// Return long
    Lreturn = 0xad, "lreturn", Some(1);
    /// Return float
    Freturn = 0xae, "freturn", Some(1);
    /// Return double
    Dreturn = 0xaf, "dreturn", Some(1);
    /// Return reference
    Areturn = 0xb0, "areturn", Some(1);
    /// Return void
    Return = 0xb1, "return", Some(1);
    /// Read static field
    Getstatic = 0xb2, "getstatic", Some(3);
    /// Write static field
    Putstatic = 0xb3, "putstatic", Some(3);
    /// Read instance field
    Getfield = 0xb4, "getfield", Some(3);
    /// Write instance field
    Putfield = 0xb5, "putfield", Some(3);
    /// Virtual call
    Invokevirtual = 0xb6, "invokevirtual", Some(3);
    /// Constructor, private or superclass call
    Invokespecial = 0xb7, "invokespecial", Some(3);
    /// Static call
    Invokestatic = 0xb8, "invokestatic", Some(3);
    /// Interface call
    Invokeinterface = 0xb9, "invokeinterface", Some(5);
    /// Allocate instance
    New = 0xbb, "new", Some(3);
    /// Allocate primitive array
    Newarray = 0xbc, "newarray", Some(2);
    /// Allocate reference array
    Anewarray = 0xbd, "anewarray", Some(3);
    /// Array length
    Arraylength = 0xbe, "arraylength", Some(1);
    /// Throw
    Athrow = 0xbf, "athrow", Some(1);
    /// Checked cast
    Checkcast = 0xc0, "checkcast", Some(3);
    /// Instance test
    Instanceof = 0xc1, "instanceof", Some(3);
    /// Acquire monitor
    Monitorenter = 0xc2, "monitorenter", Some(1);
    /// Release monitor
    Monitorexit = 0xc3, "monitorexit", Some(1);
    /// Widen the next instruction's local index
    Wide = 0xc4, "wide", None;
    /// Allocate multi-dimensional array
    Multianewarray = 0xc5, "multianewarray", Some(4);
    /// Branch if null
    Ifnull = 0xc6, "ifnull", Some(3);
    /// Branch if non-null
    Ifnonnull = 0xc7, "ifnonnull", Some(3);
    /// Unconditional branch (32-bit offset)
    GotoW = 0xc8, "goto_w", Some(5);
    /// Jump to subroutine (32-bit offset)
    JsrW = 0xc9, "jsr_w", Some(5);
    /// Push resolved constant (8-bit index)
    LdcQuick = 0xcb, "ldc_quick", Some(2);
    /// Push resolved constant (16-bit index)
    LdcWQuick = 0xcc, "ldc_w_quick", Some(3);
    /// Read instance field at slot offset in operand 1
    GetfieldQuick = 0xce, "getfield_quick", Some(3);
    /// Write instance field at slot offset in operand 1
    PutfieldQuick = 0xcf, "putfield_quick", Some(3);
    /// Read wide instance field at slot offset in operand 1
    Getfield2Quick = 0xd0, "getfield2_quick", Some(3);
    /// Write wide instance field at slot offset in operand 1
    Putfield2Quick = 0xd1, "putfield2_quick", Some(3);
    /// Read resolved static field
    GetstaticQuick = 0xd2, "getstatic_quick", Some(3);
    /// Write resolved static field
    PutstaticQuick = 0xd3, "putstatic_quick", Some(3);
    /// Read resolved wide static field
    Getstatic2Quick = 0xd4, "getstatic2_quick", Some(3);
    /// Write resolved wide static field
    Putstatic2Quick = 0xd5, "putstatic2_quick", Some(3);
    /// Virtual call through table index (operand 1) with argument count (operand 2)
    InvokevirtualQuick = 0xd6, "invokevirtual_quick", Some(3);
    /// Direct call of the resolved method
    InvokenonvirtualQuick = 0xd7, "invokenonvirtual_quick", Some(3);
    /// Superclass call through the caller's superclass table (16-bit index)
    InvokesuperQuick = 0xd8, "invokesuper_quick", Some(3);
    /// Virtual call through the resolved method's table index
    InvokevirtualQuickW = 0xe2, "invokevirtual_quick_w", Some(3);
    /// Read instance field through the resolved field
    GetfieldQuickW = 0xe3, "getfield_quick_w", Some(3);
    /// Write instance field through the resolved field
    PutfieldQuickW = 0xe4, "putfield_quick_w", Some(3);
    /// Rewrite in progress; re-dispatch
    Lock = 0xe6, "lock", None;
    /// Static call of the resolved method
    InvokestaticQuick = 0xe8, "invokestatic_quick", Some(3);
    /// Interface call of the resolved method through the call-site cache
    InvokeinterfaceQuick = 0xe9, "invokeinterface_quick", Some(5);
}

impl Opcode {
    /// Returns true for opcodes that only exist after rewriting.
    pub fn is_quick(self) -> bool {
        (self as u8) >= Opcode::LdcQuick as u8
    }

    /// Returns true for instructions that end a method or transfer control
    /// unconditionally.
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Ireturn
                | Opcode::Lreturn
                | Opcode::Freturn
                | Opcode::Dreturn
                | Opcode::Areturn
                | Opcode::Return
                | Opcode::Athrow
                | Opcode::Goto
                | Opcode::GotoW
                | Opcode::Ret
                | Opcode::Tableswitch
                | Opcode::Lookupswitch
        )
    }

    /// Returns true for the conditional and unconditional 16-bit branches.
    pub fn is_branch(self) -> bool {
        matches!(self as u8, 0x99..=0xa8 | 0xc6 | 0xc7)
    }

    /// Returns true for the four invocation instructions and their quickened forms.
    pub fn is_invoke(self) -> bool {
        matches!(
            self,
            Opcode::Invokevirtual
                | Opcode::Invokespecial
                | Opcode::Invokestatic
                | Opcode::Invokeinterface
                | Opcode::InvokevirtualQuick
                | Opcode::InvokenonvirtualQuick
                | Opcode::InvokesuperQuick
                | Opcode::InvokevirtualQuickW
                | Opcode::InvokestaticQuick
                | Opcode::InvokeinterfaceQuick
        )
    }
}
