//! Access and property flags shared by classes, fields and methods.

/// Declared public
pub const ACC_PUBLIC: u16 = 0x0001;
/// Declared private
pub const ACC_PRIVATE: u16 = 0x0002;
/// Declared protected
pub const ACC_PROTECTED: u16 = 0x0004;
/// Declared static
pub const ACC_STATIC: u16 = 0x0008;
/// Declared final
pub const ACC_FINAL: u16 = 0x0010;
/// Method is synchronized
pub const ACC_SYNCHRONIZED: u16 = 0x0020;
/// Class uses the modern `invokespecial` semantics (shares the bit with `ACC_SYNCHRONIZED`)
pub const ACC_SUPER: u16 = 0x0020;
/// Field is volatile
pub const ACC_VOLATILE: u16 = 0x0040;
/// Field is transient
pub const ACC_TRANSIENT: u16 = 0x0080;
/// Method is implemented natively
pub const ACC_NATIVE: u16 = 0x0100;
/// Class is an interface
pub const ACC_INTERFACE: u16 = 0x0200;
/// Class or method is abstract
pub const ACC_ABSTRACT: u16 = 0x0400;

/// Tests a flag set.
///
/// # Examples
///
/// ```
/// use bytecode_system::access::{has_flag, ACC_STATIC, ACC_PUBLIC};
///
/// assert!(has_flag(ACC_PUBLIC | ACC_STATIC, ACC_STATIC));
/// assert!(!has_flag(ACC_PUBLIC, ACC_STATIC));
/// ```
pub fn has_flag(flags: u16, flag: u16) -> bool {
    flags & flag != 0
}
