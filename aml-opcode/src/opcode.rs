//! The full one-byte and `0x5B`-extended AML opcode table.
//!
//! Opcodes are represented as a flat `u16`: one-byte opcodes keep their raw
//! value, extended opcodes are `0x5B00 | second_byte`. This keeps a single
//! `match` usable for dispatch regardless of which table an opcode came
//! from, keeping both one- and two-byte opcodes in one enum even though
//! they're encoded with different argument shapes.

use crate::consts::*;

/// A fully decoded opcode identity (not yet carrying its operands).
///
/// Mirrors the "opcode decode" stage of `spec.md` §4.1 item 6: a one-byte
/// lead, optionally selecting the extended table via `EXT_OP_PREFIX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
#[non_exhaustive]
pub enum Opcode {
    Zero,
    One,
    Alias,
    Name,
    BytePrefix,
    WordPrefix,
    DWordPrefix,
    StringPrefix,
    QWordPrefix,
    Scope,
    Buffer,
    Package,
    VarPackage,
    Method,
    External,
    DualNamePrefix,
    MultiNamePrefix,
    Local(u8),
    Arg(u8),
    Store,
    RefOf,
    Add,
    Concat,
    Subtract,
    Increment,
    Decrement,
    Multiply,
    Divide,
    ShiftLeft,
    ShiftRight,
    And,
    Nand,
    Or,
    Nor,
    Xor,
    Not,
    FindSetLeftBit,
    FindSetRightBit,
    DerefOf,
    ConcatRes,
    Mod,
    Notify,
    SizeOf,
    Index,
    Match,
    CreateDWordField,
    CreateWordField,
    CreateByteField,
    CreateBitField,
    ObjectType,
    CreateQWordField,
    LAnd,
    LOr,
    LNot,
    LEqual,
    LGreater,
    LLess,
    ToBuffer,
    ToDecimalString,
    ToHexString,
    ToInteger,
    ToString,
    CopyObject,
    Mid,
    Continue,
    If,
    Else,
    While,
    Noop,
    Return,
    Break,
    BreakPoint,
    Ones,
    // Extended (0x5B-prefixed) table.
    Mutex,
    Event,
    CondRefOf,
    CreateField,
    LoadTable,
    Load,
    Stall,
    Sleep,
    Acquire,
    Signal,
    Wait,
    Reset,
    Release,
    FromBcd,
    ToBcd,
    Unload,
    RevisionOf,
    Debug,
    Fatal,
    Timer,
    OpRegion,
    Field,
    Device,
    Processor,
    PowerRes,
    ThermalZone,
    IndexField,
    BankField,
    DataRegion,
}

impl Opcode {
    /// Decode an opcode from its lead byte and, if it is `EXT_OP_PREFIX`,
    /// the following byte. Returns `None` for bytes that are not opcode
    /// leads at all (e.g. raw computational data that the caller consumes
    /// through a different path, or an unrecognized extended opcode).
    pub fn decode(first: u8, second: Option<u8>) -> Option<Self> {
        use Opcode::*;
        if first == EXT_OP_PREFIX {
            let second = second?;
            return Some(match second {
                EXT_MUTEX_OP => Mutex,
                EXT_EVENT_OP => Event,
                EXT_COND_REF_OF_OP => CondRefOf,
                EXT_CREATE_FIELD_OP => CreateField,
                EXT_LOAD_TABLE_OP => LoadTable,
                EXT_LOAD_OP => Load,
                EXT_STALL_OP => Stall,
                EXT_SLEEP_OP => Sleep,
                EXT_ACQUIRE_OP => Acquire,
                EXT_SIGNAL_OP => Signal,
                EXT_WAIT_OP => Wait,
                EXT_RESET_OP => Reset,
                EXT_RELEASE_OP => Release,
                EXT_FROM_BCD_OP => FromBcd,
                EXT_TO_BCD_OP => ToBcd,
                EXT_UNLOAD_OP => Unload,
                EXT_REVISION_OP => RevisionOf,
                EXT_DEBUG_OP => Debug,
                EXT_FATAL_OP => Fatal,
                EXT_TIMER_OP => Timer,
                EXT_OP_REGION_OP => OpRegion,
                EXT_FIELD_OP => Field,
                EXT_DEVICE_OP => Device,
                EXT_PROCESSOR_OP => Processor,
                EXT_POWER_RES_OP => PowerRes,
                EXT_THERMAL_ZONE_OP => ThermalZone,
                EXT_INDEX_FIELD_OP => IndexField,
                EXT_BANK_FIELD_OP => BankField,
                EXT_DATA_REGION_OP => DataRegion,
                _ => return None,
            });
        }
        Some(match first {
            ZERO_OP => Zero,
            ONE_OP => One,
            ALIAS_OP => Alias,
            NAME_OP => Name,
            BYTE_PREFIX => BytePrefix,
            WORD_PREFIX => WordPrefix,
            DWORD_PREFIX => DWordPrefix,
            STRING_PREFIX => StringPrefix,
            QWORD_PREFIX => QWordPrefix,
            SCOPE_OP => Scope,
            BUFFER_OP => Buffer,
            PACKAGE_OP => Package,
            VAR_PACKAGE_OP => VarPackage,
            METHOD_OP => Method,
            EXTERNAL_OP => External,
            DUAL_NAME_PREFIX => DualNamePrefix,
            MULTI_NAME_PREFIX => MultiNamePrefix,
            LOCAL0_OP..=LOCAL7_OP => Local(first - LOCAL0_OP),
            ARG0_OP..=ARG6_OP => Arg(first - ARG0_OP),
            STORE_OP => Store,
            REF_OF_OP => RefOf,
            ADD_OP => Add,
            CONCAT_OP => Concat,
            SUBTRACT_OP => Subtract,
            INCREMENT_OP => Increment,
            DECREMENT_OP => Decrement,
            MULTIPLY_OP => Multiply,
            DIVIDE_OP => Divide,
            SHIFT_LEFT_OP => ShiftLeft,
            SHIFT_RIGHT_OP => ShiftRight,
            AND_OP => And,
            NAND_OP => Nand,
            OR_OP => Or,
            NOR_OP => Nor,
            XOR_OP => Xor,
            NOT_OP => Not,
            FIND_SET_LEFT_BIT_OP => FindSetLeftBit,
            FIND_SET_RIGHT_BIT_OP => FindSetRightBit,
            DEREF_OF_OP => DerefOf,
            CONCAT_RES_OP => ConcatRes,
            MOD_OP => Mod,
            NOTIFY_OP => Notify,
            SIZE_OF_OP => SizeOf,
            INDEX_OP => Index,
            MATCH_OP => Match,
            CREATE_DWORD_FIELD_OP => CreateDWordField,
            CREATE_WORD_FIELD_OP => CreateWordField,
            CREATE_BYTE_FIELD_OP => CreateByteField,
            CREATE_BIT_FIELD_OP => CreateBitField,
            OBJECT_TYPE_OP => ObjectType,
            CREATE_QWORD_FIELD_OP => CreateQWordField,
            LAND_OP => LAnd,
            LOR_OP => LOr,
            LNOT_OP => LNot,
            LEQUAL_OP => LEqual,
            LGREATER_OP => LGreater,
            LLESS_OP => LLess,
            TO_BUFFER_OP => ToBuffer,
            TO_DECIMAL_STRING_OP => ToDecimalString,
            TO_HEX_STRING_OP => ToHexString,
            TO_INTEGER_OP => ToInteger,
            TO_STRING_OP => ToString,
            COPY_OBJECT_OP => CopyObject,
            MID_OP => Mid,
            CONTINUE_OP => Continue,
            IF_OP => If,
            ELSE_OP => Else,
            WHILE_OP => While,
            NOOP_OP => Noop,
            RETURN_OP => Return,
            BREAK_OP => Break,
            BREAK_POINT_OP => BreakPoint,
            ONES_OP => Ones,
            _ => return None,
        })
    }

    /// Whether this opcode is a two-byte (`0x5B`-prefixed) opcode.
    pub const fn is_extended(&self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Mutex
                | Event
                | CondRefOf
                | CreateField
                | LoadTable
                | Load
                | Stall
                | Sleep
                | Acquire
                | Signal
                | Wait
                | Reset
                | Release
                | FromBcd
                | ToBcd
                | Unload
                | RevisionOf
                | Debug
                | Fatal
                | Timer
                | OpRegion
                | Field
                | Device
                | Processor
                | PowerRes
                | ThermalZone
                | IndexField
                | BankField
                | DataRegion
        )
    }

    /// Expression opcodes (`spec.md` §4.7) return a value and may be nested
    /// anywhere a `TermArg` is expected.
    pub const fn is_expression_opcode(&self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Store
                | RefOf
                | Add
                | Concat
                | Subtract
                | Increment
                | Decrement
                | Multiply
                | Divide
                | ShiftLeft
                | ShiftRight
                | And
                | Nand
                | Or
                | Nor
                | Xor
                | Not
                | FindSetLeftBit
                | FindSetRightBit
                | DerefOf
                | ConcatRes
                | Mod
                | SizeOf
                | Index
                | Match
                | ObjectType
                | LAnd
                | LOr
                | LNot
                | LEqual
                | LGreater
                | LLess
                | ToBuffer
                | ToDecimalString
                | ToHexString
                | ToInteger
                | ToString
                | CopyObject
                | Mid
                | CondRefOf
                | LoadTable
                | Acquire
                | Wait
                | FromBcd
                | ToBcd
                | RevisionOf
                | Timer
                | Buffer
                | Package
                | VarPackage
        )
    }

    /// Statement opcodes (`spec.md` §4.8) execute for effect and may raise a
    /// control-flow interruption; they never appear where a `TermArg` value
    /// is required.
    pub const fn is_statement_opcode(&self) -> bool {
        use Opcode::*;
        matches!(
            self,
            If | Else
                | While
                | Break
                | Continue
                | Return
                | Notify
                | Sleep
                | Stall
                | Fatal
                | BreakPoint
                | Noop
                | Release
                | Reset
                | Signal
                | Load
                | Unload
        )
    }

    /// Named-object definition opcodes (`spec.md` §4.9).
    pub const fn is_named_object_opcode(&self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Method
                | Device
                | Processor
                | PowerRes
                | ThermalZone
                | OpRegion
                | DataRegion
                | Event
                | Mutex
                | Field
                | BankField
                | IndexField
                | CreateBitField
                | CreateByteField
                | CreateWordField
                | CreateDWordField
                | CreateQWordField
                | CreateField
                | External
                | Alias
                | Name
        )
    }

    /// Namespace modifier opcodes (`spec.md` §4.10).
    pub const fn is_namespace_modifier_opcode(&self) -> bool {
        matches!(self, Opcode::Scope | Opcode::Alias | Opcode::Name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_one_byte_and_extended() {
        assert_eq!(Opcode::decode(IF_OP, None), Some(Opcode::If));
        assert_eq!(
            Opcode::decode(EXT_OP_PREFIX, Some(EXT_MUTEX_OP)),
            Some(Opcode::Mutex)
        );
        assert_eq!(Opcode::decode(EXT_OP_PREFIX, None), None);
        assert_eq!(Opcode::decode(LOCAL0_OP + 3, None), Some(Opcode::Local(3)));
        assert_eq!(Opcode::decode(ARG0_OP + 2, None), Some(Opcode::Arg(2)));
    }

    #[test]
    fn classification_is_disjoint_between_expr_and_stmt() {
        for op in [Opcode::If, Opcode::Add, Opcode::Method, Opcode::Scope] {
            assert!(!(op.is_expression_opcode() && op.is_statement_opcode()));
        }
        assert!(Opcode::Add.is_expression_opcode());
        assert!(Opcode::If.is_statement_opcode());
        assert!(Opcode::Method.is_named_object_opcode());
        assert!(Opcode::Scope.is_namespace_modifier_opcode());
    }
}
