use std::fmt::{Display, Formatter, Result as FmtResult};

/// shader instruction opcodes
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Opcode {
    Arl,
    Mov,
    Lit,
    Rcp,
    Rsq,
    Exp,
    Log,
    Mul,
    Add,
    Dp3,
    Dp4,
    Dst,
    Min,
    Max,
    Slt,
    Sge,
    Mad,
    Sub,
    Lrp,
    Cnd,
    Dp2a,
    Frc,
    Clamp,
    Flr,
    Round,
    Ex2,
    Lg2,
    Pow,
    Xpd,
    Abs,
    Rcc,
    Dph,
    Cos,
    Ddx,
    Ddy,
    Kilp,
    Pk2h,
    Pk2us,
    Pk4b,
    Pk4ub,
    Rfl,
    Seq,
    Sfl,
    Sgt,
    Sin,
    Sle,
    Sne,
    Str,
    Tex,
    Txd,
    Txp,
    Up2h,
    Up2us,
    Up4b,
    Up4ub,
    X2d,
    Ara,
    Arr,
    Bra,
    Cal,
    Ret,
    Ssg,
    Cmp,
    Scs,
    Txb,
    Nrm,
    Div,
    Dp2,
    Txl,
    Brk,
    If,
    Else,
    EndIf,
    Push,
    Pop,
    BgnLoop,
    EndLoop,
    Cont,
    BgnSub,
    EndSub,
    Nop,
    Nrm4,
    Ceil,
    I2f,
    Not,
    Trunc,
    Shl,
    Shr,
    And,
    Or,
    Mod,
    Xor,
    Sad,
    Txf,
    Txq,
    Emit,
    EndPrim,
    Swz,
    Kil,
    End,
}

/// static properties of an opcode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub mnemonic: &'static str,
    pub num_dst: u8,
    pub num_src: u8,
    pub is_control_flow: bool,
}

impl Opcode {
    pub fn info(self) -> OpcodeInfo {
        use Opcode::*;

        let (mnemonic, num_dst, num_src) = match self {
            Arl => ("ARL", 1, 1),
            Mov => ("MOV", 1, 1),
            Lit => ("LIT", 1, 1),
            Rcp => ("RCP", 1, 1),
            Rsq => ("RSQ", 1, 1),
            Exp => ("EXP", 1, 1),
            Log => ("LOG", 1, 1),
            Mul => ("MUL", 1, 2),
            Add => ("ADD", 1, 2),
            Dp3 => ("DP3", 1, 2),
            Dp4 => ("DP4", 1, 2),
            Dst => ("DST", 1, 2),
            Min => ("MIN", 1, 2),
            Max => ("MAX", 1, 2),
            Slt => ("SLT", 1, 2),
            Sge => ("SGE", 1, 2),
            Mad => ("MAD", 1, 3),
            Sub => ("SUB", 1, 2),
            Lrp => ("LRP", 1, 3),
            Cnd => ("CND", 1, 3),
            Dp2a => ("DP2A", 1, 3),
            Frc => ("FRC", 1, 1),
            Clamp => ("CLAMP", 1, 3),
            Flr => ("FLR", 1, 1),
            Round => ("ROUND", 1, 1),
            Ex2 => ("EX2", 1, 1),
            Lg2 => ("LG2", 1, 1),
            Pow => ("POW", 1, 2),
            Xpd => ("XPD", 1, 2),
            Abs => ("ABS", 1, 1),
            Rcc => ("RCC", 1, 1),
            Dph => ("DPH", 1, 2),
            Cos => ("COS", 1, 1),
            Ddx => ("DDX", 1, 1),
            Ddy => ("DDY", 1, 1),
            Kilp => ("KILP", 0, 0),
            Pk2h => ("PK2H", 1, 1),
            Pk2us => ("PK2US", 1, 1),
            Pk4b => ("PK4B", 1, 1),
            Pk4ub => ("PK4UB", 1, 1),
            Rfl => ("RFL", 1, 2),
            Seq => ("SEQ", 1, 2),
            Sfl => ("SFL", 1, 2),
            Sgt => ("SGT", 1, 2),
            Sin => ("SIN", 1, 1),
            Sle => ("SLE", 1, 2),
            Sne => ("SNE", 1, 2),
            Str => ("STR", 1, 2),
            Tex => ("TEX", 1, 1),
            Txd => ("TXD", 1, 3),
            Txp => ("TXP", 1, 1),
            Up2h => ("UP2H", 1, 1),
            Up2us => ("UP2US", 1, 1),
            Up4b => ("UP4B", 1, 1),
            Up4ub => ("UP4UB", 1, 1),
            X2d => ("X2D", 1, 3),
            Ara => ("ARA", 1, 1),
            Arr => ("ARR", 1, 1),
            Bra => ("BRA", 0, 0),
            Cal => ("CAL", 0, 0),
            Ret => ("RET", 0, 0),
            Ssg => ("SSG", 1, 1),
            Cmp => ("CMP", 1, 3),
            Scs => ("SCS", 1, 1),
            Txb => ("TXB", 1, 1),
            Nrm => ("NRM", 1, 1),
            Div => ("DIV", 1, 2),
            Dp2 => ("DP2", 1, 2),
            Txl => ("TXL", 1, 1),
            Brk => ("BRK", 0, 0),
            If => ("IF", 0, 1),
            Else => ("ELSE", 0, 0),
            EndIf => ("ENDIF", 0, 0),
            Push => ("PUSH", 0, 1),
            Pop => ("POP", 1, 0),
            BgnLoop => ("BGNLOOP", 0, 0),
            EndLoop => ("ENDLOOP", 0, 0),
            Cont => ("CONT", 0, 0),
            BgnSub => ("BGNSUB", 0, 0),
            EndSub => ("ENDSUB", 0, 0),
            Nop => ("NOP", 0, 0),
            Nrm4 => ("NRM4", 1, 1),
            Ceil => ("CEIL", 1, 1),
            I2f => ("I2F", 1, 1),
            Not => ("NOT", 1, 1),
            Trunc => ("TRUNC", 1, 1),
            Shl => ("SHL", 1, 2),
            Shr => ("SHR", 1, 2),
            And => ("AND", 1, 2),
            Or => ("OR", 1, 2),
            Mod => ("MOD", 1, 2),
            Xor => ("XOR", 1, 2),
            Sad => ("SAD", 1, 3),
            Txf => ("TXF", 1, 2),
            Txq => ("TXQ", 1, 2),
            Emit => ("EMIT", 0, 0),
            EndPrim => ("ENDPRIM", 0, 0),
            Swz => ("SWZ", 1, 1),
            Kil => ("KIL", 0, 1),
            End => ("END", 0, 0),
        };

        OpcodeInfo {
            mnemonic,
            num_dst,
            num_src,
            is_control_flow: matches!(
                self,
                Bra | Cal | Ret | Brk | If | Else | EndIf | BgnLoop | EndLoop | Cont | BgnSub | EndSub
            ),
        }
    }

    pub fn mnemonic(self) -> &'static str {
        self.info().mnemonic
    }

    pub fn is_texture(self) -> bool {
        matches!(self, Opcode::Tex | Opcode::Txb | Opcode::Txl | Opcode::Txp | Opcode::Txd | Opcode::Txf)
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.mnemonic())
    }
}

/// texture dimensionality, as declared on a texture instruction
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum TextureTarget {
    Tex1D,
    Tex2D,
    Tex3D,
    Cube,
    Rect,
    Shadow1D,
    Shadow2D,
    ShadowRect,
}

impl TextureTarget {
    /// number of coordinate channels fed to the sampler
    pub fn num_coords(self) -> usize {
        match self {
            TextureTarget::Tex1D => 1,
            TextureTarget::Tex2D | TextureTarget::Rect => 2,
            TextureTarget::Shadow1D | TextureTarget::Shadow2D | TextureTarget::ShadowRect => 3,
            TextureTarget::Tex3D | TextureTarget::Cube => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TextureTarget::Tex1D => "1D",
            TextureTarget::Tex2D => "2D",
            TextureTarget::Tex3D => "3D",
            TextureTarget::Cube => "CUBE",
            TextureTarget::Rect => "RECT",
            TextureTarget::Shadow1D => "SHADOW1D",
            TextureTarget::Shadow2D => "SHADOW2D",
            TextureTarget::ShadowRect => "SHADOWRECT",
        }
    }
}
