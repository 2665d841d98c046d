use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::ProgramError;

/// one of the four components of a shader value
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Channel {
    X = 0,
    Y = 1,
    Z = 2,
    W = 3,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::X, Channel::Y, Channel::Z, Channel::W];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> char {
        ['x', 'y', 'z', 'w'][self.index()]
    }
}

/// a 4-bit set of destination channels
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Default)]
pub struct WriteMask(u8);

impl WriteMask {
    pub const NONE: WriteMask = WriteMask(0);
    pub const X: WriteMask = WriteMask(1);
    pub const Y: WriteMask = WriteMask(2);
    pub const Z: WriteMask = WriteMask(4);
    pub const W: WriteMask = WriteMask(8);
    pub const XY: WriteMask = WriteMask(3);
    pub const XYZ: WriteMask = WriteMask(7);
    pub const XYZW: WriteMask = WriteMask(15);

    pub const fn from_bits(bits: u8) -> Self {
        WriteMask(bits & 15)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn channel(channel: Channel) -> Self {
        WriteMask(1 << channel.index())
    }

    pub fn contains(self, channel: Channel) -> bool {
        self.0 & (1 << channel.index()) != 0
    }

    pub fn intersects(self, other: WriteMask) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn union(self, other: WriteMask) -> Self {
        WriteMask(self.0 | other.0)
    }

    pub fn intersection(self, other: WriteMask) -> Self {
        WriteMask(self.0 & other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = Channel> {
        Channel::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl Display for WriteMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for channel in self.iter() {
            write!(f, "{}", channel.name())?;
        }
        Ok(())
    }
}

impl FromStr for WriteMask {
    type Err = ProgramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mask = WriteMask::NONE;
        for c in s.chars() {
            let channel = match c {
                'x' | 'r' => Channel::X,
                'y' | 'g' => Channel::Y,
                'z' | 'b' => Channel::Z,
                'w' | 'a' => Channel::W,
                _ => return Err(ProgramError::InvalidWriteMask(s.to_string())),
            };
            mask = mask.union(WriteMask::channel(channel));
        }
        Ok(mask)
    }
}

/// register namespaces, each file is indexed independently
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum RegisterFile {
    /// no register: used for builtin constant operands
    Null,
    Temporary,
    Input,
    Output,
    Constant,
    Immediate,
    Address,
}

impl RegisterFile {
    pub fn name(self) -> &'static str {
        match self {
            RegisterFile::Null => "NULL",
            RegisterFile::Temporary => "TEMP",
            RegisterFile::Input => "INPUT",
            RegisterFile::Output => "OUTPUT",
            RegisterFile::Constant => "CONST",
            RegisterFile::Immediate => "IMM",
            RegisterFile::Address => "ADDR",
        }
    }

    pub fn is_writable(self) -> bool {
        matches!(self, RegisterFile::Temporary | RegisterFile::Output)
    }
}

impl Display for RegisterFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// what feeds one channel of a source operand
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum SwizzleSource {
    X,
    Y,
    Z,
    W,
    Zero,
    One,
}

impl SwizzleSource {
    pub fn channel(self) -> Option<Channel> {
        match self {
            SwizzleSource::X => Some(Channel::X),
            SwizzleSource::Y => Some(Channel::Y),
            SwizzleSource::Z => Some(Channel::Z),
            SwizzleSource::W => Some(Channel::W),
            SwizzleSource::Zero | SwizzleSource::One => None,
        }
    }

    pub fn is_forced(self) -> bool {
        self.channel().is_none()
    }

    pub fn name(self) -> char {
        match self {
            SwizzleSource::X => 'x',
            SwizzleSource::Y => 'y',
            SwizzleSource::Z => 'z',
            SwizzleSource::W => 'w',
            SwizzleSource::Zero => '0',
            SwizzleSource::One => '1',
        }
    }
}

impl From<Channel> for SwizzleSource {
    fn from(value: Channel) -> Self {
        match value {
            Channel::X => SwizzleSource::X,
            Channel::Y => SwizzleSource::Y,
            Channel::Z => SwizzleSource::Z,
            Channel::W => SwizzleSource::W,
        }
    }
}

/// per-channel source selection of an operand
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct Swizzle(pub [SwizzleSource; 4]);

impl Swizzle {
    pub const IDENTITY: Swizzle = Swizzle([SwizzleSource::X, SwizzleSource::Y, SwizzleSource::Z, SwizzleSource::W]);
    pub const ZERO: Swizzle = Swizzle([SwizzleSource::Zero; 4]);
    pub const ONE: Swizzle = Swizzle([SwizzleSource::One; 4]);

    pub fn splat(source: impl Into<SwizzleSource>) -> Self {
        Swizzle([source.into(); 4])
    }

    pub fn get(self, channel: Channel) -> SwizzleSource {
        self.0[channel.index()]
    }

    pub fn set(mut self, channel: Channel, source: SwizzleSource) -> Self {
        self.0[channel.index()] = source;
        self
    }

    /// apply `self` on top of an operand that is already swizzled by `inner`
    pub fn compose(self, inner: Swizzle) -> Swizzle {
        Swizzle(self.0.map(|s| match s.channel() {
            Some(c) => inner.get(c),
            None => s,
        }))
    }
}

impl Default for Swizzle {
    fn default() -> Self {
        Swizzle::IDENTITY
    }
}

impl Display for Swizzle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for s in self.0 {
            write!(f, "{}", s.name())?;
        }
        Ok(())
    }
}

impl FromStr for Swizzle {
    type Err = ProgramError;

    /// accepts 1 to 4 of `xyzw`/`rgba`/`0`/`1`, the last one is repeated
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut sources = Vec::with_capacity(4);
        for c in s.chars() {
            sources.push(match c {
                'x' | 'r' => SwizzleSource::X,
                'y' | 'g' => SwizzleSource::Y,
                'z' | 'b' => SwizzleSource::Z,
                'w' | 'a' => SwizzleSource::W,
                '0' => SwizzleSource::Zero,
                '1' => SwizzleSource::One,
                _ => return Err(ProgramError::InvalidSwizzle(s.to_string())),
            });
        }

        let last = match sources.last() {
            Some(last) if sources.len() <= 4 => *last,
            _ => return Err(ProgramError::InvalidSwizzle(s.to_string())),
        };

        sources.resize(4, last);
        Ok(Swizzle([sources[0], sources[1], sources[2], sources[3]]))
    }
}

/// sign modifier applied to a fetched source channel
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Default)]
pub enum SignMode {
    #[default]
    Keep,
    /// negate
    Toggle,
    /// absolute value
    Clear,
    /// negative absolute value
    Set,
}

impl SignMode {
    pub fn apply(self, value: f32) -> f32 {
        match self {
            SignMode::Keep => value,
            SignMode::Toggle => -value,
            SignMode::Clear => value.abs(),
            SignMode::Set => -value.abs(),
        }
    }

    pub fn is_abs(self) -> bool {
        matches!(self, SignMode::Clear | SignMode::Set)
    }

    pub fn is_negate(self) -> bool {
        matches!(self, SignMode::Toggle | SignMode::Set)
    }

    /// the sign mode that results from applying `outer` to a value that already went through `self`
    pub fn then(self, outer: SignMode) -> SignMode {
        match outer {
            SignMode::Keep => self,
            SignMode::Clear | SignMode::Set => outer,
            SignMode::Toggle => match self {
                SignMode::Keep => SignMode::Toggle,
                SignMode::Toggle => SignMode::Keep,
                SignMode::Clear => SignMode::Set,
                SignMode::Set => SignMode::Clear,
            },
        }
    }
}

/// destination clamping
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Default)]
pub enum Saturate {
    #[default]
    None,
    ZeroOne,
    MinusPlusOne,
}

impl Saturate {
    pub fn apply(self, value: f32) -> f32 {
        match self {
            Saturate::None => value,
            Saturate::ZeroOne => value.max(0.0).min(1.0),
            Saturate::MinusPlusOne => value.max(-1.0).min(1.0),
        }
    }
}

/// relational operators for lane comparisons
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunc {
    pub const ALL: [CompareFunc; 8] = [
        CompareFunc::Never,
        CompareFunc::Less,
        CompareFunc::Equal,
        CompareFunc::LessEqual,
        CompareFunc::Greater,
        CompareFunc::NotEqual,
        CompareFunc::GreaterEqual,
        CompareFunc::Always,
    ];

    /// ieee unordered comparison: any NaN operand makes every relation except `Never` hold
    pub fn eval_f32(self, a: f32, b: f32) -> bool {
        let unordered = a.is_nan() || b.is_nan();
        match self {
            CompareFunc::Never => false,
            CompareFunc::Always => true,
            CompareFunc::Less => unordered || a < b,
            CompareFunc::Equal => unordered || a == b,
            CompareFunc::LessEqual => unordered || a <= b,
            CompareFunc::Greater => unordered || a > b,
            CompareFunc::NotEqual => unordered || a != b,
            CompareFunc::GreaterEqual => unordered || a >= b,
        }
    }

    pub fn eval_ord<T: Ord>(self, a: T, b: T) -> bool {
        match self {
            CompareFunc::Never => false,
            CompareFunc::Always => true,
            CompareFunc::Less => a < b,
            CompareFunc::Equal => a == b,
            CompareFunc::LessEqual => a <= b,
            CompareFunc::Greater => a > b,
            CompareFunc::NotEqual => a != b,
            CompareFunc::GreaterEqual => a >= b,
        }
    }
}

/// a source operand
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct SrcRegister {
    pub file: RegisterFile,
    pub index: u32,
    /// address-register-relative indexing
    pub indirect: bool,
    pub swizzle: Swizzle,
    pub sign: [SignMode; 4],
}

impl SrcRegister {
    pub fn new(file: RegisterFile, index: u32) -> Self {
        Self {
            file,
            index,
            indirect: false,
            swizzle: Swizzle::IDENTITY,
            sign: [SignMode::Keep; 4],
        }
    }

    pub fn temp(index: u32) -> Self {
        Self::new(RegisterFile::Temporary, index)
    }

    pub fn input(index: u32) -> Self {
        Self::new(RegisterFile::Input, index)
    }

    pub fn constant(index: u32) -> Self {
        Self::new(RegisterFile::Constant, index)
    }

    pub fn immediate(index: u32) -> Self {
        Self::new(RegisterFile::Immediate, index)
    }

    /// register-less operand reading 1.0 on every channel
    pub fn one() -> Self {
        Self::new(RegisterFile::Null, 0).swizzle(Swizzle::ONE)
    }

    /// register-less operand reading 0.0 on every channel
    pub fn zero() -> Self {
        Self::new(RegisterFile::Null, 0).swizzle(Swizzle::ZERO)
    }

    pub fn swizzle(mut self, swizzle: Swizzle) -> Self {
        self.swizzle = swizzle;
        self
    }

    pub fn sign(mut self, mode: SignMode) -> Self {
        self.sign = [mode; 4];
        self
    }

    pub fn channel_sign(mut self, channel: Channel, mode: SignMode) -> Self {
        self.sign[channel.index()] = mode;
        self
    }

    pub fn negate(self) -> Self {
        self.sign(SignMode::Toggle)
    }

    pub fn abs(self) -> Self {
        self.sign(SignMode::Clear)
    }

    pub fn indirect(mut self) -> Self {
        self.indirect = true;
        self
    }

    pub fn sign_of(&self, channel: Channel) -> SignMode {
        self.sign[channel.index()]
    }

    /// the source channel read for destination channel `channel`, `None` when forced to 0 or 1
    pub fn source_channel(&self, channel: Channel) -> Option<Channel> {
        self.swizzle.get(channel).channel()
    }
}

impl Display for SrcRegister {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let uniform = self.sign.iter().all(|s| *s == self.sign[0]);
        let (pre, post) = match (uniform, self.sign[0]) {
            (true, SignMode::Toggle) => ("-", ""),
            (true, SignMode::Clear) => ("|", "|"),
            (true, SignMode::Set) => ("-|", "|"),
            _ => ("", ""),
        };

        write!(f, "{pre}{}", self.file.name())?;
        if self.file != RegisterFile::Null {
            if self.indirect {
                write!(f, "[ADDR[0].x+{}]", self.index)?;
            } else {
                write!(f, "[{}]", self.index)?;
            }
        }

        if uniform {
            if self.swizzle != Swizzle::IDENTITY {
                write!(f, ".{}", self.swizzle)?;
            }
            write!(f, "{post}")
        } else {
            write!(f, ".{{")?;
            for channel in Channel::ALL {
                let name = self.swizzle.get(channel).name();
                match self.sign_of(channel) {
                    SignMode::Keep => write!(f, "{name}")?,
                    SignMode::Toggle => write!(f, "-{name}")?,
                    SignMode::Clear => write!(f, "|{name}|")?,
                    SignMode::Set => write!(f, "-|{name}|")?,
                }
                if channel != Channel::W {
                    write!(f, ",")?;
                }
            }
            write!(f, "}}")
        }
    }
}

/// a destination operand
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct DstRegister {
    pub file: RegisterFile,
    pub index: u32,
    pub indirect: bool,
    pub write_mask: WriteMask,
}

impl DstRegister {
    pub fn new(file: RegisterFile, index: u32) -> Self {
        Self {
            file,
            index,
            indirect: false,
            write_mask: WriteMask::XYZW,
        }
    }

    pub fn temp(index: u32) -> Self {
        Self::new(RegisterFile::Temporary, index)
    }

    pub fn output(index: u32) -> Self {
        Self::new(RegisterFile::Output, index)
    }

    pub fn mask(mut self, write_mask: WriteMask) -> Self {
        self.write_mask = write_mask;
        self
    }

    pub fn indirect(mut self) -> Self {
        self.indirect = true;
        self
    }
}

impl Display for DstRegister {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.indirect {
            write!(f, "{}[ADDR[0].x+{}]", self.file.name(), self.index)?;
        } else {
            write!(f, "{}[{}]", self.file.name(), self.index)?;
        }

        if self.write_mask != WriteMask::XYZW {
            write!(f, ".{}", self.write_mask)?;
        }

        Ok(())
    }
}
