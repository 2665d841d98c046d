use lanepair::{
    Channel, DstRegister, FragmentCode, FragmentCompiler, Instruction, Opcode, Program, RegisterFile, Saturate,
    SignMode, SrcRegister, Swizzle, SwizzleSource, TextureTarget, WriteMask,
    sched::{
        HalfOpcode, MAX_HW_TEMPS, PairCodeBuffer, PairInstruction, PairSource, PairTarget, ScheduledUnit, TexOpcode,
        pair_program,
    },
    soa::{Batch, LodMode, NoTextures, ShaderResult, SoaBackend, TexelSource, UNDEF_BITS},
};

/// the addition scenario from the lane translator's documentation
/// tests:
/// - a partial write mask leaves the other channels of a temporary undefined
/// - a full-mask copy of a partially written temporary carries the undefined sentinel into the output
/// - an output that was never written reads as the sentinel too
#[test]
fn add_then_copy() {
    let program = Program::builder()
        .declare(RegisterFile::Input, 0..=1)
        .op(
            Opcode::Add,
            DstRegister::temp(0).mask(WriteMask::XYZ),
            [SrcRegister::input(0), SrcRegister::input(1)],
        )
        .op(Opcode::Mov, DstRegister::output(0), [SrcRegister::temp(0)])
        .build()
        .unwrap();

    let inputs = [[1.0, 2.0, 3.0, 4.0], [0.5, -2.0, 10.0, 8.0], [-1.0, 0.0, 0.25, 1.0], [7.0, 7.0, 7.0, 7.0]];
    let result = run_lanes(&program, &inputs, 2, &[], &NoTextures);

    for element in 0..2 {
        let (a, b) = (inputs[element * 2], inputs[element * 2 + 1]);
        let out = result.output(element, 0);
        assert_eq!(&out[..3], &[a[0] + b[0], a[1] + b[1], a[2] + b[2]]);
        assert_eq!(out[3].to_bits(), UNDEF_BITS);
        assert!(result.is_active(element));
    }

    // an output register below the one written is left untouched
    let program = Program::builder()
        .declare(RegisterFile::Input, 0..=1)
        .op(
            Opcode::Add,
            DstRegister::temp(0).mask(WriteMask::XYZ),
            [SrcRegister::input(0), SrcRegister::input(1)],
        )
        .op(Opcode::Mov, DstRegister::output(1), [SrcRegister::temp(0)])
        .build()
        .unwrap();
    let result = run_lanes(&program, &inputs, 2, &[], &NoTextures);
    assert_eq!(result.num_outputs(), 2);
    assert_eq!(result.output(1, 0).map(f32::to_bits), [UNDEF_BITS; 4]);
    assert_eq!(result.output(0, 1)[0], 1.5);
}

/// tests:
/// - forced 0/1 swizzles ignore the register contents
/// - sign modes are applied after the swizzle picked the source channel
#[test]
fn forced_swizzle_and_sign() {
    let program = Program::builder()
        .declare(RegisterFile::Input, 0..=0)
        .op(
            Opcode::Mov,
            DstRegister::output(0),
            [SrcRegister::input(0)
                .swizzle("z01x".parse().unwrap())
                .channel_sign(Channel::X, SignMode::Set)
                .channel_sign(Channel::Y, SignMode::Toggle)
                .channel_sign(Channel::W, SignMode::Clear)],
        )
        .build()
        .unwrap();

    let inputs = [[-3.0, 100.0, 2.0, 9.0], [5.0, f32::NAN, -4.0, 9.0], [f32::INFINITY, -1.0, 0.5, 9.0]];
    let result = run_lanes(&program, &inputs, 3, &[], &NoTextures);

    for (element, input) in inputs.iter().enumerate() {
        let out = result.output(element, 0);
        assert_eq!(out[0], -input[2].abs());
        assert_eq!(out[1], -0.0);
        assert_eq!(out[2], 1.0);
        assert_eq!(out[3], input[0].abs());
    }
}

/// tests:
/// - every KIL can only clear lanes, never reactivate them
/// - the final mask is the intersection of what every KIL kept
#[test]
fn kill_is_monotonic() {
    let kills = [
        SrcRegister::input(0),
        SrcRegister::input(0).swizzle("wwww".parse().unwrap()).negate(),
        SrcRegister::input(1).swizzle("xy11".parse().unwrap()),
    ];

    let mut rng = Lcg(7);
    let elements = 40;
    let inputs = (0..elements * 2)
        .map(|_| [0; 4].map(|_| rng.signed()))
        .collect::<Vec<_>>();
    let coverage = (0..elements).map(|i| i % 5 != 0).collect::<Vec<_>>();

    let mut previous = coverage.clone();
    for count in 1..=kills.len() {
        let mut builder = Program::builder().declare(RegisterFile::Input, 0..=1);
        for src in &kills[..count] {
            builder = builder.inst(Instruction::new(Opcode::Kil).src(*src));
        }
        builder = builder.op(Opcode::Mov, DstRegister::output(0), [SrcRegister::input(0)]);
        let program = builder.build().unwrap();

        let mut backend = SoaBackend::new();
        let id = backend.create_shader(&program).unwrap();
        let result = backend
            .dispatch(
                id,
                &Batch {
                    elements,
                    inputs: &inputs,
                    constants: &[],
                    coverage: Some(&coverage),
                    texels: &NoTextures,
                },
            )
            .unwrap();

        for element in 0..elements {
            let kept = Channel::ALL.iter().all(|c| {
                let value = reference_fetch(&kills[count - 1], *c, &inputs[element * 2..element * 2 + 2], &[], &[]);
                value >= 0.0
            });

            assert_eq!(result.is_active(element), previous[element] && kept, "element {element} after {count} KIL");
            assert!(!result.is_active(element) || previous[element]);
        }

        previous = result.mask().to_vec();
    }
}

/// tests:
/// - set-on-compare opcodes agree with the scalar relation for signed zeros, infinities and denormals
/// - results are exactly 0.0 or 1.0
#[test]
fn compare_grid() {
    let values = [0.0, -0.0, 1.0, -1.0, f32::INFINITY, f32::NEG_INFINITY, f32::MIN_POSITIVE / 2.0, f32::MAX];
    let opcodes: [(Opcode, fn(f32, f32) -> bool); 6] = [
        (Opcode::Slt, |a, b| a < b),
        (Opcode::Sle, |a, b| a <= b),
        (Opcode::Sgt, |a, b| a > b),
        (Opcode::Sge, |a, b| a >= b),
        (Opcode::Seq, |a, b| a == b),
        (Opcode::Sne, |a, b| a != b),
    ];

    // one element per pair, both operands broadcast over all channels
    let mut inputs = Vec::new();
    for a in values {
        for b in values {
            inputs.push([a; 4]);
            inputs.push([b; 4]);
        }
    }
    let elements = values.len() * values.len();

    for (opcode, relation) in opcodes {
        let program = Program::builder()
            .declare(RegisterFile::Input, 0..=1)
            .op(opcode, DstRegister::output(0), [SrcRegister::input(0), SrcRegister::input(1)])
            .build()
            .unwrap();

        let result = run_lanes(&program, &inputs, elements, &[], &NoTextures);
        for element in 0..elements {
            let (a, b) = (inputs[element * 2][0], inputs[element * 2 + 1][0]);
            let expected = if relation(a, b) { 1.0 } else { 0.0 };
            assert_eq!(result.output(element, 0), [expected; 4], "{opcode} {a} {b}");
        }
    }
}

/// tests:
/// - an rgb-only and an alpha-only instruction without dependencies share one ALU instruction
#[test]
fn independent_halves_pair() {
    let program = Program::builder()
        .declare(RegisterFile::Input, 0..=1)
        .op(
            Opcode::Add,
            DstRegister::temp(0).mask(WriteMask::XYZ),
            [SrcRegister::input(0), SrcRegister::input(1)],
        )
        .op(
            Opcode::Mul,
            DstRegister::temp(1).mask(WriteMask::W),
            [SrcRegister::input(0), SrcRegister::input(1)],
        )
        .op(
            Opcode::Mov,
            DstRegister::output(0).mask(WriteMask::XYZ),
            [SrcRegister::temp(0)],
        )
        .op(
            Opcode::Mov,
            DstRegister::output(0).mask(WriteMask::W),
            [SrcRegister::temp(1)],
        )
        .build()
        .unwrap();

    let mut buffer = PairCodeBuffer::new(PairTarget::default());
    pair_program(&program, &mut buffer).unwrap();

    assert_eq!(buffer.alu_count(), 2, "{buffer}");
    for pair in buffer.alu() {
        assert_eq!(pair.rgb.opcode, HalfOpcode::Alu(Opcode::Mad));
        assert_eq!(pair.alpha.opcode, HalfOpcode::Alu(Opcode::Mad));
    }

    let outputs = simulate(&buffer, &[[1.0, 2.0, 3.0, 4.0], [0.5, 0.5, 0.5, 3.0]], &[]);
    assert_eq!(outputs[0], [1.5, 2.5, 3.5, 12.0]);
}

/// schedules and runs random straight-line programs on both backends
/// tests:
/// - the emitted order respects every read-after-write and write-after-read hazard, checked by replaying
///   the scheduled code on hardware registers against a sequential interpretation of the program
/// - repeated and partially overlapping color and depth writes land in program order
/// - hardware temporaries are recycled without clobbering live values
/// - paired instructions never use more than three distinct sources per half
/// - the lane backend computes the same results
#[test]
fn random_programs() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let constants = [[0.5, -0.75, 1.25, 2.0], [-1.5, 0.25, 1.0, -0.5]];
    let mut rng = Lcg(0x5eed);

    for seed in 0..150 {
        let program = random_program(&mut rng);

        let elements = 5;
        let inputs = (0..elements * 2)
            .map(|_| [0; 4].map(|_| rng.magnitude()))
            .collect::<Vec<_>>();

        let target = PairTarget {
            max_hw_temps: 16,
            ..PairTarget::default()
        };
        let mut buffer = PairCodeBuffer::new(target);
        if let Err(err) = pair_program(&program, &mut buffer) {
            panic!("program {seed} failed to schedule: {err}\n{program}");
        }

        for pair in buffer.alu() {
            assert!(distinct_sources(&pair.rgb.src) <= 3 && distinct_sources(&pair.alpha.src) <= 3);
            check_arguments(pair);
        }

        let lanes = run_lanes(&program, &inputs, elements, &constants, &Ramp);

        for element in 0..elements {
            let inputs = &inputs[element * 2..element * 2 + 2];
            // values that overflowed are compared by nobody
            let Some(expected) = reference(&program, inputs, &constants) else {
                continue;
            };
            let scheduled = simulate(&buffer, inputs, &constants);

            let checks = [
                (expected[0], scheduled[0], lanes.output(element, 0), WriteMask::XYZW),
                (expected[1], scheduled[1], lanes.output(element, 1), WriteMask::W),
            ];

            for (expected, scheduled, lanes, mask) in checks {
                for c in mask.iter().map(Channel::index) {
                    assert!(
                        close(expected[c], scheduled[c]),
                        "program {seed}, element {element}: expected {expected:?}, scheduled {scheduled:?}\n{program}\n{buffer}"
                    );
                    assert!(
                        close(expected[c], lanes[c]),
                        "program {seed}, element {element}: expected {expected:?}, lanes {lanes:?}\n{program}"
                    );
                }
            }
        }
    }
}

/// tests:
/// - the compiler hands out paired code when the schedule succeeds
/// - programs the paired target cannot express still run as lane code
#[test]
fn compiler_fallback() {
    let mut compiler = FragmentCompiler::default();

    let paired = Program::builder()
        .declare(RegisterFile::Input, 0..=0)
        .inst(
            Instruction::new(Opcode::Tex)
                .dst(DstRegister::temp(0))
                .src(SrcRegister::input(0))
                .texture(0, TextureTarget::Tex2D),
        )
        .op(
            Opcode::Mul,
            DstRegister::output(0),
            [SrcRegister::temp(0), SrcRegister::input(0)],
        )
        .build()
        .unwrap();

    let FragmentCode::Paired(buffer) = compiler.compile(&paired).unwrap() else {
        panic!("expected paired code");
    };
    assert!(matches!(&buffer.units()[0], ScheduledUnit::TexBlock(block) if block[0].opcode == TexOpcode::Tex));
    let outputs = simulate(&buffer, &[[0.5, 0.25, 0.0, 1.0]], &[]);
    let texel = texel(0.5, 0.25);
    assert_eq!(outputs[0], [texel[0] * 0.5, texel[1] * 0.25, texel[2] * 0.0, texel[3] * 1.0]);

    // a -1..1 clamp has no paired encoding
    let lanes = Program::builder()
        .declare(RegisterFile::Input, 0..=0)
        .inst(
            Instruction::new(Opcode::Mov)
                .dst(DstRegister::output(0))
                .src(SrcRegister::input(0))
                .saturate(Saturate::MinusPlusOne),
        )
        .build()
        .unwrap();

    let FragmentCode::Lanes(id) = compiler.compile(&lanes).unwrap() else {
        panic!("expected lane code");
    };
    let result = compiler
        .dispatch(
            id,
            &Batch {
                elements: 1,
                inputs: &[[-3.0, -0.5, 0.5, 3.0]],
                constants: &[],
                coverage: None,
                texels: &NoTextures,
            },
        )
        .unwrap();
    assert_eq!(result.output(0, 0), [-1.0, -0.5, 0.5, 1.0]);
}

/// compiles `program` on a fresh lane backend and runs it over `elements` elements
fn run_lanes(
    program: &Program,
    inputs: &[[f32; 4]],
    elements: usize,
    constants: &[[f32; 4]],
    texels: &dyn TexelSource,
) -> ShaderResult {
    let mut backend = SoaBackend::new();
    let id = backend.create_shader(program).unwrap();
    backend
        .dispatch(
            id,
            &Batch {
                elements,
                inputs,
                constants,
                coverage: None,
                texels,
            },
        )
        .unwrap()
}

fn close(a: f32, b: f32) -> bool {
    a == b || (a - b).abs() <= 1e-3 * a.abs().max(1.0)
}

fn texel(s: f32, t: f32) -> [f32; 4] {
    [s + t, s * t, s - t, 0.5 * s]
}

struct Ramp;

impl TexelSource for Ramp {
    fn fetch_texel(&self, _: u32, coords: [f32; 3], _: f32, _: LodMode) -> [f32; 4] {
        texel(coords[0], coords[1])
    }
}

struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    fn below(&mut self, n: u32) -> u32 {
        self.next() % n
    }

    fn unit(&mut self) -> f32 {
        self.next() as f32 / (1u64 << 31) as f32
    }

    fn signed(&mut self) -> f32 {
        self.unit() * 2.0 - 1.0
    }

    /// a value with magnitude in 0.5..2, never close to zero
    fn magnitude(&mut self) -> f32 {
        let value = 0.5 + self.unit() * 1.5;
        if self.below(2) == 0 { value } else { -value }
    }
}

const BODY_TEMPS: u32 = 6;

fn random_swizzle(rng: &mut Lcg, forced: bool) -> Swizzle {
    if rng.below(3) == 0 {
        return Swizzle::IDENTITY;
    }

    let choices = [
        SwizzleSource::X,
        SwizzleSource::Y,
        SwizzleSource::Z,
        SwizzleSource::W,
        SwizzleSource::Zero,
        SwizzleSource::One,
    ];
    let range = if forced { 6 } else { 4 };
    Swizzle([0; 4].map(|_| choices[rng.below(range) as usize]))
}

fn random_src(rng: &mut Lcg) -> SrcRegister {
    let src = match rng.below(6) {
        0 => SrcRegister::input(rng.below(2)),
        1 => SrcRegister::constant(rng.below(2)),
        _ => SrcRegister::temp(rng.below(BODY_TEMPS)),
    };

    let sign = match rng.below(8) {
        0 => SignMode::Toggle,
        1 => SignMode::Clear,
        2 => SignMode::Set,
        _ => SignMode::Keep,
    };
    src.swizzle(random_swizzle(rng, true)).sign(sign)
}

fn random_program(rng: &mut Lcg) -> Program {
    let mut builder = Program::builder().declare(RegisterFile::Input, 0..=1);

    for t in 0..BODY_TEMPS {
        builder = builder.op(
            Opcode::Add,
            DstRegister::temp(t),
            [
                SrcRegister::input(t % 2).swizzle(random_swizzle(rng, false)),
                SrcRegister::constant(t % 2).swizzle(random_swizzle(rng, false)),
            ],
        );
    }

    for _ in 0..24 {
        let mask = WriteMask::from_bits(1 + rng.below(15) as u8);
        let temp = DstRegister::temp(rng.below(BODY_TEMPS)).mask(mask);
        // early color and depth writes that later writes have to overwrite
        let dst = match rng.below(8) {
            0 => DstRegister::output(0).mask(mask),
            1 => DstRegister::output(1).mask(WriteMask::W),
            _ => temp,
        };

        let opcodes = [
            Opcode::Mov,
            Opcode::Add,
            Opcode::Mul,
            Opcode::Mad,
            Opcode::Max,
            Opcode::Min,
            Opcode::Dp3,
            Opcode::Dp4,
            Opcode::Cmp,
            Opcode::Rcp,
            Opcode::Tex,
        ];
        let opcode = opcodes[rng.below(opcodes.len() as u32) as usize];

        let inst = match opcode {
            Opcode::Tex => {
                let src = match rng.below(2) {
                    0 => SrcRegister::input(rng.below(2)),
                    _ => SrcRegister::temp(rng.below(BODY_TEMPS)),
                };
                Instruction::new(Opcode::Tex)
                    .dst(temp)
                    .src(src.swizzle(random_swizzle(rng, false)))
                    .texture(0, TextureTarget::Tex2D)
            }
            // reciprocals only of inputs, which stay away from zero
            Opcode::Rcp => Instruction::new(Opcode::Rcp).dst(dst).src(
                SrcRegister::input(rng.below(2))
                    .swizzle(random_swizzle(rng, false))
                    .sign(if rng.below(2) == 0 { SignMode::Keep } else { SignMode::Toggle }),
            ),
            _ => {
                let mut inst = Instruction::new(opcode).dst(dst);
                for _ in 0..opcode.info().num_src {
                    inst = inst.src(random_src(rng));
                }
                if rng.below(4) == 0 {
                    inst = inst.saturate(Saturate::ZeroOne);
                }
                inst
            }
        };
        builder = builder.inst(inst);
    }

    // fold every temporary into the color output
    let sum = BODY_TEMPS;
    builder = builder.op(Opcode::Mov, DstRegister::temp(sum), [SrcRegister::temp(0)]);
    for t in 1..BODY_TEMPS {
        builder = builder.op(
            Opcode::Mad,
            DstRegister::temp(sum),
            [
                SrcRegister::temp(sum),
                SrcRegister::constant(0).swizzle(Swizzle::splat(Channel::X)),
                SrcRegister::temp(t),
            ],
        );
    }

    builder = builder.op(Opcode::Mov, DstRegister::output(0), [SrcRegister::temp(sum)]);
    for _ in 0..rng.below(3) {
        builder = builder.op(
            Opcode::Max,
            DstRegister::output(0).mask(WriteMask::from_bits(1 + rng.below(15) as u8)),
            [random_src(rng), random_src(rng)],
        );
    }

    for _ in 0..1 + rng.below(2) {
        let depth = Channel::ALL[rng.below(4) as usize];
        builder = builder.op(
            Opcode::Mov,
            DstRegister::output(1).mask(WriteMask::W),
            [SrcRegister::temp(rng.below(BODY_TEMPS)).swizzle(Swizzle::splat(depth))],
        );
    }

    builder.build().unwrap()
}

fn reference_fetch(
    src: &SrcRegister,
    channel: Channel,
    inputs: &[[f32; 4]],
    constants: &[[f32; 4]],
    temps: &[[f32; 4]],
) -> f32 {
    let value = match src.swizzle.get(channel) {
        SwizzleSource::Zero => 0.0,
        SwizzleSource::One => 1.0,
        source => {
            let c = source.channel().map(Channel::index).unwrap_or_default();
            let registers = match src.file {
                RegisterFile::Input => inputs,
                RegisterFile::Constant => constants,
                RegisterFile::Temporary => temps,
                file => panic!("cannot read {file}"),
            };
            registers[src.index as usize][c]
        }
    };
    src.sign_of(channel).apply(value)
}

/// sequential interpretation of a program, returns the color and depth outputs
///
/// `None` once any written value is not finite, comparisons against NaN differ between the backends.
fn reference(program: &Program, inputs: &[[f32; 4]], constants: &[[f32; 4]]) -> Option<[[f32; 4]; 2]> {
    let mut temps = vec![[f32::NAN; 4]; program.register_count(RegisterFile::Temporary) as usize];
    let mut outputs = [[f32::NAN; 4]; 2];

    for inst in program.instructions() {
        let fetch = |i: usize, c: Channel| reference_fetch(&inst.src[i], c, inputs, constants, &temps);
        let dot = |n: usize| {
            Channel::ALL[..n]
                .iter()
                .map(|c| fetch(0, *c) * fetch(1, *c))
                .reduce(|a, b| a + b)
                .unwrap_or(0.0)
        };

        let result = match inst.opcode {
            Opcode::Dp3 => [dot(3); 4],
            Opcode::Dp4 => [dot(4); 4],
            Opcode::Rcp => [1.0 / fetch(0, Channel::X); 4],
            Opcode::Tex => texel(fetch(0, Channel::X), fetch(0, Channel::Y)),
            opcode => Channel::ALL.map(|c| match opcode {
                Opcode::Mov => fetch(0, c),
                Opcode::Add => fetch(0, c) + fetch(1, c),
                Opcode::Mul => fetch(0, c) * fetch(1, c),
                Opcode::Mad => fetch(0, c) * fetch(1, c) + fetch(2, c),
                Opcode::Max => fetch(0, c).max(fetch(1, c)),
                Opcode::Min => fetch(0, c).min(fetch(1, c)),
                Opcode::Cmp => match fetch(0, c) < 0.0 {
                    true => fetch(1, c),
                    false => fetch(2, c),
                },
                opcode => panic!("no reference for {opcode}"),
            }),
        };

        let Some(dst) = inst.dst else { continue };
        let register = match dst.file {
            RegisterFile::Temporary => &mut temps[dst.index as usize],
            _ => &mut outputs[dst.index as usize],
        };
        for c in dst.write_mask.iter().map(Channel::index) {
            register[c] = inst.saturate.apply(result[c]);
            if !register[c].is_finite() {
                return None;
            }
        }
    }

    Some(outputs)
}

fn distinct_sources(sources: &[PairSource; 3]) -> usize {
    let mut used = sources.iter().filter(|s| s.used).collect::<Vec<_>>();
    used.sort_by_key(|s| (s.constant, s.index));
    used.dedup();
    used.len()
}

/// every argument that reads a register points at a slot that holds one
fn check_arguments(pair: &PairInstruction) {
    for arg in &pair.rgb.args[..pair.rgb.opcode.num_args().min(3)] {
        for s in arg.swizzle {
            match s {
                SwizzleSource::W => assert!(pair.alpha.src[arg.source].used, "{pair}"),
                SwizzleSource::X | SwizzleSource::Y | SwizzleSource::Z => {
                    assert!(pair.rgb.src[arg.source].used, "{pair}")
                }
                SwizzleSource::Zero | SwizzleSource::One => {}
            }
        }
    }
    for arg in &pair.alpha.args[..pair.alpha.opcode.num_args().min(3)] {
        match arg.swizzle {
            SwizzleSource::W => assert!(pair.alpha.src[arg.source].used, "{pair}"),
            SwizzleSource::X | SwizzleSource::Y | SwizzleSource::Z => assert!(pair.rgb.src[arg.source].used, "{pair}"),
            SwizzleSource::Zero | SwizzleSource::One => {}
        }
    }
}

fn modify(value: f32, abs: bool, negate: bool) -> f32 {
    let value = if abs { value.abs() } else { value };
    if negate { -value } else { value }
}

fn swizzled(value: [f32; 4], swizzle: Swizzle) -> [f32; 4] {
    swizzle.0.map(|s| match s {
        SwizzleSource::Zero => 0.0,
        SwizzleSource::One => 1.0,
        s => value[s.channel().map(Channel::index).unwrap_or_default()],
    })
}

/// replays scheduled code on hardware registers, returns the color and depth outputs
fn simulate(buffer: &PairCodeBuffer, inputs: &[[f32; 4]], constants: &[[f32; 4]]) -> [[f32; 4]; 2] {
    let mut hw = vec![[f32::NAN; 4]; MAX_HW_TEMPS as usize];
    let (mut color, mut depth) = ([f32::NAN; 4], [f32::NAN; 4]);

    for (input, hw_index) in buffer.inputs() {
        hw[*hw_index as usize] = inputs[*input as usize];
    }

    for unit in buffer.units() {
        let pair = match unit {
            ScheduledUnit::TexBlock(block) => {
                for tex in block.iter().filter(|tex| tex.opcode != TexOpcode::Kil) {
                    let coords = swizzled(hw[tex.src_index as usize], tex.src_swizzle);
                    let texel = texel(coords[0], coords[1]);
                    for c in tex.write_mask.iter().map(Channel::index) {
                        hw[tex.dest_index as usize][c] = texel[c];
                    }
                }
                continue;
            }
            ScheduledUnit::Alu(pair) => pair,
        };

        let slot = |src: &PairSource| match src.constant {
            true => constants[src.index as usize],
            false => hw[src.index as usize],
        };
        let read = |source: usize, s: SwizzleSource| match s {
            SwizzleSource::Zero => 0.0,
            SwizzleSource::One => 1.0,
            SwizzleSource::W => slot(&pair.alpha.src[source])[3],
            s => slot(&pair.rgb.src[source])[s.channel().map(Channel::index).unwrap_or_default()],
        };

        let rgb_args = pair
            .rgb
            .args
            .map(|arg| arg.swizzle.map(|s| modify(read(arg.source, s), arg.abs, arg.negate)));
        let alpha_args = pair
            .alpha
            .args
            .map(|arg| modify(read(arg.source, arg.swizzle), arg.abs, arg.negate));

        let dot3 = (0..3)
            .map(|c| rgb_args[0][c] * rgb_args[1][c])
            .reduce(|a, b| a + b)
            .unwrap_or(0.0);
        let dot4 = dot3 + alpha_args[0] * alpha_args[1];

        let scalar = |op: Opcode, a: [f32; 3]| match op {
            Opcode::Mad => a[0] * a[1] + a[2],
            Opcode::Max => a[0].max(a[1]),
            Opcode::Min => a[0].min(a[1]),
            Opcode::Cmp => match a[2] >= 0.0 {
                true => a[0],
                false => a[1],
            },
            op => panic!("no scalar hardware op {op}"),
        };

        let clamp = |value: f32, saturate: bool| match saturate {
            true => value.max(0.0).min(1.0),
            false => value,
        };

        let alpha = match pair.alpha.opcode {
            HalfOpcode::Nop => f32::NAN,
            HalfOpcode::Alu(Opcode::Dp3) => dot3,
            HalfOpcode::Alu(Opcode::Dp4) => dot4,
            HalfOpcode::Alu(Opcode::Rcp) => 1.0 / alpha_args[0],
            HalfOpcode::Alu(op) => scalar(op, alpha_args),
            HalfOpcode::ReplicateAlpha => panic!("alpha half cannot replicate itself"),
        };
        let alpha = clamp(alpha, pair.alpha.saturate);

        let rgb = match pair.rgb.opcode {
            HalfOpcode::Nop => [f32::NAN; 3],
            HalfOpcode::ReplicateAlpha => [alpha; 3],
            HalfOpcode::Alu(Opcode::Dp3) => [dot3; 3],
            HalfOpcode::Alu(Opcode::Dp4) => [dot4; 3],
            HalfOpcode::Alu(op) => [0, 1, 2].map(|c| scalar(op, [rgb_args[0][c], rgb_args[1][c], rgb_args[2][c]])),
        };
        let rgb = rgb.map(|value| clamp(value, pair.rgb.saturate));

        for c in pair.rgb.write_mask.iter().map(Channel::index) {
            hw[pair.rgb.dest_index as usize][c] = rgb[c];
        }
        for c in pair.rgb.output_write_mask.iter().map(Channel::index) {
            color[c] = rgb[c];
        }
        if pair.alpha.write {
            hw[pair.alpha.dest_index as usize][3] = alpha;
        }
        if pair.alpha.output_write {
            color[3] = alpha;
        }
        if pair.alpha.depth_write {
            depth[3] = alpha;
        }
    }

    [color, depth]
}
