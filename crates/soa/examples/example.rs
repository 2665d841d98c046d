use lanepair_core::{Channel, DstRegister, Instruction, Opcode, Program, RegisterFile, Saturate, SrcRegister, Swizzle, WriteMask};
use lanepair_soa::{Batch, NoTextures, SoaBackend};

const SIZE: u32 = 512;

/// a soft-edged disc blended between two colors, the bottom right corner is killed
fn shader_disc() -> Program {
    let (mut shape, mut alpha) = (0, 0);
    let x = Swizzle::splat(Channel::X);

    Program::builder()
        .declare(RegisterFile::Input, 0..=0)
        // 0.5 center, 0.35 radius, 40 feather
        .immediate([0.5, 0.35, -40.0, 1.8], &mut shape)
        .immediate([1.0, 0.0, 0.0, 0.0], &mut alpha)
        .op(
            Opcode::Sub,
            DstRegister::temp(0).mask(WriteMask::XY),
            [SrcRegister::input(0), SrcRegister::immediate(shape).swizzle(x)],
        )
        .op(
            Opcode::Dp2,
            DstRegister::temp(0).mask(WriteMask::Z),
            [SrcRegister::temp(0), SrcRegister::temp(0)],
        )
        .op(
            Opcode::Rsq,
            DstRegister::temp(0).mask(WriteMask::W),
            [SrcRegister::temp(0).swizzle(Swizzle::splat(Channel::Z))],
        )
        .op(
            Opcode::Rcp,
            DstRegister::temp(0).mask(WriteMask::W),
            [SrcRegister::temp(0).swizzle(Swizzle::splat(Channel::W))],
        )
        .op(
            Opcode::Sub,
            DstRegister::temp(1).mask(WriteMask::X),
            [
                SrcRegister::temp(0).swizzle(Swizzle::splat(Channel::W)),
                SrcRegister::immediate(shape).swizzle(Swizzle::splat(Channel::Y)),
            ],
        )
        .inst(
            Instruction::new(Opcode::Mul)
                .dst(DstRegister::temp(1).mask(WriteMask::X))
                .src(SrcRegister::temp(1).swizzle(x))
                .src(SrcRegister::immediate(shape).swizzle(Swizzle::splat(Channel::Z)))
                .saturate(Saturate::ZeroOne),
        )
        .op(
            Opcode::Lrp,
            DstRegister::output(0).mask(WriteMask::XYZ),
            [SrcRegister::temp(1).swizzle(x), SrcRegister::constant(0), SrcRegister::constant(1)],
        )
        .op(
            Opcode::Mov,
            DstRegister::output(0).mask(WriteMask::W),
            [SrcRegister::immediate(alpha).swizzle(x)],
        )
        // kill where u + v > 1.8
        .op(
            Opcode::Add,
            DstRegister::temp(2).mask(WriteMask::X),
            [SrcRegister::input(0).swizzle(x), SrcRegister::input(0).swizzle(Swizzle::splat(Channel::Y))],
        )
        .op(
            Opcode::Sub,
            DstRegister::temp(2).mask(WriteMask::X),
            [
                SrcRegister::immediate(shape).swizzle(Swizzle::splat(Channel::W)),
                SrcRegister::temp(2).swizzle(x),
            ],
        )
        .inst(Instruction::new(Opcode::Kil).src(SrcRegister::temp(2).swizzle(x)))
        .build()
        .unwrap()
}

fn main() {
    tracing_subscriber::fmt::init();

    let program = shader_disc();
    println!("{program}");

    let mut backend = SoaBackend::new();
    let start = std::time::Instant::now();
    let shader = backend.create_shader(&program).unwrap();
    println!("compiled in {:?}", start.elapsed());

    let inputs = (0..SIZE * SIZE)
        .map(|i| {
            let (x, y) = (i % SIZE, i / SIZE);
            [(x as f32 + 0.5) / SIZE as f32, (y as f32 + 0.5) / SIZE as f32, 0.0, 1.0]
        })
        .collect::<Vec<_>>();
    let constants = [[1.0, 0.45, 0.1, 1.0], [0.08, 0.12, 0.3, 1.0]];

    const ITERS: usize = 20;
    let start = std::time::Instant::now();
    let mut result = None;
    for _ in 0..ITERS {
        result = Some(
            backend
                .dispatch(
                    shader,
                    &Batch {
                        elements: inputs.len(),
                        inputs: &inputs,
                        constants: &constants,
                        coverage: None,
                        texels: &NoTextures,
                    },
                )
                .unwrap(),
        );
    }
    println!("time per frame: {:?}", start.elapsed() / ITERS as u32);

    let result = result.unwrap();
    image::RgbaImage::from_fn(SIZE, SIZE, |x, y| {
        let element = (y * SIZE + x) as usize;
        if !result.is_active(element) {
            return image::Rgba([0, 0, 0, 0]);
        }

        let color = result.output(element, 0);
        image::Rgba(color.map(|c| (c.clamp(0.0, 1.0) * 255.0) as u8))
    })
    .save("disc.png")
    .unwrap();
}
