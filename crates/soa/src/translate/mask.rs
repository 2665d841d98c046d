use crate::{IR, LaneBuilder};

/// the active lane mask of a shader invocation
///
/// starts from the incoming coverage and only ever shrinks
#[derive(Clone, Copy, Debug)]
pub struct MaskContext<'a> {
    value: IR<'a>,
}

impl<'a> MaskContext<'a> {
    pub fn new(bld: &LaneBuilder<'a>) -> Self {
        Self { value: bld.coverage() }
    }

    /// clear every lane that is not set in `mask`
    pub fn update(&mut self, bld: &LaneBuilder<'a>, mask: IR<'a>) {
        self.value = bld.and(self.value, mask);
    }

    pub fn value(&self) -> IR<'a> {
        self.value
    }
}
