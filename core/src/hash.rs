//! The one-at-a-time hash, split into a loop stage and a final stage, and its inverse.
//!
//! Every step is a bijection on `width`-bit words:
//! - `x += byte` is undone by a subtraction,
//! - `x += x << n` is a multiplication by the odd constant `(1 << n) + 1`, undone by a
//!   multiplication by its inverse,
//! - `x ^= x >> n` keeps its top `n` bits, and is undone by xor-shifting again with
//!   `n`, `2n`, `4n`... until the shift covers the word.

use std::fmt::Display;

use crate::{
    error::{MitmError, MitmResult},
    inverse::{check_value, check_width, invert_odd, shift_add_multiplier, width_mask},
    DEFAULT_PRESET,
};

/// The shift amounts of a one-at-a-time hash.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Shifts {
    /// Loop stage, `x += x << s1`.
    pub s1: u32,
    /// Loop stage, `x ^= x >> s2`.
    pub s2: u32,
    /// Final stage, `x += x << s3`.
    pub s3: u32,
    /// Final stage, `x ^= x >> s4`.
    pub s4: u32,
    /// Final stage, `x += x << s5`.
    pub s5: u32,
}

impl Shifts {
    fn all(&self) -> [u32; 5] {
        [self.s1, self.s2, self.s3, self.s4, self.s5]
    }
}

/// The shifts of Bob Jenkins' one-at-a-time hash.
pub const ONE_AT_A_TIME_SHIFTS: Shifts = Shifts {
    s1: 10,
    s2: 6,
    s3: 3,
    s4: 11,
    s5: 15,
};

/// The hash variants available out of the box.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Preset {
    /// The classic 32-bit one-at-a-time hash.
    OneAtATime32,
    /// The same steps on 64-bit words.
    OneAtATime64,
}

impl Preset {
    /// Returns the width of the words of this preset.
    pub fn width(&self) -> u32 {
        match self {
            Self::OneAtATime32 => 32,
            Self::OneAtATime64 => 64,
        }
    }

    /// Returns the shifts of this preset.
    pub fn shifts(&self) -> Shifts {
        ONE_AT_A_TIME_SHIFTS
    }

    /// Returns the hash variant described by this preset.
    pub fn variant(&self) -> Variant {
        Variant::from_valid_parts(self.width(), self.shifts())
    }
}

impl Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OneAtATime32 => write!(f, "32-bit one-at-a-time"),
            Self::OneAtATime64 => write!(f, "64-bit one-at-a-time"),
        }
    }
}

/// A builder for a custom hash variant.
#[derive(Clone, Copy, Debug)]
pub struct VariantBuilder {
    width: u32,
    shifts: Shifts,
}

impl Default for VariantBuilder {
    fn default() -> Self {
        Self {
            width: DEFAULT_PRESET.width(),
            shifts: DEFAULT_PRESET.shifts(),
        }
    }
}

impl VariantBuilder {
    /// Creates a new VariantBuilder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the parameters of a preset.
    pub fn preset(mut self, preset: Preset) -> Self {
        self.width = preset.width();
        self.shifts = preset.shifts();

        self
    }

    /// Sets the width of the words, in bits.
    pub fn width(mut self, width: u32) -> Self {
        self.width = width;

        self
    }

    /// Sets the shift amounts.
    pub fn shifts(mut self, shifts: Shifts) -> Self {
        self.shifts = shifts;

        self
    }

    /// Builds a Variant with the specified parameters.
    pub fn build(self) -> MitmResult<Variant> {
        check_width(self.width)?;

        // a zero shift makes `x ^= x >> 0` constant and `x += x << 0` even
        if let Some(shift) = self
            .shifts
            .all()
            .into_iter()
            .find(|shift| !(1..self.width).contains(shift))
        {
            return Err(MitmError::InvalidShift {
                shift,
                width: self.width,
            });
        }

        Ok(Variant::from_valid_parts(self.width, self.shifts))
    }
}

/// A one-at-a-time hash variant, with everything needed to run it in both directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Variant {
    width: u32,
    mask: u64,
    shifts: Shifts,
    /// Inverse of the multiplier equivalent to `x += x << s1`.
    inv_s1: u64,
    /// Inverse of the multiplier equivalent to `x += x << s3`.
    inv_s3: u64,
    /// Inverse of the multiplier equivalent to `x += x << s5`.
    inv_s5: u64,
}

impl Default for Variant {
    fn default() -> Self {
        DEFAULT_PRESET.variant()
    }
}

impl From<Preset> for Variant {
    fn from(preset: Preset) -> Self {
        preset.variant()
    }
}

impl Variant {
    /// Creates a variant. The width and shifts must have been validated.
    fn from_valid_parts(width: u32, shifts: Shifts) -> Self {
        let inverse_of = |shift| invert_odd(shift_add_multiplier(shift, width), width);

        Self {
            width,
            mask: width_mask(width),
            shifts,
            inv_s1: inverse_of(shifts.s1),
            inv_s3: inverse_of(shifts.s3),
            inv_s5: inverse_of(shifts.s5),
        }
    }

    /// Returns the width of the words, in bits.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Returns the shift amounts.
    pub fn shifts(&self) -> Shifts {
        self.shifts
    }

    /// Returns a mask of the `width` low bits.
    pub fn mask(&self) -> u64 {
        self.mask
    }

    /// Checks that a state fits in the width of this variant.
    #[inline]
    pub fn check(&self, state: u64) -> MitmResult<u64> {
        check_value(state, self.width)
    }

    /// Feeds `bytes` to the loop stage, starting from `state`.
    pub fn loop_stage(&self, state: u64, bytes: &[u8]) -> MitmResult<u64> {
        Ok(self.extend(self.check(state)?, bytes))
    }

    /// Applies the final stage to `state`.
    pub fn final_stage(&self, state: u64) -> MitmResult<u64> {
        Ok(self.finalize(self.check(state)?))
    }

    /// Finds the state that the loop stage takes to `state` when fed `bytes`.
    pub fn inverse_loop_stage(&self, state: u64, bytes: &[u8]) -> MitmResult<u64> {
        Ok(self.retract(self.check(state)?, bytes))
    }

    /// Finds the state that the final stage takes to `state`.
    pub fn inverse_final_stage(&self, state: u64) -> MitmResult<u64> {
        Ok(self.unfinalize(self.check(state)?))
    }

    /// Hashes `text` starting from `seed`.
    pub fn forward_hash(&self, seed: u64, text: &[u8]) -> MitmResult<u64> {
        Ok(self.finalize(self.extend(self.check(seed)?, text)))
    }

    /// Recovers the seed that hashes `text` to `target`.
    pub fn inverse_hash(&self, text: &[u8], target: u64) -> MitmResult<u64> {
        Ok(self.retract(self.unfinalize(self.check(target)?), text))
    }

    /// Loop stage on a state known to fit in the width.
    #[inline]
    pub(crate) fn extend(&self, mut state: u64, bytes: &[u8]) -> u64 {
        for &byte in bytes {
            state = state.wrapping_add(byte as u64) & self.mask;
            state = self.add_shift(state, self.shifts.s1);
            state = self.xor_shift(state, self.shifts.s2);
        }

        state
    }

    /// Inverse loop stage on a state known to fit in the width.
    #[inline]
    pub(crate) fn retract(&self, mut state: u64, bytes: &[u8]) -> u64 {
        for &byte in bytes.iter().rev() {
            state = self.unxor_shift(state, self.shifts.s2);
            state = self.unadd_shift(state, self.inv_s1);
            state = state.wrapping_sub(byte as u64) & self.mask;
        }

        state
    }

    #[inline]
    fn finalize(&self, mut state: u64) -> u64 {
        state = self.add_shift(state, self.shifts.s3);
        state = self.xor_shift(state, self.shifts.s4);
        self.add_shift(state, self.shifts.s5)
    }

    #[inline]
    fn unfinalize(&self, mut state: u64) -> u64 {
        state = self.unadd_shift(state, self.inv_s5);
        state = self.unxor_shift(state, self.shifts.s4);
        self.unadd_shift(state, self.inv_s3)
    }

    #[inline]
    fn add_shift(&self, x: u64, shift: u32) -> u64 {
        x.wrapping_add(x << shift) & self.mask
    }

    #[inline]
    fn unadd_shift(&self, x: u64, inverse: u64) -> u64 {
        x.wrapping_mul(inverse) & self.mask
    }

    #[inline]
    fn xor_shift(&self, x: u64, shift: u32) -> u64 {
        x ^ (x >> shift)
    }

    #[inline]
    fn unxor_shift(&self, mut x: u64, shift: u32) -> u64 {
        let mut shift = shift;
        while shift < self.width {
            x ^= x >> shift;
            shift *= 2;
        }

        x
    }
}
